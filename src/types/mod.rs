//! Semantic types as canonical automata.
//!
//! A [`Type`] owns an automaton over [`type_schema`] laid out canonically, so
//! structural equality of types is plain equality of values. [`decode`]
//! reads one node as a [`TypeNode`], the exhaustively matched view every
//! consumer (printer, acceptance, combinators) goes through.

mod expr;

pub use expr::TypeExpr;

use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::InternalError;
use crate::fingerprint::{structural_hash, HashValue};
use crate::schema::{type_schema, TypeKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded view of one type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeNode<'a> {
    Void,
    Any,
    Null,
    Bool,
    Int,
    Real,
    String,
    Var(&'a str),
    Nominal {
        name: &'a str,
        body: NodeIndex,
    },
    Not(NodeIndex),
    And(&'a [NodeIndex]),
    Or(&'a [NodeIndex]),
    Tuple(&'a [NodeIndex]),
    Array(NodeIndex),
    Term {
        name: &'a str,
        contents: Option<NodeIndex>,
    },
    /// `SetOf`, `BagOf` or `ListOf`. `unbounded` is `None` when the remainder type is Void.
    Collection {
        kind: CollectionKind,
        unbounded: Option<NodeIndex>,
        elements: &'a [NodeIndex],
    },
}

fn shape(node: NodeIndex, expected: &'static str, found: &State) -> InternalError {
    InternalError::ShapeMismatch {
        node,
        expected,
        found: found.describe(),
    }
}

fn str_at(a: &Automaton, node: NodeIndex) -> Result<&str, InternalError> {
    let state = a.try_get(node)?;
    state.as_str().ok_or_else(|| shape(node, "Str", state))
}

fn collection_at<'a>(
    a: &'a Automaton,
    node: NodeIndex,
    kind: CollectionKind,
    expected: &'static str,
) -> Result<&'a [NodeIndex], InternalError> {
    let state = a.try_get(node)?;
    state.as_collection(kind).ok_or_else(|| shape(node, expected, state))
}

/// Reads `node` of a type automaton.
pub fn decode(a: &Automaton, node: NodeIndex) -> Result<TypeNode<'_>, InternalError> {
    let (id, fields) = a.term_fields(node)?;
    let kind = TypeKind::from_id(id).ok_or(InternalError::UnknownKind { kind: id })?;
    if !kind.arity().admits(fields.map(<[NodeIndex]>::len)) {
        return Err(shape(node, kind.name(), a.get(node)));
    }
    let f = fields.unwrap_or(&[]);
    Ok(match kind {
        TypeKind::Void => TypeNode::Void,
        TypeKind::Any => TypeNode::Any,
        TypeKind::Null => TypeNode::Null,
        TypeKind::Bool => TypeNode::Bool,
        TypeKind::Int => TypeNode::Int,
        TypeKind::Real => TypeNode::Real,
        TypeKind::String => TypeNode::String,
        TypeKind::Var => TypeNode::Var(str_at(a, f[0])?),
        TypeKind::Nominal => TypeNode::Nominal {
            name: str_at(a, f[0])?,
            body: f[1],
        },
        TypeKind::Not => TypeNode::Not(f[0]),
        TypeKind::And => TypeNode::And(collection_at(a, f[0], CollectionKind::Set, "And operands")?),
        TypeKind::Or => TypeNode::Or(collection_at(a, f[0], CollectionKind::Set, "Or operands")?),
        TypeKind::Tuple => {
            TypeNode::Tuple(collection_at(a, f[0], CollectionKind::List, "Tuple components")?)
        }
        TypeKind::Array => TypeNode::Array(f[0]),
        TypeKind::Term => TypeNode::Term {
            name: str_at(a, f[0])?,
            contents: f.get(1).copied(),
        },
        TypeKind::SetOf | TypeKind::BagOf | TypeKind::ListOf => {
            let ckind = match kind {
                TypeKind::SetOf => CollectionKind::Set,
                TypeKind::BagOf => CollectionKind::Bag,
                _ => CollectionKind::List,
            };
            let unbounded = match decode(a, f[0])? {
                TypeNode::Void => None,
                _ => Some(f[0]),
            };
            TypeNode::Collection {
                kind: ckind,
                unbounded,
                elements: collection_at(a, f[1], ckind, "collection element types")?,
            }
        }
    })
}

/// A semantic type in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    automaton: Automaton,
    root: NodeIndex,
}

impl Type {
    /// Canonicalizes the type rooted at `root` of `a`.
    pub fn from_automaton(a: &Automaton, root: NodeIndex) -> Result<Type, InternalError> {
        decode(a, root)?;
        Self::from_canonical(a.canonicalize(root)?)
    }

    pub(crate) fn from_canonical(automaton: Automaton) -> Result<Type, InternalError> {
        let root = automaton.try_root(0)?;
        Ok(Type { automaton, root })
    }

    /// A type with no operands, such as `Int` or `Void`.
    pub fn leaf(kind: TypeKind) -> Type {
        debug_assert!(type_schema().get(kind.id()).is_some());
        let mut automaton = Automaton::new();
        let root = automaton.add(State::leaf(kind.id()));
        automaton.push_root(root);
        Type { automaton, root }
    }

    pub fn void() -> Type {
        Self::leaf(TypeKind::Void)
    }

    pub fn any() -> Type {
        Self::leaf(TypeKind::Any)
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Decodes a node of this type's automaton.
    pub fn view(&self, node: NodeIndex) -> Result<TypeNode<'_>, InternalError> {
        decode(&self.automaton, node)
    }

    pub fn kind(&self) -> Option<TypeKind> {
        match self.automaton.get(self.root) {
            State::Term { kind, .. } => TypeKind::from_id(*kind),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.kind() == Some(TypeKind::Void)
    }

    pub fn is_any(&self) -> bool {
        self.kind() == Some(TypeKind::Any)
    }

    /// Structural fingerprint of this type.
    pub fn fingerprint(&self) -> Result<HashValue, InternalError> {
        structural_hash(&self.automaton, self.root)
    }

    /// `Not(self)`, unnormalized.
    pub fn negate(&self) -> Result<Type, InternalError> {
        let mut a = Automaton::new();
        let operand = a.add_all(&self.automaton, self.root);
        let root = wrap(&mut a, TypeKind::Not, State::list(vec![operand]));
        Type::from_automaton(&a, root)
    }

    /// `And{self, other}`, unnormalized.
    pub fn intersect(&self, other: &Type) -> Result<Type, InternalError> {
        Self::connective(TypeKind::And, [self, other])
    }

    /// `Or{self, other}`, unnormalized.
    pub fn union(&self, other: &Type) -> Result<Type, InternalError> {
        Self::connective(TypeKind::Or, [self, other])
    }

    /// `And` over any number of operands, unnormalized.
    pub fn and<'a>(operands: impl IntoIterator<Item = &'a Type>) -> Result<Type, InternalError> {
        Self::connective(TypeKind::And, operands)
    }

    /// `Or` over any number of operands, unnormalized.
    pub fn or<'a>(operands: impl IntoIterator<Item = &'a Type>) -> Result<Type, InternalError> {
        Self::connective(TypeKind::Or, operands)
    }

    fn connective<'a>(
        kind: TypeKind,
        operands: impl IntoIterator<Item = &'a Type>,
    ) -> Result<Type, InternalError> {
        let mut a = Automaton::new();
        let children = operands
            .into_iter()
            .map(|t| a.add_all(&t.automaton, t.root))
            .collect::<Vec<_>>();
        let set = a.add(State::set(children));
        let root = wrap(&mut a, kind, State::list(vec![set]));
        Type::from_automaton(&a, root)
    }
}

fn wrap(a: &mut Automaton, kind: TypeKind, contents: State) -> NodeIndex {
    let contents = a.add(contents);
    a.add(State::term(kind.id(), Some(contents)))
}

const DISPLAY_DEPTH: usize = 48;

fn write_node(a: &Automaton, node: NodeIndex, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&render(a, node, depth))
}

fn render_all(a: &Automaton, nodes: &[NodeIndex], depth: usize, sorted: bool) -> String {
    let mut parts: Vec<String> = nodes.iter().map(|n| render(a, *n, depth + 1)).collect();
    if sorted {
        parts.sort();
    }
    parts.join(", ")
}

fn render(a: &Automaton, node: NodeIndex, depth: usize) -> String {
    if depth > DISPLAY_DEPTH {
        return "…".to_string();
    }
    let view = match decode(a, node) {
        Ok(view) => view,
        Err(_) => return format!("<malformed {node}>"),
    };
    match view {
        TypeNode::Void => "Void".into(),
        TypeNode::Any => "Any".into(),
        TypeNode::Null => "Null".into(),
        TypeNode::Bool => "Bool".into(),
        TypeNode::Int => "Int".into(),
        TypeNode::Real => "Real".into(),
        TypeNode::String => "String".into(),
        TypeNode::Var(name) => format!("?{name}"),
        TypeNode::Nominal { name, .. } => name.to_string(),
        TypeNode::Not(t) => format!("Not({})", render(a, t, depth + 1)),
        TypeNode::And(ts) => format!("And{{{}}}", render_all(a, ts, depth, true)),
        TypeNode::Or(ts) => format!("Or{{{}}}", render_all(a, ts, depth, true)),
        TypeNode::Tuple(ts) => format!("Tuple[{}]", render_all(a, ts, depth, false)),
        TypeNode::Array(t) => format!("Array({})", render(a, t, depth + 1)),
        TypeNode::Term { name, contents } => match contents {
            Some(t) => format!("{name}({})", render(a, t, depth + 1)),
            None => name.to_string(),
        },
        TypeNode::Collection {
            kind,
            unbounded,
            elements,
        } => {
            let (open, close, unordered) = match kind {
                CollectionKind::Set => ("SetOf{", "}", true),
                CollectionKind::Bag => ("BagOf{", "}", true),
                CollectionKind::List => ("ListOf[", "]", false),
            };
            let mut body = render_all(a, elements, depth, unordered);
            if let Some(rest) = unbounded {
                if !body.is_empty() {
                    body.push_str(", ");
                }
                body.push_str("..");
                body.push_str(&render(a, rest, depth + 1));
            }
            format!("{open}{body}{close}")
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(&self.automaton, self.root, 0, f)
    }
}
