//! Type expression trees and their lowering into automata.

use super::Type;
use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::LowerError;
use crate::schema::TypeKind;

/// A type as written by a parser, before it becomes an automaton.
///
/// `Ref(name)` points back at the innermost enclosing `Nominal(name, ..)`,
/// which is how recursive definitions close their loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Void,
    Any,
    Null,
    Bool,
    Int,
    Real,
    String,
    Var(String),
    Nominal(String, Box<TypeExpr>),
    Ref(String),
    Not(Box<TypeExpr>),
    And(Vec<TypeExpr>),
    Or(Vec<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Array(Box<TypeExpr>),
    Term(String, Option<Box<TypeExpr>>),
    Collection {
        kind: CollectionKind,
        elements: Vec<TypeExpr>,
        rest: Option<Box<TypeExpr>>,
    },
}

impl TypeExpr {
    pub fn var(name: impl Into<String>) -> Self {
        TypeExpr::Var(name.into())
    }

    pub fn nominal(name: impl Into<String>, body: TypeExpr) -> Self {
        TypeExpr::Nominal(name.into(), Box::new(body))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        TypeExpr::Ref(name.into())
    }

    pub fn not(operand: TypeExpr) -> Self {
        TypeExpr::Not(Box::new(operand))
    }

    pub fn and(operands: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Or(operands.into_iter().collect())
    }

    pub fn tuple(components: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Tuple(components.into_iter().collect())
    }

    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    pub fn term(name: impl Into<String>, contents: Option<TypeExpr>) -> Self {
        TypeExpr::Term(name.into(), contents.map(Box::new))
    }

    pub fn set_of(elements: Vec<TypeExpr>, rest: Option<TypeExpr>) -> Self {
        Self::collection(CollectionKind::Set, elements, rest)
    }

    pub fn bag_of(elements: Vec<TypeExpr>, rest: Option<TypeExpr>) -> Self {
        Self::collection(CollectionKind::Bag, elements, rest)
    }

    pub fn list_of(elements: Vec<TypeExpr>, rest: Option<TypeExpr>) -> Self {
        Self::collection(CollectionKind::List, elements, rest)
    }

    fn collection(kind: CollectionKind, elements: Vec<TypeExpr>, rest: Option<TypeExpr>) -> Self {
        TypeExpr::Collection {
            kind,
            elements,
            rest: rest.map(Box::new),
        }
    }

    /// Lowers this expression into a canonical [`Type`].
    pub fn lower(&self) -> Result<Type, LowerError> {
        let mut a = Automaton::new();
        let root = self.lower_into(&mut a)?;
        Ok(Type::from_automaton(&a, root)?)
    }

    /// Lowers this expression into `a`, returning the root of the new subgraph.
    pub fn lower_into(&self, a: &mut Automaton) -> Result<NodeIndex, LowerError> {
        let mut scopes = Vec::new();
        self.lower_scoped(a, &mut scopes)
    }

    fn lower_scoped(
        &self,
        a: &mut Automaton,
        scopes: &mut Vec<(String, NodeIndex)>,
    ) -> Result<NodeIndex, LowerError> {
        let leaf = |a: &mut Automaton, kind: TypeKind| a.add(State::leaf(kind.id()));
        Ok(match self {
            TypeExpr::Void => leaf(a, TypeKind::Void),
            TypeExpr::Any => leaf(a, TypeKind::Any),
            TypeExpr::Null => leaf(a, TypeKind::Null),
            TypeExpr::Bool => leaf(a, TypeKind::Bool),
            TypeExpr::Int => leaf(a, TypeKind::Int),
            TypeExpr::Real => leaf(a, TypeKind::Real),
            TypeExpr::String => leaf(a, TypeKind::String),
            TypeExpr::Var(name) => {
                let name = a.add(State::string(name.as_str()));
                term(a, TypeKind::Var, vec![name])
            }
            TypeExpr::Nominal(name, body) => {
                let slot = a.reserve();
                scopes.push((name.clone(), slot));
                let body = body.lower_scoped(a, scopes);
                scopes.pop();
                let body = body?;
                let name = a.add(State::string(name.as_str()));
                let contents = a.add(State::list(vec![name, body]));
                a.set(slot, State::term(TypeKind::Nominal.id(), Some(contents)));
                slot
            }
            TypeExpr::Ref(name) => scopes
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, slot)| *slot)
                .ok_or_else(|| LowerError::UnboundReference(name.clone()))?,
            TypeExpr::Not(t) => {
                let t = t.lower_scoped(a, scopes)?;
                term(a, TypeKind::Not, vec![t])
            }
            TypeExpr::And(ts) | TypeExpr::Or(ts) => {
                let kind = if matches!(self, TypeExpr::And(_)) {
                    TypeKind::And
                } else {
                    TypeKind::Or
                };
                let children = lower_all(ts, a, scopes)?;
                let set = a.add(State::set(children));
                term(a, kind, vec![set])
            }
            TypeExpr::Tuple(ts) => {
                let children = lower_all(ts, a, scopes)?;
                let list = a.add(State::list(children));
                term(a, TypeKind::Tuple, vec![list])
            }
            TypeExpr::Array(t) => {
                let t = t.lower_scoped(a, scopes)?;
                term(a, TypeKind::Array, vec![t])
            }
            TypeExpr::Term(name, contents) => {
                let mut fields = vec![a.add(State::string(name.as_str()))];
                if let Some(t) = contents {
                    fields.push(t.lower_scoped(a, scopes)?);
                }
                term(a, TypeKind::Term, fields)
            }
            TypeExpr::Collection {
                kind,
                elements,
                rest,
            } => {
                let rest = match rest {
                    Some(t) => t.lower_scoped(a, scopes)?,
                    None => leaf(a, TypeKind::Void),
                };
                let children = lower_all(elements, a, scopes)?;
                let elements = a.add(State::Collection {
                    kind: *kind,
                    children,
                });
                let tk = match kind {
                    CollectionKind::Set => TypeKind::SetOf,
                    CollectionKind::Bag => TypeKind::BagOf,
                    CollectionKind::List => TypeKind::ListOf,
                };
                term(a, tk, vec![rest, elements])
            }
        })
    }
}

fn lower_all(
    ts: &[TypeExpr],
    a: &mut Automaton,
    scopes: &mut Vec<(String, NodeIndex)>,
) -> Result<Vec<NodeIndex>, LowerError> {
    ts.iter().map(|t| t.lower_scoped(a, scopes)).collect()
}

fn term(a: &mut Automaton, kind: TypeKind, fields: Vec<NodeIndex>) -> NodeIndex {
    let contents = a.add(State::list(fields));
    a.add(State::term(kind.id(), Some(contents)))
}
