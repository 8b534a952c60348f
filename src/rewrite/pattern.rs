//! Rule patterns and matching.
//!
//! Patterns are written against kind and group names ([`Pattern<String>`])
//! and resolved against a schema into [`Pattern<KindSet>`]. Matching returns
//! every way a pattern fits a node; the rule tries them in order.

use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::{InternalError, RuleError};
use crate::fingerprint::structural_hash;
use crate::schema::{KindId, Schema};
use std::collections::BTreeMap;

/// Sorted set of kinds a pattern position admits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KindSet(Vec<KindId>);

impl KindSet {
    pub fn new(mut kinds: Vec<KindId>) -> Self {
        kinds.sort();
        kinds.dedup();
        Self(kinds)
    }

    pub fn contains(&self, kind: KindId) -> bool {
        self.0.binary_search(&kind).is_ok()
    }

    /// The single kind of this set, if it has exactly one.
    pub fn head(&self) -> Option<KindId> {
        match self.0.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    pub fn kinds(&self) -> &[KindId] {
        &self.0
    }
}

/// A pattern over automaton nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern<K = KindSet> {
    /// Any node.
    Wild,
    /// A term of one of the kinds, whatever its contents.
    Kind(K),
    /// A term whose contents List matches `fields` exactly. No fields means VOID contents.
    Term { kind: K, fields: Vec<Pattern<K>> },
    /// A Set whose members match `elems` injectively; the remainder binds to `rest`.
    /// Without `rest` nothing may remain.
    Set {
        elems: Vec<Pattern<K>>,
        rest: Option<String>,
    },
    /// A List starting with `elems`; the suffix binds to `rest`.
    List {
        elems: Vec<Pattern<K>>,
        rest: Option<String>,
    },
    /// A collection with at least one member matching.
    Exists(Box<Pattern<K>>),
    /// Binds the matched node.
    Bind(String, Box<Pattern<K>>),
}

impl Pattern<String> {
    pub fn wild() -> Self {
        Pattern::Wild
    }

    pub fn kind(name: &str) -> Self {
        Pattern::Kind(name.to_string())
    }

    pub fn term<const N: usize>(name: &str, fields: [Pattern<String>; N]) -> Self {
        Pattern::Term {
            kind: name.to_string(),
            fields: fields.into(),
        }
    }

    /// A term with VOID contents.
    pub fn leaf(name: &str) -> Self {
        Pattern::Term {
            kind: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn set<const N: usize>(elems: [Pattern<String>; N], rest: Option<&str>) -> Self {
        Pattern::Set {
            elems: elems.into(),
            rest: rest.map(str::to_string),
        }
    }

    pub fn list<const N: usize>(elems: [Pattern<String>; N], rest: Option<&str>) -> Self {
        Pattern::List {
            elems: elems.into(),
            rest: rest.map(str::to_string),
        }
    }

    pub fn exists(inner: Pattern<String>) -> Self {
        Pattern::Exists(Box::new(inner))
    }

    pub fn bind(self, name: &str) -> Self {
        Pattern::Bind(name.to_string(), Box::new(self))
    }

    /// Resolves kind and group names against `schema`.
    pub fn resolve(&self, rule: &str, schema: &Schema) -> Result<Pattern<KindSet>, RuleError> {
        let kinds = |name: &String| {
            schema
                .resolve(name)
                .map(KindSet::new)
                .ok_or_else(|| RuleError::UnknownKind {
                    rule: rule.to_string(),
                    kind: name.clone(),
                })
        };
        let all = |ps: &[Pattern<String>]| -> Result<Vec<Pattern<KindSet>>, RuleError> {
            ps.iter().map(|p| p.resolve(rule, schema)).collect()
        };
        Ok(match self {
            Pattern::Wild => Pattern::Wild,
            Pattern::Kind(name) => Pattern::Kind(kinds(name)?),
            Pattern::Term { kind, fields } => Pattern::Term {
                kind: kinds(kind)?,
                fields: all(fields)?,
            },
            Pattern::Set { elems, rest } => Pattern::Set {
                elems: all(elems)?,
                rest: rest.clone(),
            },
            Pattern::List { elems, rest } => Pattern::List {
                elems: all(elems)?,
                rest: rest.clone(),
            },
            Pattern::Exists(inner) => Pattern::Exists(Box::new(inner.resolve(rule, schema)?)),
            Pattern::Bind(name, inner) => {
                Pattern::Bind(name.clone(), Box::new(inner.resolve(rule, schema)?))
            }
        })
    }
}

impl<K> Pattern<K> {
    /// Names this pattern binds, in first-occurrence order.
    pub fn captures(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_captures(&mut out);
        out
    }

    fn collect_captures(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Wild | Pattern::Kind(_) => {}
            Pattern::Term { fields, .. } => fields.iter().for_each(|p| p.collect_captures(out)),
            Pattern::Set { elems, rest } | Pattern::List { elems, rest } => {
                if let Some(rest) = rest {
                    push_unique(out, rest);
                }
                elems.iter().for_each(|p| p.collect_captures(out));
            }
            Pattern::Exists(inner) => inner.collect_captures(out),
            Pattern::Bind(name, inner) => {
                push_unique(out, name);
                inner.collect_captures(out);
            }
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|n| n == name) {
        out.push(name.to_string());
    }
}

/// A value bound by a pattern or introduced by a comprehension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Node(NodeIndex),
    Many(Vec<NodeIndex>),
    Int(i64),
}

/// Captures of one match.
pub type Bindings = BTreeMap<String, Bound>;

/// Structural equality of two nodes of the same automaton.
pub(crate) fn same_node(a: &Automaton, x: NodeIndex, y: NodeIndex) -> Result<bool, InternalError> {
    Ok(x == y || structural_hash(a, x)? == structural_hash(a, y)?)
}

pub(crate) fn same_bound(a: &Automaton, x: &Bound, y: &Bound) -> Result<bool, InternalError> {
    match (x, y) {
        (Bound::Node(x), Bound::Node(y)) => same_node(a, *x, *y),
        (Bound::Many(xs), Bound::Many(ys)) => {
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (x, y) in xs.iter().zip(ys) {
                if !same_node(a, *x, *y)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Bound::Int(x), Bound::Int(y)) => Ok(x == y),
        _ => Ok(false),
    }
}

fn bind(
    a: &Automaton,
    mut bindings: Bindings,
    name: &str,
    value: Bound,
) -> Result<Option<Bindings>, InternalError> {
    if let Some(existing) = bindings.get(name) {
        return Ok(if same_bound(a, existing, &value)? {
            Some(bindings)
        } else {
            None
        });
    }
    bindings.insert(name.to_string(), value);
    Ok(Some(bindings))
}

impl Pattern<KindSet> {
    /// Every way this pattern matches `node`.
    pub fn matches(&self, a: &Automaton, node: NodeIndex) -> Result<Vec<Bindings>, InternalError> {
        self.match_with(a, node, Bindings::new())
    }

    fn match_with(
        &self,
        a: &Automaton,
        node: NodeIndex,
        bindings: Bindings,
    ) -> Result<Vec<Bindings>, InternalError> {
        let state = a.try_get(node)?;
        match self {
            Pattern::Wild => Ok(vec![bindings]),
            Pattern::Kind(kinds) => Ok(match state {
                State::Term { kind, .. } if kinds.contains(*kind) => vec![bindings],
                _ => Vec::new(),
            }),
            Pattern::Term { kind: kinds, fields } => {
                let (kind, contents) = match state {
                    State::Term { kind, contents } => (*kind, *contents),
                    _ => return Ok(Vec::new()),
                };
                if !kinds.contains(kind) {
                    return Ok(Vec::new());
                }
                match contents {
                    None if fields.is_empty() => Ok(vec![bindings]),
                    None => Ok(Vec::new()),
                    Some(_) if fields.is_empty() => Ok(Vec::new()),
                    Some(c) => match a.try_get(c)?.as_list() {
                        Some(children) if children.len() == fields.len() => {
                            match_sequence(a, fields, children, bindings)
                        }
                        _ => Ok(Vec::new()),
                    },
                }
            }
            Pattern::Set { elems, rest } => match state.as_collection(CollectionKind::Set) {
                Some(children) => {
                    let mut out = Vec::new();
                    let mut used = vec![false; children.len()];
                    match_unordered(a, elems, rest.as_deref(), children, &mut used, bindings, &mut out)?;
                    Ok(out)
                }
                None => Ok(Vec::new()),
            },
            Pattern::List { elems, rest } => match state.as_list() {
                Some(children) if children.len() >= elems.len() => {
                    let (prefix, suffix) = children.split_at(elems.len());
                    if rest.is_none() && !suffix.is_empty() {
                        return Ok(Vec::new());
                    }
                    let mut out = Vec::new();
                    for b in match_sequence(a, elems, prefix, bindings)? {
                        match rest {
                            Some(name) => {
                                if let Some(b) = bind(a, b, name, Bound::Many(suffix.to_vec()))? {
                                    out.push(b);
                                }
                            }
                            None => out.push(b),
                        }
                    }
                    Ok(out)
                }
                _ => Ok(Vec::new()),
            },
            Pattern::Exists(inner) => match state {
                State::Collection { children, .. } => {
                    let mut out = Vec::new();
                    for &child in children {
                        out.extend(inner.match_with(a, child, bindings.clone())?);
                    }
                    Ok(out)
                }
                _ => Ok(Vec::new()),
            },
            Pattern::Bind(name, inner) => {
                let mut out = Vec::new();
                for b in inner.match_with(a, node, bindings)? {
                    if let Some(b) = bind(a, b, name, Bound::Node(node))? {
                        out.push(b);
                    }
                }
                Ok(out)
            }
        }
    }
}

fn match_sequence(
    a: &Automaton,
    patterns: &[Pattern<KindSet>],
    nodes: &[NodeIndex],
    bindings: Bindings,
) -> Result<Vec<Bindings>, InternalError> {
    let mut partial = vec![bindings];
    for (p, &n) in patterns.iter().zip(nodes) {
        let mut next = Vec::new();
        for b in partial {
            next.extend(p.match_with(a, n, b)?);
        }
        if next.is_empty() {
            return Ok(next);
        }
        partial = next;
    }
    Ok(partial)
}

/// Backtracking assignment of `patterns` to distinct members of a Set.
fn match_unordered(
    a: &Automaton,
    patterns: &[Pattern<KindSet>],
    rest: Option<&str>,
    children: &[NodeIndex],
    used: &mut [bool],
    bindings: Bindings,
    out: &mut Vec<Bindings>,
) -> Result<(), InternalError> {
    let Some((first, others)) = patterns.split_first() else {
        let remaining: Vec<NodeIndex> = children
            .iter()
            .zip(used.iter())
            .filter(|(_, u)| !**u)
            .map(|(c, _)| *c)
            .collect();
        match rest {
            Some(name) => {
                if let Some(b) = bind(a, bindings, name, Bound::Many(remaining))? {
                    out.push(b);
                }
            }
            None if remaining.is_empty() => out.push(bindings),
            None => {}
        }
        return Ok(());
    };
    for i in 0..children.len() {
        if used[i] {
            continue;
        }
        for b in first.match_with(a, children[i], bindings.clone())? {
            used[i] = true;
            match_unordered(a, others, rest, children, used, b, out)?;
            used[i] = false;
        }
    }
    Ok(())
}
