//! Arena-backed automata.
//!
//! An [`Automaton`] is a grow-only arena of [`State`]s plus a dense list of
//! labelled roots. It encodes one data value, one type expression, or (for
//! pools) many of them sharing structure.
//!
//! # Invariants
//! - Every child index refers to a node of the same automaton.
//! - A `Term`'s contents, when present, is a `List` node.
//! - `Set` children are sorted and duplicate-free; `Bag` children are sorted.
//!
//! `add` hash-conses states, so structurally identical acyclic subgraphs built
//! through `add` share one node. `reserve`/`set` exist for back-edges.

mod canonical;

use crate::arena::{NodeArena, NodeIndex};
use crate::error::InternalError;
use crate::schema::KindId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use canonical::canonicalize;

/// Ordering and duplicate policy of a collection node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Unordered, duplicate-free.
    Set,
    /// Unordered, duplicates counted.
    Bag,
    /// Ordered.
    List,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Set => write!(f, "Set"),
            CollectionKind::Bag => write!(f, "Bag"),
            CollectionKind::List => write!(f, "List"),
        }
    }
}

/// A real number stored by its IEEE-754 bit pattern so states stay `Eq + Hash`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Real(u64);

impl Real {
    pub fn from_f64(value: f64) -> Self {
        Self(value.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

/// One node of an automaton.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum State {
    Bool(bool),
    Int(i64),
    Real(Real),
    Str(String),
    /// A schema term. `contents: None` is the VOID sentinel.
    Term {
        kind: KindId,
        contents: Option<NodeIndex>,
    },
    Collection {
        kind: CollectionKind,
        children: Vec<NodeIndex>,
    },
}

impl State {
    pub fn term(kind: KindId, contents: Option<NodeIndex>) -> Self {
        State::Term { kind, contents }
    }

    /// A term with VOID contents.
    pub fn leaf(kind: KindId) -> Self {
        State::Term {
            kind,
            contents: None,
        }
    }

    pub fn set(children: Vec<NodeIndex>) -> Self {
        State::Collection {
            kind: CollectionKind::Set,
            children,
        }
    }

    pub fn bag(children: Vec<NodeIndex>) -> Self {
        State::Collection {
            kind: CollectionKind::Bag,
            children,
        }
    }

    pub fn list(children: Vec<NodeIndex>) -> Self {
        State::Collection {
            kind: CollectionKind::List,
            children,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        State::Str(value.into())
    }

    pub fn real(value: f64) -> Self {
        State::Real(Real::from_f64(value))
    }

    /// Children of a collection of the given kind.
    pub fn as_collection(&self, want: CollectionKind) -> Option<&[NodeIndex]> {
        match self {
            State::Collection { kind, children } if *kind == want => Some(children),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NodeIndex]> {
        self.as_collection(CollectionKind::List)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            State::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Indices this state points at, in order.
    pub fn children(&self) -> &[NodeIndex] {
        match self {
            State::Term {
                contents: Some(c), ..
            } => std::slice::from_ref(c),
            State::Collection { children, .. } => children,
            _ => &[],
        }
    }

    /// Short human-readable shape used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            State::Bool(b) => format!("Bool({b})"),
            State::Int(i) => format!("Int({i})"),
            State::Real(r) => format!("Real({})", r.value()),
            State::Str(s) => format!("Str({s:?})"),
            State::Term { kind, contents } => match contents {
                Some(c) => format!("Term({kind}, {c})"),
                None => format!("Term({kind})"),
            },
            State::Collection { kind, children } => format!("{kind} of {}", children.len()),
        }
    }

    fn normalized(self) -> Self {
        match self {
            State::Collection {
                kind: CollectionKind::Set,
                mut children,
            } => {
                children.sort();
                children.dedup();
                State::set(children)
            }
            State::Collection {
                kind: CollectionKind::Bag,
                mut children,
            } => {
                children.sort();
                State::bag(children)
            }
            other => other,
        }
    }
}

#[derive(Deserialize)]
struct AutomatonImage {
    nodes: NodeArena<State>,
    roots: Vec<NodeIndex>,
}

/// A graph of states with labelled roots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "AutomatonImage")]
pub struct Automaton {
    nodes: NodeArena<State>,
    roots: Vec<NodeIndex>,
    #[serde(skip)]
    interned: HashMap<State, NodeIndex>,
}

impl From<AutomatonImage> for Automaton {
    fn from(image: AutomatonImage) -> Self {
        let mut interned = HashMap::with_capacity(image.nodes.len());
        for (idx, state) in image.nodes.iter() {
            interned.entry(state.clone()).or_insert(idx);
        }
        Self {
            nodes: image.nodes,
            roots: image.roots,
            interned,
        }
    }
}

impl PartialEq for Automaton {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.roots == other.roots
    }
}

impl Eq for Automaton {}

impl Hash for Automaton {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nodes.hash(state);
        self.roots.hash(state);
    }
}

impl Automaton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: NodeArena::with_capacity(capacity),
            roots: Vec::new(),
            interned: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a state, returning the index of an identical existing state if any.
    ///
    /// # Panics
    /// Panics if the state points outside this automaton or a term's contents
    /// is not a List.
    pub fn add(&mut self, state: State) -> NodeIndex {
        let state = state.normalized();
        self.check_edges(&state);
        if let Some(&idx) = self.interned.get(&state) {
            return idx;
        }
        let idx = self.nodes.allocate(state.clone());
        self.interned.insert(state, idx);
        idx
    }

    /// Allocates a placeholder (an empty List) to be filled by [`Automaton::set`].
    ///
    /// Placeholders are not interned, so each call returns a fresh node.
    pub fn reserve(&mut self) -> NodeIndex {
        self.nodes.allocate(State::list(Vec::new()))
    }

    /// Overwrites a node in place. Used to close back-edges.
    ///
    /// # Panics
    /// Panics under the same conditions as [`Automaton::add`], or if `idx` is
    /// out of range.
    pub fn set(&mut self, idx: NodeIndex, state: State) {
        let state = state.normalized();
        self.check_edges(&state);
        let slot = match self.nodes.get_mut(idx) {
            Some(slot) => slot,
            None => panic!("set: {idx} out of range"),
        };
        let old = std::mem::replace(slot, state.clone());
        if self.interned.get(&old) == Some(&idx) {
            self.interned.remove(&old);
        }
        self.interned.entry(state).or_insert(idx);
    }

    /// Reads a node.
    ///
    /// # Panics
    /// Panics if `idx` is out of range; use [`Automaton::try_get`] on data
    /// that has not been validated.
    pub fn get(&self, idx: NodeIndex) -> &State {
        match self.nodes.get(idx) {
            Some(state) => state,
            None => panic!("{idx} out of range for automaton of {} nodes", self.len()),
        }
    }

    pub fn try_get(&self, idx: NodeIndex) -> Result<&State, InternalError> {
        self.nodes.get(idx).ok_or(InternalError::IndexOutOfRange {
            index: idx,
            len: self.nodes.len(),
        })
    }

    /// Reads the contents List of a term node.
    pub fn term_fields(&self, idx: NodeIndex) -> Result<(KindId, Option<&[NodeIndex]>), InternalError> {
        match self.try_get(idx)? {
            State::Term { kind, contents } => match contents {
                None => Ok((*kind, None)),
                Some(c) => match self.try_get(*c)? {
                    State::Collection {
                        kind: CollectionKind::List,
                        children,
                    } => Ok((*kind, Some(children))),
                    other => Err(InternalError::ShapeMismatch {
                        node: *c,
                        expected: "List contents",
                        found: other.describe(),
                    }),
                },
            },
            other => Err(InternalError::ShapeMismatch {
                node: idx,
                expected: "Term",
                found: other.describe(),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &State)> {
        self.nodes.iter()
    }

    /// Assigns root `label`. Labels are dense: `label` may be at most `roots().len()`.
    pub fn set_root(&mut self, label: usize, idx: NodeIndex) {
        assert!(self.nodes.contains(idx), "root {idx} out of range");
        assert!(label <= self.roots.len(), "root labels must be dense");
        if label == self.roots.len() {
            self.roots.push(idx);
        } else {
            self.roots[label] = idx;
        }
    }

    /// Appends a root and returns its label.
    pub fn push_root(&mut self, idx: NodeIndex) -> usize {
        let label = self.roots.len();
        self.set_root(label, idx);
        label
    }

    pub fn root(&self, label: usize) -> Option<NodeIndex> {
        self.roots.get(label).copied()
    }

    pub fn try_root(&self, label: usize) -> Result<NodeIndex, InternalError> {
        self.root(label).ok_or(InternalError::MissingRoot { label })
    }

    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Copies the subgraph of `src` reachable from `root` into this automaton.
    ///
    /// Topology is preserved, cycles included. Returns the index of the copied
    /// root in this automaton.
    pub fn add_all(&mut self, src: &Automaton, root: NodeIndex) -> NodeIndex {
        let order = src.reachable(root);
        let mut map = HashMap::with_capacity(order.len());
        for &old in &order {
            map.insert(old, self.reserve());
        }
        let remap = |i: &NodeIndex| map.get(i).copied().unwrap_or(*i);
        for &old in &order {
            let state = match src.get(old) {
                State::Term { kind, contents } => State::Term {
                    kind: *kind,
                    contents: contents.as_ref().map(remap),
                },
                State::Collection { kind, children } => State::Collection {
                    kind: *kind,
                    children: children.iter().map(remap).collect(),
                },
                atom => atom.clone(),
            };
            self.set(map[&old], state);
        }
        map[&root]
    }

    /// Nodes reachable from `root`, in pre-order.
    pub fn reachable(&self, root: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = vec![false; self.len()];
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let slot = idx.as_usize();
            if slot >= seen.len() || seen[slot] {
                continue;
            }
            seen[slot] = true;
            order.push(idx);
            stack.extend(self.get(idx).children().iter().rev().copied());
        }
        order
    }

    /// Checks every structural invariant. Used on automata reloaded from bytes.
    pub fn validate(&self) -> Result<(), InternalError> {
        for (idx, state) in self.nodes.iter() {
            for &child in state.children() {
                self.try_get(child)?;
            }
            if let State::Term {
                contents: Some(c), ..
            } = state
            {
                if self.get(*c).as_list().is_none() {
                    return Err(InternalError::ShapeMismatch {
                        node: idx,
                        expected: "List contents",
                        found: self.get(*c).describe(),
                    });
                }
            }
        }
        for &root in &self.roots {
            self.try_get(root)?;
        }
        Ok(())
    }

    /// Compact, deterministic copy of the graph under `root`, labelled root 0.
    pub fn canonicalize(&self, root: NodeIndex) -> Result<Automaton, InternalError> {
        canonicalize(self, root, &|n| n)
    }

    /// Canonical copy in which every edge into `from` is followed to `to`
    /// instead, except inside the contents of `opaque` terms.
    pub fn canonicalize_redirected(
        &self,
        root: NodeIndex,
        from: NodeIndex,
        to: NodeIndex,
        opaque: &[KindId],
    ) -> Result<Automaton, InternalError> {
        let (substituted, new_root) = canonical::substitute(self, root, from, to, opaque)?;
        canonicalize(&substituted, new_root, &|n| n)
    }

    fn check_edges(&self, state: &State) {
        for &child in state.children() {
            assert!(
                self.nodes.contains(child),
                "edge to {child} outside automaton of {} nodes",
                self.len()
            );
        }
        if let State::Term {
            contents: Some(c), ..
        } = state
        {
            assert!(
                self.get(*c).as_list().is_some(),
                "term contents {c} must be a List"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(n: u32) -> KindId {
        KindId::new(n)
    }

    #[test]
    fn add_interns_identical_states() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(7));
        let y = a.add(State::Int(7));
        assert_eq!(x, y);
        let l1 = a.add(State::list(vec![x]));
        let l2 = a.add(State::list(vec![y]));
        assert_eq!(l1, l2);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn set_children_are_sorted_and_deduplicated() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        let y = a.add(State::Int(2));
        let s = a.add(State::set(vec![y, x, y]));
        assert_eq!(a.get(s).as_collection(CollectionKind::Set), Some(&[x, y][..]));
        let b = a.add(State::bag(vec![y, x, y]));
        assert_eq!(a.get(b).as_collection(CollectionKind::Bag), Some(&[x, y, y][..]));
    }

    #[test]
    #[should_panic(expected = "must be a List")]
    fn term_contents_must_be_list() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        a.add(State::term(k(0), Some(x)));
    }

    #[test]
    fn try_get_reports_out_of_range() {
        let a = Automaton::new();
        let err = a.try_get(NodeIndex::new(3)).unwrap_err();
        assert_eq!(
            err,
            InternalError::IndexOutOfRange {
                index: NodeIndex::new(3),
                len: 0
            }
        );
    }

    #[test]
    fn add_all_preserves_cycles() {
        let mut src = Automaton::new();
        src.add(State::string("padding"));
        let t = src.reserve();
        let l = src.add(State::list(vec![t]));
        src.set(t, State::term(k(2), Some(l)));

        let mut dst = Automaton::new();
        dst.add(State::Bool(true));
        let copied = dst.add_all(&src, t);
        let (kind, fields) = dst.term_fields(copied).unwrap();
        assert_eq!(kind, k(2));
        assert_eq!(fields, Some(&[copied][..]));
        dst.validate().unwrap();
    }

    #[test]
    fn roots_are_dense_labels() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        let y = a.add(State::Int(2));
        assert_eq!(a.push_root(x), 0);
        assert_eq!(a.push_root(y), 1);
        a.set_root(0, y);
        assert_eq!(a.root(0), Some(y));
        assert_eq!(a.try_root(5), Err(InternalError::MissingRoot { label: 5 }));
    }

    #[test]
    fn reachable_is_preorder() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        let y = a.add(State::Int(2));
        let l = a.add(State::list(vec![x, y]));
        a.add(State::Int(99));
        assert_eq!(a.reachable(l), vec![l, x, y]);
    }

    #[test]
    fn serde_roundtrip_rebuilds_interning() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(5));
        a.push_root(x);
        let bytes = serde_cbor::to_vec(&a).unwrap();
        let mut back: Automaton = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(back, a);
        assert_eq!(back.add(State::Int(5)), x);
    }

    #[test]
    fn validate_rejects_dangling_edges() {
        let image = AutomatonImage {
            nodes: {
                let mut arena = NodeArena::new();
                arena.allocate(State::list(vec![NodeIndex::new(4)]));
                arena
            },
            roots: vec![NodeIndex::new(0)],
        };
        let a = Automaton::from(image);
        assert!(matches!(
            a.validate(),
            Err(InternalError::IndexOutOfRange { .. })
        ));
    }
}
