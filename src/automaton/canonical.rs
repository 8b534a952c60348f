//! Canonical layout of automata.
//!
//! Copies the graph reachable from a root into a fresh automaton in a
//! deterministic post-order. Unordered children are visited in fingerprint
//! order and Set members with equal fingerprints are merged, so two
//! structurally equal graphs produce equal automata regardless of how they
//! were built.

use super::{Automaton, CollectionKind, State};
use crate::arena::NodeIndex;
use crate::error::InternalError;
use crate::fingerprint::{HashValue, StructuralHasher};
use crate::schema::KindId;
use std::collections::HashMap;

enum Slot {
    InProgress(Option<NodeIndex>),
    Done(NodeIndex),
}

struct Copier<'a> {
    src: &'a Automaton,
    redirect: &'a dyn Fn(NodeIndex) -> NodeIndex,
    hasher: StructuralHasher<'a>,
    out: Automaton,
    slots: HashMap<NodeIndex, Slot>,
}

/// Canonical copy of the graph under `root`, following `redirect` on every edge.
pub fn canonicalize(
    src: &Automaton,
    root: NodeIndex,
    redirect: &dyn Fn(NodeIndex) -> NodeIndex,
) -> Result<Automaton, InternalError> {
    let mut copier = Copier {
        src,
        redirect,
        hasher: StructuralHasher::with_redirect(src, redirect),
        out: Automaton::new(),
        slots: HashMap::new(),
    };
    let new_root = copier.copy(root)?;
    let mut out = copier.out;
    out.set_root(0, new_root);
    Ok(out)
}

impl<'a> Copier<'a> {
    fn copy(&mut self, node: NodeIndex) -> Result<NodeIndex, InternalError> {
        let node = (self.redirect)(node);
        match self.slots.get_mut(&node) {
            Some(Slot::Done(idx)) => return Ok(*idx),
            Some(Slot::InProgress(placeholder)) => {
                // Back-edge: hand out a placeholder filled when `node` completes.
                let idx = match placeholder {
                    Some(idx) => *idx,
                    None => {
                        let idx = self.out.reserve();
                        *placeholder = Some(idx);
                        idx
                    }
                };
                return Ok(idx);
            }
            None => {}
        }
        self.slots.insert(node, Slot::InProgress(None));

        let src = self.src;
        let state = match src.try_get(node)? {
            State::Term { kind, contents } => {
                let contents = match contents {
                    Some(c) => Some(self.copy(*c)?),
                    None => None,
                };
                State::Term {
                    kind: *kind,
                    contents,
                }
            }
            State::Collection { kind, children } => {
                let kind = *kind;
                let children = self.order_children(kind, children)?;
                let mut copied = Vec::with_capacity(children.len());
                for child in children {
                    copied.push(self.copy(child)?);
                }
                State::Collection {
                    kind,
                    children: copied,
                }
            }
            atom => atom.clone(),
        };

        let idx = match self.slots.remove(&node) {
            Some(Slot::InProgress(Some(placeholder))) => {
                self.out.set(placeholder, state);
                placeholder
            }
            _ => self.out.add(state),
        };
        self.slots.insert(node, Slot::Done(idx));
        Ok(idx)
    }

    fn order_children(
        &mut self,
        kind: CollectionKind,
        children: &[NodeIndex],
    ) -> Result<Vec<NodeIndex>, InternalError> {
        if kind == CollectionKind::List {
            return Ok(children.to_vec());
        }
        let mut keyed: Vec<(HashValue, NodeIndex)> = Vec::with_capacity(children.len());
        for &child in children {
            keyed.push((self.hasher.hash(child)?, child));
        }
        keyed.sort_by_key(|(h, _)| *h);
        if kind == CollectionKind::Set {
            keyed.dedup_by_key(|(h, _)| *h);
        }
        Ok(keyed.into_iter().map(|(_, child)| child).collect())
    }
}

/// Copy of the graph under `root` with edges into `from` sent to `to`,
/// except inside the contents of terms whose kind is in `opaque`.
///
/// A node shared between an opaque body and the rest of the graph is copied
/// twice, so the body keeps the original. The copy is not canonical.
pub fn substitute(
    src: &Automaton,
    root: NodeIndex,
    from: NodeIndex,
    to: NodeIndex,
    opaque: &[KindId],
) -> Result<(Automaton, NodeIndex), InternalError> {
    let mut sub = Substitution {
        src,
        from,
        to,
        opaque,
        out: Automaton::new(),
        slots: HashMap::new(),
    };
    let new_root = sub.copy(root, false)?;
    Ok((sub.out, new_root))
}

struct Substitution<'a> {
    src: &'a Automaton,
    from: NodeIndex,
    to: NodeIndex,
    opaque: &'a [KindId],
    out: Automaton,
    /// Keyed by source node and whether it sits inside an opaque body.
    slots: HashMap<(NodeIndex, bool), Slot>,
}

impl<'a> Substitution<'a> {
    fn copy(&mut self, node: NodeIndex, sealed: bool) -> Result<NodeIndex, InternalError> {
        let node = if !sealed && node == self.from { self.to } else { node };
        let key = (node, sealed);
        match self.slots.get_mut(&key) {
            Some(Slot::Done(idx)) => return Ok(*idx),
            Some(Slot::InProgress(placeholder)) => {
                let idx = match placeholder {
                    Some(idx) => *idx,
                    None => {
                        let idx = self.out.reserve();
                        *placeholder = Some(idx);
                        idx
                    }
                };
                return Ok(idx);
            }
            None => {}
        }
        self.slots.insert(key, Slot::InProgress(None));

        let src = self.src;
        let state = match src.try_get(node)? {
            State::Term { kind, contents } => {
                let inner = sealed || self.opaque.contains(kind);
                let contents = match contents {
                    Some(c) => Some(self.copy(*c, inner)?),
                    None => None,
                };
                State::Term {
                    kind: *kind,
                    contents,
                }
            }
            State::Collection { kind, children } => {
                let mut copied = Vec::with_capacity(children.len());
                for &child in children {
                    copied.push(self.copy(child, sealed)?);
                }
                State::Collection {
                    kind: *kind,
                    children: copied,
                }
            }
            atom => atom.clone(),
        };

        let idx = match self.slots.remove(&key) {
            Some(Slot::InProgress(Some(placeholder))) => {
                self.out.set(placeholder, state);
                placeholder
            }
            _ => self.out.add(state),
        };
        self.slots.insert(key, Slot::Done(idx));
        Ok(idx)
    }
}
