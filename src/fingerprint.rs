//! Structural fingerprinting for automata.
//!
//! Provides deterministic structural hashing with domain separation and
//! length prefixing, so identical structures hash identically regardless of
//! node numbering or construction order.
//!
//! # Cycles
//! Recursive (nominal) definitions make automata cyclic. A back-edge to a
//! node still being hashed contributes only its relative depth on the
//! current path, which keeps the hash a function of the structure seen from
//! the starting node. Results that depend on a back-edge leaving the subtree
//! are not memoized.

use crate::arena::NodeIndex;
use crate::automaton::{Automaton, CollectionKind, State};
use crate::error::InternalError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Domain for hashing a single automaton state (v0).
pub const DOMAIN_STATE_V0: &[u8] = b"STATE_V0";

/// Domain for hashing back-edges inside cycles (v0).
pub const DOMAIN_BACKREF_V0: &[u8] = b"BACKREF_V0";

/// Domain for rule set fingerprints (v0).
pub const DOMAIN_RULE_SET_V0: &[u8] = b"RULE_SET_V0";

/// Domain for normalization cache keys (v0).
pub const DOMAIN_CACHE_KEY_V0: &[u8] = b"CACHE_KEY_V0";

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// Input is `b"SEM:<domain>:v1" || u64_le(len(data)) || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SEM:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Depth marker meaning "no back-edge escapes this subtree".
const NO_BACKREF: usize = usize::MAX;

/// Memoizing structural hasher over one automaton.
///
/// `redirect` lets callers hash the graph as if every edge into one node
/// pointed at another, which is how a pending rewrite is previewed without
/// materializing it.
pub struct StructuralHasher<'a> {
    automaton: &'a Automaton,
    redirect: &'a dyn Fn(NodeIndex) -> NodeIndex,
    closed: HashMap<NodeIndex, HashValue>,
    rooted: HashMap<NodeIndex, HashValue>,
    stack: Vec<NodeIndex>,
}

impl<'a> StructuralHasher<'a> {
    pub fn new(automaton: &'a Automaton) -> Self {
        Self::with_redirect(automaton, &identity)
    }

    pub fn with_redirect(
        automaton: &'a Automaton,
        redirect: &'a dyn Fn(NodeIndex) -> NodeIndex,
    ) -> Self {
        Self {
            automaton,
            redirect,
            closed: HashMap::new(),
            rooted: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Structural hash of the graph reachable from `node`.
    pub fn hash(&mut self, node: NodeIndex) -> Result<HashValue, InternalError> {
        let node = (self.redirect)(node);
        if let Some(h) = self.rooted.get(&node) {
            return Ok(*h);
        }
        debug_assert!(self.stack.is_empty());
        let (h, _) = self.visit(node)?;
        self.rooted.insert(node, h);
        Ok(h)
    }

    fn visit(&mut self, node: NodeIndex) -> Result<(HashValue, usize), InternalError> {
        let node = (self.redirect)(node);
        if let Some(h) = self.closed.get(&node) {
            return Ok((*h, NO_BACKREF));
        }
        if let Some(pos) = self.stack.iter().position(|n| *n == node) {
            let depth = (self.stack.len() - pos) as u64;
            let h = HashValue::hash_with_domain(DOMAIN_BACKREF_V0, &depth.to_le_bytes());
            return Ok((h, pos));
        }
        let pos = self.stack.len();
        self.stack.push(node);
        let result = self.visit_state(node);
        self.stack.pop();
        let (h, min_ref) = result?;
        if min_ref >= pos {
            self.closed.insert(node, h);
        }
        Ok((h, if min_ref >= pos { NO_BACKREF } else { min_ref }))
    }

    fn visit_state(&mut self, node: NodeIndex) -> Result<(HashValue, usize), InternalError> {
        let state = self.automaton.try_get(node)?;
        let mut min_ref = NO_BACKREF;
        let mut out = Vec::with_capacity(48);
        match state {
            State::Bool(b) => {
                out.push(0);
                out.push(*b as u8);
            }
            State::Int(i) => {
                out.push(1);
                out.extend_from_slice(&i.to_le_bytes());
            }
            State::Real(r) => {
                out.push(2);
                out.extend_from_slice(&r.to_bits().to_le_bytes());
            }
            State::Str(s) => {
                out.push(3);
                out.extend_from_slice(&(s.len() as u64).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            State::Term { kind, contents } => {
                out.push(4);
                out.extend_from_slice(&kind.as_u32().to_le_bytes());
                match contents {
                    None => out.push(0),
                    Some(c) => {
                        let (h, r) = self.visit(*c)?;
                        min_ref = min_ref.min(r);
                        out.push(1);
                        out.extend_from_slice(h.as_bytes());
                    }
                }
            }
            State::Collection { kind, children } => {
                out.push(match kind {
                    CollectionKind::Set => 5,
                    CollectionKind::Bag => 6,
                    CollectionKind::List => 7,
                });
                let mut hashes = Vec::with_capacity(children.len());
                for child in children {
                    let (h, r) = self.visit(*child)?;
                    min_ref = min_ref.min(r);
                    hashes.push(h);
                }
                match kind {
                    CollectionKind::Set => {
                        hashes.sort();
                        hashes.dedup();
                    }
                    CollectionKind::Bag => hashes.sort(),
                    CollectionKind::List => {}
                }
                out.extend_from_slice(&(hashes.len() as u64).to_le_bytes());
                for h in &hashes {
                    out.extend_from_slice(h.as_bytes());
                }
            }
        }
        Ok((HashValue::hash_with_domain(DOMAIN_STATE_V0, &out), min_ref))
    }
}

fn identity(node: NodeIndex) -> NodeIndex {
    node
}

/// Structural fingerprint of the graph reachable from `root`.
pub fn structural_hash(automaton: &Automaton, root: NodeIndex) -> Result<HashValue, InternalError> {
    StructuralHasher::new(automaton).hash(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::State;
    use crate::schema::KindId;

    #[test]
    fn hash_with_domain_separates() {
        let a = HashValue::hash_with_domain(b"A", b"data");
        let b = HashValue::hash_with_domain(b"B", b"data");
        assert_ne!(a, b);
        assert_eq!(a, HashValue::hash_with_domain(b"A", b"data"));
    }

    #[test]
    fn sets_hash_independently_of_order() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        let y = a.add(State::Int(2));
        let s1 = a.add(State::set(vec![x, y]));

        let mut b = Automaton::new();
        let y2 = b.add(State::Int(2));
        let x2 = b.add(State::Int(1));
        let s2 = b.add(State::set(vec![y2, x2]));

        assert_eq!(structural_hash(&a, s1).unwrap(), structural_hash(&b, s2).unwrap());
    }

    #[test]
    fn lists_are_order_sensitive() {
        let mut a = Automaton::new();
        let x = a.add(State::Int(1));
        let y = a.add(State::Int(2));
        let l1 = a.add(State::list(vec![x, y]));
        let l2 = a.add(State::list(vec![y, x]));
        assert_ne!(structural_hash(&a, l1).unwrap(), structural_hash(&a, l2).unwrap());
    }

    #[test]
    fn cycles_terminate_and_are_stable() {
        // node0 = Term(k, List[node0]) built in two different automata.
        let build = |padding: usize| {
            let mut a = Automaton::new();
            for i in 0..padding {
                a.add(State::Int(i as i64));
            }
            let t = a.reserve();
            let l = a.add(State::list(vec![t]));
            a.set(t, State::term(KindId::new(3), Some(l)));
            (a, t)
        };
        let (a, ta) = build(0);
        let (b, tb) = build(5);
        let ha = structural_hash(&a, ta).unwrap();
        assert_eq!(ha, structural_hash(&b, tb).unwrap());
    }

    #[test]
    fn redirect_previews_substitution() {
        let mut a = Automaton::new();
        let one = a.add(State::Int(1));
        let two = a.add(State::Int(2));
        let l = a.add(State::list(vec![one]));
        let redirect = move |n: NodeIndex| if n == one { two } else { n };
        let mut preview = StructuralHasher::with_redirect(&a, &redirect);

        let mut b = Automaton::new();
        let two_b = b.add(State::Int(2));
        let lb = b.add(State::list(vec![two_b]));
        assert_eq!(preview.hash(l).unwrap(), structural_hash(&b, lb).unwrap());
    }
}
