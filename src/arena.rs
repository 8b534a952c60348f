//! Arena allocation for automaton states.
//!
//! Provides `NodeIndex` (a dense, total-orderable handle) and `NodeArena`
//! (contiguous, grow-only storage). Nodes are never removed: garbage stays
//! in the arena until the whole automaton is dropped or canonicalized into a
//! fresh one.
//!
//! # Determinism
//! - `NodeIndex` ordering is by its inner `u32`.
//! - Iteration order over slots is by index (0..len).
//! - Allocation order is exactly insertion order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense node handle for arena-allocated automata.
///
/// `NodeIndex(u32)` is `Copy`, `Eq`, `Ord`, `Hash`. The inner value is an
/// index into the owning arena's slot array and is meaningless for any other
/// arena.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Creates a new `NodeIndex` from a raw `u32`.
    ///
    /// The caller must ensure the index is within bounds of the arena that
    /// will be read with it.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize` suitable for slice access.
    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Contiguous, grow-only storage for node data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeArena<T> {
    slots: Vec<T>,
}

impl<T> NodeArena<T> {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Creates an empty arena with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Allocates a new slot holding `data` and returns its `NodeIndex`.
    ///
    /// # Panics
    /// Panics if the arena already holds `u32::MAX` nodes.
    pub fn allocate(&mut self, data: T) -> NodeIndex {
        assert!(
            self.slots.len() < u32::MAX as usize,
            "node arena exhausted the u32 index space"
        );
        let idx = self.slots.len() as u32;
        self.slots.push(data);
        NodeIndex(idx)
    }

    /// Returns a reference to the data stored at `id`, if in range.
    pub fn get(&self, id: NodeIndex) -> Option<&T> {
        self.slots.get(id.as_usize())
    }

    /// Returns a mutable reference to the data stored at `id`, if in range.
    pub fn get_mut(&mut self, id: NodeIndex) -> Option<&mut T> {
        self.slots.get_mut(id.as_usize())
    }

    /// Returns the number of allocated nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no node has been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if `id` addresses an allocated slot.
    pub fn contains(&self, id: NodeIndex) -> bool {
        id.as_usize() < self.slots.len()
    }

    /// Iterates over all nodes in deterministic order (by index).
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, data)| (NodeIndex(idx as u32), data))
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
