//! Skip list vertices
//!
//! A node owns its payload, a height fixed at creation, and the time-ordered
//! history of its successor cells. Each level also carries one back-reference
//! naming the node that currently links to it at that level. Back-references
//! are plain indices: they never keep anything alive and exist only so a
//! detach can find the predecessor to rewire.

use std::cmp::Ordering;

use smallvec::{SmallVec, smallvec};

use crate::Time;
use crate::cell::{CellId, INLINE_LEVELS};

/// Handle to a node stored in a skip list's node arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Position of the node inside its arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node payload: a value or one of the two infinite sentinels
#[derive(Debug, Clone)]
pub enum Key<T> {
    /// Sorts before every value
    NegInf,
    /// A real payload
    Value(T),
    /// Sorts after every value
    PosInf,
}

impl<T> Key<T> {
    /// The payload, or `None` for a sentinel
    pub fn value(&self) -> Option<&T> {
        match self {
            Key::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this key is one of the infinities
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Key::Value(_))
    }
}

impl<T: Ord> Key<T> {
    /// Compare this key against a bare value
    pub fn cmp_value(&self, value: &T) -> Ordering {
        match self {
            Key::NegInf => Ordering::Less,
            Key::Value(v) => v.cmp(value),
            Key::PosInf => Ordering::Greater,
        }
    }
}

impl<T: Ord> Ord for Key<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::NegInf, Key::NegInf) | (Key::PosInf, Key::PosInf) => Ordering::Equal,
            (Key::NegInf, _) | (_, Key::PosInf) => Ordering::Less,
            (_, Key::NegInf) | (Key::PosInf, _) => Ordering::Greater,
            (Key::Value(a), Key::Value(b)) => a.cmp(b),
        }
    }
}

impl<T: Ord> PartialOrd for Key<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Key<T> {}

/// A skip list vertex
#[derive(Debug, Clone)]
pub struct Node<T> {
    key: Key<T>,
    height: usize,
    /// Successor cells, strictly increasing in time
    history: SmallVec<[(Time, CellId); 2]>,
    back: SmallVec<[Option<NodeId>; INLINE_LEVELS]>,
    refs: u32,
    detached_at: Option<Time>,
}

impl<T> Node<T> {
    /// Create a node holding `value` with the given tower height.
    ///
    /// # Panics
    ///
    /// Panics if `height` is zero.
    pub fn new(value: T, height: usize) -> Self {
        Self::with_key(Key::Value(value), height)
    }

    /// Create a positive or negative infinity terminator
    pub fn sentinel(positive: bool, height: usize) -> Self {
        let key = if positive { Key::PosInf } else { Key::NegInf };
        Self::with_key(key, height)
    }

    fn with_key(key: Key<T>, height: usize) -> Self {
        assert!(height >= 1, "node height must be at least 1");
        Self {
            key,
            height,
            history: SmallVec::new(),
            back: smallvec![None; height],
            refs: 0,
            detached_at: None,
        }
    }

    /// The node's key
    pub fn key(&self) -> &Key<T> {
        &self.key
    }

    /// The payload, `None` for sentinels
    pub fn value(&self) -> Option<&T> {
        self.key.value()
    }

    /// Whether this node is a sentinel
    pub fn is_sentinel(&self) -> bool {
        self.key.is_sentinel()
    }

    /// Number of levels in the tower
    pub fn height(&self) -> usize {
        self.height
    }

    /// The cell in effect at time `t`: the latest one created at or before `t`
    pub fn successors(&self, t: Time) -> Option<CellId> {
        let idx = self.history.partition_point(|&(time, _)| time <= t);
        idx.checked_sub(1).map(|i| self.history[i].1)
    }

    /// The most recent history entry
    pub fn latest(&self) -> Option<(Time, CellId)> {
        self.history.last().copied()
    }

    /// The full successor history, oldest first
    pub fn history(&self) -> &[(Time, CellId)] {
        &self.history
    }

    /// Record `cell` as this node's successors from `time` on.
    ///
    /// An entry at the same time as the last one replaces it; the replaced
    /// cell is returned so the caller can release it.
    ///
    /// # Panics
    ///
    /// Panics if `time` precedes the last recorded time.
    pub(crate) fn push_history(&mut self, time: Time, cell: CellId) -> Option<CellId> {
        if let Some(last) = self.history.last_mut() {
            assert!(
                time >= last.0,
                "non-monotonic successor append: time {} after {}",
                time,
                last.0
            );
            if time == last.0 {
                return Some(std::mem::replace(&mut last.1, cell));
            }
        }
        self.history.push((time, cell));
        None
    }

    /// Forget every entry superseded at or before `keep`.
    ///
    /// The entry in effect at `keep` survives so `keep` and later stay
    /// answerable. Returns the cells that were dropped.
    pub(crate) fn truncate_history(&mut self, keep: Time) -> SmallVec<[CellId; 2]> {
        let in_effect = self.history.partition_point(|&(time, _)| time <= keep);
        if in_effect <= 1 {
            return SmallVec::new();
        }
        self.history.drain(..in_effect - 1).map(|(_, cell)| cell).collect()
    }

    /// Remove the entry committed at `time` if it is the latest and an
    /// earlier one remains to fall back on
    pub(crate) fn pop_history_at(&mut self, time: Time) -> Option<CellId> {
        match self.history.as_slice() {
            [.., _, (last, _)] if *last == time => self.history.pop().map(|(_, cell)| cell),
            _ => None,
        }
    }

    /// Take the whole history out of the node
    pub(crate) fn take_history(&mut self) -> SmallVec<[(Time, CellId); 2]> {
        std::mem::take(&mut self.history)
    }

    /// Predecessor currently linking to this node at `level`
    pub fn back_reference(&self, level: usize) -> Option<NodeId> {
        self.back[level]
    }

    /// Record `node` as the predecessor at `level`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied.
    pub fn set_back_reference(&mut self, level: usize, node: NodeId) {
        assert!(
            self.back[level].is_none(),
            "back-reference slot {} already occupied by {:?}",
            level,
            self.back[level]
        );
        self.back[level] = Some(node);
    }

    /// Empty the slot at `level`, returning what it held
    pub fn clear_back_reference(&mut self, level: usize) -> Option<NodeId> {
        self.back[level].take()
    }

    /// Count one more owning edge
    pub fn add_reference(&mut self) {
        self.refs += 1;
    }

    /// Drop one owning edge; `true` when none are left.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    pub fn release(&mut self) -> bool {
        assert!(self.refs > 0, "release of a node with no references");
        self.refs -= 1;
        self.refs == 0
    }

    /// Current number of owning edges
    pub fn ref_count(&self) -> u32 {
        self.refs
    }

    /// Version at which the node was unlinked, if it was
    pub fn detached_at(&self) -> Option<Time> {
        self.detached_at
    }

    pub(crate) fn mark_detached(&mut self, time: Time) {
        self.detached_at = Some(time);
    }
}

impl<T: Ord> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: Ord> PartialOrd for Node<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.key.cmp(&other.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellArena, VersionedCell};

    #[test]
    fn test_sentinel_ordering() {
        let neg: Key<i32> = Key::NegInf;
        let pos: Key<i32> = Key::PosInf;
        let v = Key::Value(7);

        assert!(neg < v);
        assert!(v < pos);
        assert!(neg < pos);
        assert_eq!(neg.cmp(&Key::NegInf), Ordering::Equal);
        assert_eq!(pos.partial_cmp(&Key::PosInf), Some(Ordering::Equal));
        assert_eq!(neg.cmp_value(&i32::MIN), Ordering::Less);
        assert_eq!(pos.cmp_value(&i32::MAX), Ordering::Greater);
    }

    #[test]
    fn test_node_comparison_follows_payload() {
        let a = Node::new(3, 1);
        let b = Node::new(5, 2);
        let top = Node::<i32>::sentinel(true, 4);
        let bottom = Node::<i32>::sentinel(false, 4);

        assert!(a < b);
        assert!(b < top);
        assert!(bottom < a);
        assert!(top.is_sentinel());
        assert_eq!(top.value(), None);
        assert_eq!(top.height(), 4);
    }

    #[test]
    fn test_successors_picks_latest_not_future() {
        let mut arena = CellArena::new();
        let mut node = Node::new(1, 1);
        let c2 = arena.alloc(VersionedCell::new(2, 1));
        let c5 = arena.alloc(VersionedCell::new(5, 1));
        node.push_history(2, c2);
        node.push_history(5, c5);

        assert_eq!(node.successors(0), None);
        assert_eq!(node.successors(1), None);
        assert_eq!(node.successors(2), Some(c2));
        assert_eq!(node.successors(4), Some(c2));
        assert_eq!(node.successors(5), Some(c5));
        assert_eq!(node.successors(99), Some(c5));
    }

    #[test]
    fn test_same_time_append_replaces() {
        let mut arena = CellArena::new();
        let mut node = Node::new(1, 1);
        let first = arena.alloc(VersionedCell::new(3, 1));
        let second = arena.alloc(VersionedCell::new(3, 1));

        assert_eq!(node.push_history(3, first), None);
        assert_eq!(node.push_history(3, second), Some(first));
        assert_eq!(node.history(), &[(3, second)]);
    }

    #[test]
    #[should_panic(expected = "non-monotonic")]
    fn test_backwards_append_panics() {
        let mut arena = CellArena::new();
        let mut node = Node::new(1, 1);
        node.push_history(4, arena.alloc(VersionedCell::new(4, 1)));
        node.push_history(3, arena.alloc(VersionedCell::new(3, 1)));
    }

    #[test]
    fn test_truncate_history_keeps_entry_in_effect() {
        let mut arena = CellArena::new();
        let mut node = Node::new(1, 1);
        let cells: Vec<_> = [1, 3, 6]
            .iter()
            .map(|&t| {
                let c = arena.alloc(VersionedCell::new(t, 1));
                node.push_history(t, c);
                c
            })
            .collect();

        assert!(node.truncate_history(2).is_empty());
        assert_eq!(node.truncate_history(4).as_slice(), &[cells[0]]);
        assert_eq!(node.history(), &[(3, cells[1]), (6, cells[2])]);
        assert!(node.truncate_history(0).is_empty());
        assert_eq!(node.successors(4), Some(cells[1]));
    }

    #[test]
    fn test_pop_history_needs_a_fallback() {
        let mut arena = CellArena::new();
        let mut node = Node::new(1, 1);
        let c1 = arena.alloc(VersionedCell::new(1, 1));
        let c4 = arena.alloc(VersionedCell::new(4, 1));

        node.push_history(1, c1);
        assert_eq!(node.pop_history_at(1), None);
        node.push_history(4, c4);
        assert_eq!(node.pop_history_at(3), None);
        assert_eq!(node.pop_history_at(4), Some(c4));
        assert_eq!(node.history(), &[(1, c1)]);
        assert_eq!(node.successors(9), Some(c1));
    }

    #[test]
    fn test_back_reference_slot() {
        let mut node = Node::new(1, 2);
        node.set_back_reference(1, NodeId(7));
        assert_eq!(node.back_reference(1), Some(NodeId(7)));
        assert_eq!(node.back_reference(0), None);
        assert_eq!(node.clear_back_reference(1), Some(NodeId(7)));
        node.set_back_reference(1, NodeId(8));
        assert_eq!(node.back_reference(1), Some(NodeId(8)));
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn test_second_predecessor_panics() {
        let mut node = Node::new(1, 1);
        node.set_back_reference(0, NodeId(2));
        node.set_back_reference(0, NodeId(3));
    }

    #[test]
    fn test_reference_counting() {
        let mut node = Node::new("x", 1);
        node.add_reference();
        node.add_reference();
        assert!(!node.release());
        assert!(node.release());
        assert_eq!(node.ref_count(), 0);
    }

    #[test]
    #[should_panic(expected = "no references")]
    fn test_release_below_zero_panics() {
        let mut node = Node::new(0u8, 1);
        node.release();
    }
}
