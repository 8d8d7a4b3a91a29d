//! Versioned pointer cells
//!
//! A cell is a fixed-length array of successor references tagged with the
//! version that created it. A cell stays writable while an insert is still
//! assembling it and becomes immutable once sealed. Nodes never rewrite a
//! sealed cell; a change to a node's successors always produces a new cell,
//! which is what lets older versions keep sharing the untouched ones.
//!
//! Cells are owned by a [`CellArena`] and addressed through [`CellId`], so
//! nodes only carry small `(time, CellId)` pairs.

use smallvec::{SmallVec, smallvec};

use crate::Time;
use crate::node::NodeId;

/// Number of levels stored inline before a cell spills to the heap
pub const INLINE_LEVELS: usize = 4;

/// Successor slots of a single cell
pub type Slots = SmallVec<[Option<NodeId>; INLINE_LEVELS]>;

/// Handle to a cell stored in a [`CellArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    /// Position of the cell inside its arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-length successor array tagged with its creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCell {
    time: Time,
    slots: Slots,
    sealed: bool,
}

impl VersionedCell {
    /// Create an empty, unsealed cell of `len` slots
    pub fn new(time: Time, len: usize) -> Self {
        Self {
            time,
            slots: smallvec![None; len],
            sealed: false,
        }
    }

    /// Create an unsealed cell of `len` slots initialised from `source`.
    ///
    /// Only the overlapping prefix is copied: a longer target gets empty
    /// trailing slots, a shorter one drops the source's upper levels.
    pub fn copy_from(time: Time, len: usize, source: &VersionedCell) -> Self {
        let mut cell = Self::new(time, len);
        let shared = len.min(source.len());
        cell.slots[..shared].copy_from_slice(&source.slots[..shared]);
        cell
    }

    /// Version that created this cell
    pub fn time(&self) -> Time {
        self.time
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cell has no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the cell.
    pub fn get(&self, index: usize) -> Option<NodeId> {
        assert!(
            index < self.slots.len(),
            "cell index {} out of range for length {}",
            index,
            self.slots.len()
        );
        self.slots[index]
    }

    /// Overwrite slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is sealed or `index` is outside the cell.
    pub fn set(&mut self, index: usize, value: Option<NodeId>) {
        assert!(
            !self.sealed,
            "attempt to mutate a sealed cell created at time {}",
            self.time
        );
        assert!(
            index < self.slots.len(),
            "cell index {} out of range for length {}",
            index,
            self.slots.len()
        );
        self.slots[index] = value;
    }

    /// Make the cell immutable
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether [`seal`](Self::seal) has been called
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// All slots in level order
    pub fn slots(&self) -> &[Option<NodeId>] {
        &self.slots
    }

    /// Iterate over the slots in level order
    pub fn iter(&self) -> impl Iterator<Item = Option<NodeId>> + '_ {
        self.slots.iter().copied()
    }
}

/// Slab of cells with slot recycling
#[derive(Debug, Default)]
pub struct CellArena {
    cells: Vec<Option<VersionedCell>>,
    free: Vec<u32>,
    live: usize,
}

impl CellArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena with room for `capacity` cells
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store `cell`, reusing a freed slot when one is available
    pub fn alloc(&mut self, cell: VersionedCell) -> CellId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.cells[index as usize] = Some(cell);
                CellId(index)
            }
            None => {
                let index = u32::try_from(self.cells.len()).expect("cell arena exhausted");
                self.cells.push(Some(cell));
                CellId(index)
            }
        }
    }

    /// Shared access to a live cell.
    ///
    /// # Panics
    ///
    /// Panics if `id` was freed.
    pub fn get(&self, id: CellId) -> &VersionedCell {
        self.cells
            .get(id.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("dangling cell id {:?}", id))
    }

    /// Exclusive access to a live cell. Mutation still honours the seal.
    pub fn get_mut(&mut self, id: CellId) -> &mut VersionedCell {
        self.cells
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("dangling cell id {:?}", id))
    }

    /// Remove a cell from the arena and hand it back
    pub fn free(&mut self, id: CellId) -> VersionedCell {
        let cell = self
            .cells
            .get_mut(id.index())
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("double free of cell id {:?}", id));
        self.free.push(id.0);
        self.live -= 1;
        cell
    }

    /// Number of live cells
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no cell is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live cells
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &VersionedCell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.as_ref().map(|c| (CellId(i as u32), c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> Option<NodeId> {
        Some(NodeId::from_raw(n))
    }

    #[test]
    fn test_copy_from_longer_and_shorter() {
        let mut source = VersionedCell::new(0, 3);
        source.set(0, id(1));
        source.set(2, id(3));

        let grown = VersionedCell::copy_from(1, 5, &source);
        assert_eq!(grown.slots(), &[id(1), None, id(3), None, None]);
        assert_eq!(grown.time(), 1);

        let shrunk = VersionedCell::copy_from(1, 1, &source);
        assert_eq!(shrunk.slots(), &[id(1)]);
    }

    #[test]
    fn test_seal_keeps_contents() {
        let mut cell = VersionedCell::new(4, 2);
        cell.set(1, id(9));
        assert!(!cell.is_sealed());
        cell.seal();
        assert!(cell.is_sealed());
        assert_eq!(cell.get(1), id(9));
        assert_eq!(cell.get(0), None);
    }

    #[test]
    #[should_panic(expected = "sealed cell")]
    fn test_set_after_seal_panics() {
        let mut cell = VersionedCell::new(0, 1);
        cell.seal();
        cell.set(0, id(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_get_out_of_range_panics() {
        let cell = VersionedCell::new(0, 2);
        cell.get(2);
    }

    #[test]
    fn test_arena_recycles_slots() {
        let mut arena = CellArena::new();
        let a = arena.alloc(VersionedCell::new(0, 1));
        let b = arena.alloc(VersionedCell::new(1, 2));
        assert_eq!(arena.len(), 2);

        let freed = arena.free(a);
        assert_eq!(freed.time(), 0);
        assert_eq!(arena.len(), 1);

        let c = arena.alloc(VersionedCell::new(2, 3));
        assert_eq!(c, a);
        assert_eq!(arena.get(c).len(), 3);
        assert_eq!(arena.get(b).time(), 1);
        assert_eq!(arena.iter().count(), 2);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let mut arena = CellArena::new();
        let a = arena.alloc(VersionedCell::new(0, 1));
        arena.free(a);
        arena.free(a);
    }
}
