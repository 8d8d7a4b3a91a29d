//! Multi-version skip list engine
//!
//! Every mutation happens at the *present* version. An insert walks the
//! structure as it looks at the present, copies the successor cell of each
//! predecessor it has to rewire, and commits those copies tagged with the
//! present time. Cells of untouched nodes stay shared with every earlier
//! version, and nothing sealed is ever rewritten, so a query at any past
//! time sees exactly what was there.
//!
//! Ownership: committed cells and head records own the nodes they point at
//! (counted), back-references do not. A node is freed when its count drops to
//! zero, which only happens when cells are dropped: a same-version
//! replacement, a detach, or [`SkipList::truncate_history`].
//!
//! Versions only move forward through [`SkipList::advance_time`]. Inserts
//! made before the next advance all amend the same version.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use bitvec::prelude::*;
use log::{debug, info, trace};
use smallvec::SmallVec;

use crate::Time;
use crate::cell::{CellArena, CellId, INLINE_LEVELS, Slots, VersionedCell};
use crate::config::SkipListConfig;
use crate::cursor::{Cursor, CursorMut};
use crate::error::Error;
use crate::height::HeightSampler;
use crate::node::{Node, NodeId};

/// Negative-infinity sentinel standing for the head table
pub(crate) const HEAD: NodeId = NodeId::from_raw(0);

/// First nodes per level for one version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeadRecord {
    time: Time,
    cell: CellId,
}

/// Predecessor cells being assembled by one mutation
type WorkingCells = SmallVec<[(NodeId, VersionedCell); INLINE_LEVELS]>;

/// Cells superseded within the present version, dropped after commit
type ReplacedCells = SmallVec<[CellId; INLINE_LEVELS]>;

/// Persistent skip list
#[derive(Debug)]
pub struct SkipList<T> {
    /// Node arena; slot 0 is the head sentinel
    nodes: Vec<Option<Node<T>>>,
    free_nodes: Vec<NodeId>,
    cells: CellArena,
    /// Strictly increasing in time
    heads: Vec<HeadRecord>,
    /// Every value ever inserted
    values: BTreeSet<T>,
    present: Time,
    /// Nodes linked at the present version
    linked: usize,
    sampler: HeightSampler,
    config: SkipListConfig,
}

/// Snapshot statistics
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct SkipListStats {
    /// Present version
    pub present: Time,
    /// Retained head records
    pub versions: usize,
    /// Elements visible at the present version
    pub linked: usize,
    /// Values ever inserted
    pub inserted: usize,
    /// Allocated nodes, excluding the head sentinel
    pub live_nodes: usize,
    /// Allocated cells
    pub live_cells: usize,
    /// Height of the present head
    pub head_height: usize,
}

/// The head record in effect at a queried time
pub struct HeadView<'a, T> {
    list: &'a SkipList<T>,
    record: HeadRecord,
    query: Time,
}

/// Level-0 iterator over one version
pub struct Iter<'a, T> {
    list: &'a SkipList<T>,
    time: Time,
    next: Option<NodeId>,
}

impl<T: Ord + Clone> Default for SkipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> SkipList<T> {
    /// Create an empty skip list with default configuration
    pub fn new() -> Self {
        Self::build(SkipListConfig::default())
    }

    /// Create an empty skip list with the given configuration
    pub fn with_config(config: SkipListConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SkipListConfig) -> Self {
        let sampler = match config.seed {
            Some(seed) => HeightSampler::seeded(config.max_height, seed),
            None => HeightSampler::new(config.max_height),
        };
        let mut nodes = Vec::with_capacity(config.initial_capacity + 1);
        nodes.push(Some(Node::sentinel(false, sampler.max_height())));

        Self {
            nodes,
            free_nodes: Vec::new(),
            cells: CellArena::with_capacity(config.initial_capacity * 2),
            heads: Vec::new(),
            values: BTreeSet::new(),
            present: 0,
            linked: 0,
            sampler,
            config,
        }
    }

    /// The configuration this list was built with
    pub fn config(&self) -> &SkipListConfig {
        &self.config
    }

    /// The version new inserts land on
    pub fn present(&self) -> Time {
        self.present
    }

    /// Start a new version; later inserts no longer amend the current one
    pub fn advance_time(&mut self) -> Time {
        self.present += 1;
        debug!("advanced to version {}", self.present);
        self.present
    }

    /// Number of elements visible at the present version
    pub fn len(&self) -> usize {
        self.linked
    }

    /// Whether nothing is visible at the present version
    pub fn is_empty(&self) -> bool {
        self.linked == 0
    }

    /// Number of values ever inserted, detached ones included
    pub fn inserted(&self) -> usize {
        self.values.len()
    }

    /// Whether `value` was ever inserted; such a value is rejected forever
    pub fn was_inserted(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    /// Number of retained head records
    pub fn versions(&self) -> usize {
        self.heads.len()
    }

    /// Insert `value` at the present version.
    ///
    /// Returns the version it landed on, or [`Error::Duplicate`] without
    /// touching anything if the value was inserted before.
    pub fn insert(&mut self, value: T) -> Result<Time, Error> {
        if self.values.contains(&value) {
            return Err(Error::Duplicate);
        }
        let height = self.sampler.sample();
        Ok(self.insert_node(value, height))
    }

    /// Insert with a caller-chosen tower height, clamped to `1..=max_height`
    pub fn insert_with_height(&mut self, value: T, height: usize) -> Result<Time, Error> {
        if self.values.contains(&value) {
            return Err(Error::Duplicate);
        }
        let height = height.clamp(1, self.sampler.max_height());
        Ok(self.insert_node(value, height))
    }

    fn insert_node(&mut self, value: T, height: usize) -> Time {
        let t = self.present;
        let id = self.alloc_node(Node::new(value.clone(), height));

        let base = self.head_record_at(t).map(|record| record.cell);
        let old_height = base.map_or(0, |cell| self.cells.get(cell).len());
        let mut head = match base {
            Some(cell) => VersionedCell::copy_from(t, old_height.max(height), self.cells.get(cell)),
            None => VersionedCell::new(t, height),
        };
        let mut own = VersionedCell::new(t, height);
        let mut working = WorkingCells::new();

        // Taller than anything before: the node opens these levels
        for level in old_height..height {
            head.set(level, Some(id));
        }

        // Top-down search; while the head itself overshoots, the node
        // displaces it, otherwise it goes after the last smaller node
        let mut pred = HEAD;
        for level in (0..old_height).rev() {
            let next = self.advance_while(&mut pred, t, level, |v| v < &value);
            if level >= height {
                continue;
            }
            own.set(level, next);
            if pred == HEAD {
                head.set(level, Some(id));
            } else {
                self.working_cell(&mut working, pred, t).set(level, Some(id));
            }
        }

        // Predecessors first so each successor's back slot is free by the
        // time the new node claims it
        let touched = working.len();
        let mut replaced = self.commit_working(working);
        own.seal();
        let own = self.cells.alloc(own);
        replaced.extend(self.append_successors(id, own));
        head.seal();
        let head = self.cells.alloc(head);
        replaced.extend(self.commit_head(head));
        self.drop_cells(replaced);

        self.values.insert(value);
        self.linked += 1;
        trace!(
            "insert: node {:?} height {} at version {}, {} predecessor cell(s) copied",
            id, height, t, touched
        );
        t
    }

    /// The head record in effect at `t`
    pub fn head_at(&self, t: Time) -> Option<HeadView<'_, T>> {
        self.head_record_at(t).map(|&record| HeadView {
            list: self,
            record,
            query: t,
        })
    }

    /// Cursor on the head sentinel at the top level of version `t`
    pub fn cursor_at(&self, t: Time) -> Option<Cursor<'_, T>> {
        let top = self.level_count(HEAD, t);
        (top > 0).then(|| Cursor::new(self, HEAD, t, top - 1))
    }

    /// Mutable cursor on the head sentinel at the present version
    pub fn cursor_mut(&mut self) -> Option<CursorMut<'_, T>> {
        let t = self.present;
        let top = self.level_count(HEAD, t);
        if top == 0 {
            return None;
        }
        Some(CursorMut::new(self, HEAD, t, top - 1))
    }

    /// Cursor on `value` in version `t`
    pub fn find_at(&self, value: &T, t: Time) -> Option<Cursor<'_, T>> {
        self.lower_bound_at(value, t)
            .filter(|cursor| cursor.value() == Some(value))
    }

    /// Mutable cursor on `value` at the present version
    pub fn find_mut(&mut self, value: &T) -> Option<CursorMut<'_, T>> {
        let t = self.present;
        let id = self.find_at(value, t)?.node_id();
        Some(CursorMut::new(self, id, t, 0))
    }

    /// Whether `value` is visible in version `t`
    pub fn contains_at(&self, value: &T, t: Time) -> bool {
        self.find_at(value, t).is_some()
    }

    /// Whether `value` is visible at the present version
    pub fn contains(&self, value: &T) -> bool {
        self.contains_at(value, self.present)
    }

    /// Cursor on the first element of version `t` not less than `value`
    pub fn lower_bound_at(&self, value: &T, t: Time) -> Option<Cursor<'_, T>> {
        self.seek_at(t, |v| v < value)
    }

    /// Cursor on the first element of version `t` for which `before` is false.
    ///
    /// `before` must hold for a prefix of the sorted order and fail for the
    /// rest, like the predicate of `slice::partition_point`.
    pub fn seek_at<F>(&self, t: Time, before: F) -> Option<Cursor<'_, T>>
    where
        F: FnMut(&T) -> bool,
    {
        let pred = self.descend(t, before)?;
        let id = self.successor(pred, t, 0)?;
        Some(Cursor::new(self, id, t, 0))
    }

    /// Cursor on the smallest element of version `t`
    pub fn first_at(&self, t: Time) -> Option<Cursor<'_, T>> {
        let id = self.successor(HEAD, t, 0)?;
        Some(Cursor::new(self, id, t, 0))
    }

    /// Cursor on the largest element of version `t`
    pub fn last_at(&self, t: Time) -> Option<Cursor<'_, T>> {
        let pred = self.descend(t, |_| true)?;
        (pred != HEAD).then(|| Cursor::new(self, pred, t, 0))
    }

    /// Iterate over version `t` in ascending order
    pub fn iter_at(&self, t: Time) -> Iter<'_, T> {
        Iter::new(self, t, self.successor(HEAD, t, 0))
    }

    /// Iterate over the present version in ascending order
    pub fn iter(&self) -> Iter<'_, T> {
        self.iter_at(self.present)
    }

    /// Number of elements visible in version `t`
    pub fn len_at(&self, t: Time) -> usize {
        self.iter_at(t).count()
    }

    /// Forget versions older than the one in effect at `before`.
    ///
    /// Versions from that head record on stay answerable; older ones start
    /// answering `None`. Superseded cells are dropped and nodes no retained
    /// version reaches are freed. The present contents and the set of
    /// rejected duplicates do not change. Returns the number of freed nodes.
    pub fn truncate_history(&mut self, before: Time) -> usize {
        let in_effect = self.heads.partition_point(|record| record.time <= before);
        if in_effect <= 1 {
            return 0;
        }
        let keep = self.heads[in_effect - 1].time;

        let mut dropped: Vec<CellId> = self
            .heads
            .drain(..in_effect - 1)
            .map(|record| record.cell)
            .collect();
        for node in self.nodes.iter_mut().skip(1).flatten() {
            dropped.extend(node.truncate_history(keep));
        }

        let live_before = self.live_nodes();
        let cells = dropped.len();
        for cell in dropped {
            self.drop_cell(cell);
        }
        let freed = live_before - self.live_nodes();
        info!(
            "truncated history before version {}: dropped {} cell(s), freed {} node(s)",
            keep, cells, freed
        );
        freed
    }

    /// Snapshot statistics
    pub fn stats(&self) -> SkipListStats {
        SkipListStats {
            present: self.present,
            versions: self.heads.len(),
            linked: self.linked,
            inserted: self.values.len(),
            live_nodes: self.live_nodes(),
            live_cells: self.cells.len(),
            head_height: self.level_count(HEAD, self.present),
        }
    }

    /// Check every structural invariant.
    ///
    /// Recomputes reference counts from the live cells, walks every
    /// retained version at every level, and requires every live node to be
    /// reachable from at least one of them.
    pub fn validate(&self) -> Result<(), Error> {
        for pair in self.heads.windows(2) {
            if pair[0].time >= pair[1].time {
                return corrupted(format!(
                    "head records out of order: {} then {}",
                    pair[0].time, pair[1].time
                ));
            }
        }
        if let Some(last) = self.heads.last() {
            if last.time > self.present {
                return corrupted(format!(
                    "head record at {} is ahead of the present {}",
                    last.time, self.present
                ));
            }
        }

        let mut expected = vec![0u32; self.nodes.len()];
        for record in &self.heads {
            self.tally_cell(record.time, record.cell, None, &mut expected)?;
        }
        for (index, node) in self.nodes.iter().enumerate().skip(1) {
            let Some(node) = node else { continue };
            for pair in node.history().windows(2) {
                if pair[0].0 >= pair[1].0 {
                    return corrupted(format!("node {} history out of order", index));
                }
            }
            for &(time, cell) in node.history() {
                self.tally_cell(time, cell, Some(node.height()), &mut expected)?;
            }
        }
        for (index, node) in self.nodes.iter().enumerate().skip(1) {
            if let Some(node) = node {
                if node.ref_count() != expected[index] {
                    return corrupted(format!(
                        "node {} counts {} references, cells hold {}",
                        index,
                        node.ref_count(),
                        expected[index]
                    ));
                }
            }
        }

        let mut reachable = bitvec![0; self.nodes.len()];
        for record in &self.heads {
            let t = record.time;
            for level in 0..self.cells.get(record.cell).len() {
                let mut prev: Option<NodeId> = None;
                let mut steps = 0;
                let mut cur = self.successor(HEAD, t, level);
                while let Some(id) = cur {
                    steps += 1;
                    if steps > self.nodes.len() {
                        return corrupted(format!("cycle at level {} of version {}", level, t));
                    }
                    let node = self.nodes[id.index()].as_ref().ok_or_else(|| {
                        Error::Corrupted(format!("version {} reaches freed node {}", t, id.index()))
                    })?;
                    if node.height() <= level {
                        return corrupted(format!(
                            "node {} of height {} linked at level {}",
                            id.index(),
                            node.height(),
                            level
                        ));
                    }
                    if let Some(prev) = prev {
                        if self.node(prev).key() >= node.key() {
                            return corrupted(format!(
                                "level {} of version {} out of order at node {}",
                                level,
                                t,
                                id.index()
                            ));
                        }
                    }
                    if level == 0 {
                        reachable.set(id.index(), true);
                    }
                    prev = Some(id);
                    cur = self.successor(id, t, level);
                }
            }
        }
        for (index, node) in self.nodes.iter().enumerate().skip(1) {
            if node.is_some() && !reachable[index] {
                return corrupted(format!("node {} is live but unreachable", index));
            }
        }

        let linked = self.len_at(self.present);
        if linked != self.linked {
            return corrupted(format!(
                "present version holds {} element(s), expected {}",
                linked, self.linked
            ));
        }
        Ok(())
    }

    fn tally_cell(
        &self,
        time: Time,
        cell: CellId,
        height: Option<usize>,
        expected: &mut [u32],
    ) -> Result<(), Error> {
        let cell = self.cells.get(cell);
        if !cell.is_sealed() {
            return corrupted(format!("committed cell at {} is not sealed", time));
        }
        if cell.time() != time {
            return corrupted(format!("cell tagged {} recorded at {}", cell.time(), time));
        }
        if let Some(height) = height {
            if cell.len() != height {
                return corrupted(format!(
                    "cell of length {} on a node of height {}",
                    cell.len(),
                    height
                ));
            }
        }
        for target in cell.iter().flatten() {
            if self.nodes.get(target.index()).is_none_or(Option::is_none) {
                return corrupted(format!("cell at {} points at freed node {}", time, target.index()));
            }
            expected[target.index()] += 1;
        }
        Ok(())
    }

    // ---- navigation -------------------------------------------------------

    pub(crate) fn node(&self, id: NodeId) -> &Node<T> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("dangling node id {:?}", id))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("dangling node id {:?}", id))
    }

    fn head_record_at(&self, t: Time) -> Option<&HeadRecord> {
        let idx = self.heads.partition_point(|record| record.time <= t);
        idx.checked_sub(1).map(|i| &self.heads[i])
    }

    /// Levels a cursor may use on `id` at time `t`
    pub(crate) fn level_count(&self, id: NodeId, t: Time) -> usize {
        if id == HEAD {
            self.head_record_at(t)
                .map_or(0, |record| self.cells.get(record.cell).len())
        } else {
            self.node(id).height()
        }
    }

    /// Successor of `id` at `level` in version `t`
    pub(crate) fn successor(&self, id: NodeId, t: Time, level: usize) -> Option<NodeId> {
        let cell = if id == HEAD {
            self.cells.get(self.head_record_at(t)?.cell)
        } else {
            let node = self.node(id);
            if level >= node.height() {
                return None;
            }
            self.cells.get(node.successors(t)?)
        };
        cell.slots().get(level).copied().flatten()
    }

    /// Move `pred` forward along `level` while the next value satisfies
    /// `before`; returns the first node that does not
    fn advance_while<F>(&self, pred: &mut NodeId, t: Time, level: usize, mut before: F) -> Option<NodeId>
    where
        F: FnMut(&T) -> bool,
    {
        loop {
            match self.successor(*pred, t, level) {
                Some(next) if self.node(next).value().is_some_and(&mut before) => *pred = next,
                other => return other,
            }
        }
    }

    /// Level-0 predecessor of the first element failing `before`
    fn descend<F>(&self, t: Time, mut before: F) -> Option<NodeId>
    where
        F: FnMut(&T) -> bool,
    {
        let top = self.level_count(HEAD, t);
        if top == 0 {
            return None;
        }
        let mut pred = HEAD;
        for level in (0..top).rev() {
            self.advance_while(&mut pred, t, level, &mut before);
        }
        Some(pred)
    }

    // ---- mutation plumbing -----------------------------------------------

    fn live_nodes(&self) -> usize {
        self.nodes.len() - 1 - self.free_nodes.len()
    }

    fn alloc_node(&mut self, node: Node<T>) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(node);
                id
            }
            None => {
                let raw = u32::try_from(self.nodes.len()).expect("node arena exhausted");
                self.nodes.push(Some(node));
                NodeId::from_raw(raw)
            }
        }
    }

    /// The cell `pred` will carry after this mutation, copied on first use
    fn working_cell<'w>(
        &self,
        working: &'w mut WorkingCells,
        pred: NodeId,
        t: Time,
    ) -> &'w mut VersionedCell {
        if let Some(pos) = working.iter().position(|(id, _)| *id == pred) {
            return &mut working[pos].1;
        }
        let node = self.node(pred);
        let cell = match node.successors(t) {
            Some(current) => VersionedCell::copy_from(t, node.height(), self.cells.get(current)),
            None => VersionedCell::new(t, node.height()),
        };
        working.push((pred, cell));
        let last = working.len() - 1;
        &mut working[last].1
    }

    /// Seal and commit every predecessor cell of one mutation.
    ///
    /// Returns the cells they replaced; the caller drops those once the
    /// whole mutation is committed, so no node is released while the new
    /// cells are still taking their references.
    fn commit_working(&mut self, working: WorkingCells) -> ReplacedCells {
        let mut replaced = ReplacedCells::new();
        for (pred, mut cell) in working {
            cell.seal();
            let cell = self.cells.alloc(cell);
            replaced.extend(self.append_successors(pred, cell));
        }
        replaced
    }

    /// Commit a sealed cell as the successors of `id` from its time on.
    ///
    /// Takes the owning edges of the new cell and moves back-references for
    /// every level whose target changed. A cell replaced at the same time is
    /// handed back for the caller to drop.
    fn append_successors(&mut self, id: NodeId, cell: CellId) -> Option<CellId> {
        let (time, targets) = {
            let cell = self.cells.get(cell);
            assert!(cell.is_sealed(), "committing an unsealed cell");
            (cell.time(), Slots::from_slice(cell.slots()))
        };
        assert_eq!(
            targets.len(),
            self.node(id).height(),
            "cell length does not match node height"
        );
        let previous: Option<Slots> = self
            .node(id)
            .latest()
            .map(|(_, latest)| Slots::from_slice(self.cells.get(latest).slots()));
        let replaced = self.node_mut(id).push_history(time, cell);

        for target in targets.iter().flatten() {
            self.node_mut(*target).add_reference();
        }
        for (level, &new) in targets.iter().enumerate() {
            let old = previous.as_ref().and_then(|slots| slots[level]);
            if old == new {
                continue;
            }
            if let Some(old) = old {
                if self.node(old).back_reference(level) == Some(id) {
                    self.node_mut(old).clear_back_reference(level);
                }
            }
            if let Some(new) = new {
                self.node_mut(new).set_back_reference(level, id);
            }
        }
        replaced
    }

    /// Commit a sealed head cell; a record at the same time is replaced and
    /// its cell handed back
    fn commit_head(&mut self, cell: CellId) -> Option<CellId> {
        let (time, targets) = {
            let cell = self.cells.get(cell);
            assert!(cell.is_sealed(), "committing an unsealed head cell");
            (cell.time(), Slots::from_slice(cell.slots()))
        };
        for target in targets.iter().flatten() {
            self.node_mut(*target).add_reference();
        }

        let last = self.heads.last().map(|record| record.time);
        match last {
            Some(last) if last == time => {
                let idx = self.heads.len() - 1;
                return Some(std::mem::replace(&mut self.heads[idx].cell, cell));
            }
            Some(last) => assert!(
                time > last,
                "non-monotonic head append: time {} after {}",
                time,
                last
            ),
            None => {}
        }
        self.heads.push(HeadRecord { time, cell });
        None
    }

    fn drop_cells(&mut self, cells: ReplacedCells) {
        for cell in cells {
            self.drop_cell(cell);
        }
    }

    /// Free a cell and release the nodes it owned.
    ///
    /// A node whose count reaches zero is freed in turn, and its own cells
    /// join the worklist; neighbours only go when their own counts do.
    fn drop_cell(&mut self, cell: CellId) {
        let mut pending = vec![cell];
        while let Some(cell) = pending.pop() {
            let cell = self.cells.free(cell);
            for target in cell.iter().flatten() {
                if self.node_mut(target).release() {
                    pending.extend(self.free_node(target));
                }
            }
        }
    }

    fn free_node(&mut self, id: NodeId) -> SmallVec<[CellId; 2]> {
        assert!(id != HEAD, "attempt to free the head sentinel");
        let mut node = self.nodes[id.index()]
            .take()
            .unwrap_or_else(|| panic!("double free of node {:?}", id));
        let history = node.take_history();

        if let Some(&(_, latest)) = history.last() {
            let targets = Slots::from_slice(self.cells.get(latest).slots());
            for (level, succ) in targets.iter().enumerate() {
                let Some(succ) = succ else { continue };
                if let Some(succ) = self.nodes[succ.index()].as_mut() {
                    if succ.back_reference(level) == Some(id) {
                        succ.clear_back_reference(level);
                    }
                }
            }
        }

        self.free_nodes.push(id);
        trace!("freed node {:?} with {} cell(s)", id, history.len());
        history.into_iter().map(|(_, cell)| cell).collect()
    }

    /// Whether `id` can be unlinked at version `t`
    pub(crate) fn check_detachable(&self, id: NodeId, t: Time) -> Result<(), Error> {
        if t != self.present {
            return Err(Error::NotPresent {
                time: t,
                present: self.present,
            });
        }
        if id == HEAD {
            return Err(Error::Sentinel);
        }
        let node = self.node(id);
        if node.detached_at().is_some() {
            return Err(Error::Detached);
        }
        for level in 0..node.height() {
            let pred = node.back_reference(level).unwrap_or(HEAD);
            if self.successor(pred, t, level) != Some(id) {
                return Err(Error::Detached);
            }
        }
        Ok(())
    }

    /// Unlink `id` from every level at the present version `t`.
    ///
    /// Each predecessor, found through the back-references, gets a new cell
    /// pointing past the node. Earlier versions keep reaching it and its
    /// value stays in the duplicate set.
    pub(crate) fn detach(&mut self, id: NodeId, t: Time) -> Result<(), Error> {
        self.check_detachable(id, t)?;
        let Some(&record) = self.head_record_at(t) else {
            return Err(Error::Detached);
        };

        let height = self.node(id).height();
        let succs: Slots = (0..height).map(|level| self.successor(id, t, level)).collect();
        let preds: Slots = (0..height)
            .map(|level| self.node(id).back_reference(level))
            .collect();

        let current_head = self.cells.get(record.cell);
        let mut head = VersionedCell::copy_from(t, current_head.len(), current_head);
        let mut working = WorkingCells::new();
        for level in 0..height {
            match preds[level] {
                Some(pred) => self.working_cell(&mut working, pred, t).set(level, succs[level]),
                None => head.set(level, succs[level]),
            }
        }

        for level in 0..height {
            if let Some(succ) = succs[level] {
                if self.node(succ).back_reference(level) == Some(id) {
                    self.node_mut(succ).clear_back_reference(level);
                }
            }
            self.node_mut(id).clear_back_reference(level);
        }
        self.node_mut(id).mark_detached(t);
        self.linked -= 1;

        // Nothing reads the node at t or later any more, so a cell it got
        // earlier in this version would only pin its targets
        let stale = self.node_mut(id).pop_history_at(t);

        let mut replaced = self.commit_working(working);
        replaced.extend(stale);
        head.seal();
        let head = self.cells.alloc(head);
        replaced.extend(self.commit_head(head));
        self.drop_cells(replaced);

        debug!("detached node {:?} at version {}", id, t);
        Ok(())
    }
}

impl<T: Ord + Clone + fmt::Debug> SkipList<T> {
    /// Render version `t` level by level, top level first
    pub fn draw(&self, t: Time) -> Option<String> {
        let record = self.head_record_at(t)?;
        let top = self.cells.get(record.cell).len();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "version {} (head record {}, {} level(s))",
            t, record.time, top
        );
        for level in (0..top).rev() {
            let _ = write!(out, "L{:<2} -inf", level);
            let mut cur = self.successor(HEAD, t, level);
            while let Some(id) = cur {
                match self.node(id).value() {
                    Some(v) => {
                        let _ = write!(out, " -> {:?}", v);
                    }
                    None => out.push_str(" -> ?"),
                }
                cur = self.successor(id, t, level);
            }
            out.push_str(" -> +inf\n");
        }
        Some(out)
    }

    /// Render the present version
    pub fn draw_present(&self) -> Option<String> {
        self.draw(self.present)
    }
}

fn corrupted(msg: String) -> Result<(), Error> {
    Err(Error::Corrupted(msg))
}

impl<'a, T: Ord + Clone> HeadView<'a, T> {
    /// Creation time of the record
    pub fn time(&self) -> Time {
        self.record.time
    }

    /// Number of levels in the record
    pub fn height(&self) -> usize {
        self.list.cells.get(self.record.cell).len()
    }

    /// First value at `level`, `None` past the top or on an emptied level
    pub fn first(&self, level: usize) -> Option<&'a T> {
        let list = self.list;
        let id = list.cells.get(self.record.cell).slots().get(level).copied().flatten()?;
        list.node(id).value()
    }

    /// Cursor on the head sentinel at the top level
    pub fn cursor(&self) -> Cursor<'a, T> {
        Cursor::new(self.list, HEAD, self.query, self.height() - 1)
    }
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(list: &'a SkipList<T>, time: Time, next: Option<NodeId>) -> Self {
        Self { list, time, next }
    }
}

impl<'a, T: Ord + Clone> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let id = self.next?;
        let list = self.list;
        self.next = list.successor(id, self.time, 0);
        list.node(id).value()
    }
}
