//! Search cursors
//!
//! A cursor is bound to one node, one query time and one level. Moving
//! right follows that node's successor at the cursor's level as of the query
//! time; moving down drops a level. Descending from the head sentinel with
//! these two moves is an ordinary skip-list search run against a past
//! version.

use std::cmp::Ordering;
use std::fmt;

use crate::Time;
use crate::error::Error;
use crate::node::{Key, NodeId};
use crate::skiplist::{HEAD, Iter, SkipList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    node: NodeId,
    time: Time,
    height: usize,
}

impl Position {
    fn next<T: Ord + Clone>(&self, list: &SkipList<T>) -> Result<NodeId, Error> {
        let levels = list.level_count(self.node, self.time);
        if self.height >= levels {
            return Err(Error::InvalidLevel {
                level: self.height,
                height: levels,
            });
        }
        list.successor(self.node, self.time, self.height)
            .ok_or(Error::EndOfList)
    }

    fn move_down<T: Ord + Clone>(&mut self, list: &SkipList<T>) -> Result<(), Error> {
        if self.height == 0 {
            return Err(Error::InvalidLevel {
                level: 0,
                height: list.level_count(self.node, self.time),
            });
        }
        self.height -= 1;
        Ok(())
    }
}

/// Read-only traversal handle over one version
pub struct Cursor<'a, T> {
    list: &'a SkipList<T>,
    pos: Position,
}

impl<'a, T: Ord + Clone> Cursor<'a, T> {
    pub(crate) fn new(list: &'a SkipList<T>, node: NodeId, time: Time, height: usize) -> Self {
        Self {
            list,
            pos: Position { node, time, height },
        }
    }

    /// Move to the successor at the current level.
    ///
    /// Fails with [`Error::EndOfList`] when there is none; the cursor then
    /// stays where it was.
    pub fn move_next(&mut self) -> Result<(), Error> {
        self.pos.node = self.pos.next(self.list)?;
        Ok(())
    }

    /// Drop one level
    pub fn move_down(&mut self) -> Result<(), Error> {
        self.pos.move_down(self.list)
    }

    /// Value a [`move_next`](Self::move_next) would land on
    pub fn peek_next(&self) -> Option<&'a T> {
        let next = self.pos.next(self.list).ok()?;
        self.list.node(next).value()
    }

    /// The bound node's value.
    ///
    /// # Panics
    ///
    /// Panics when bound to the head sentinel.
    pub fn get(&self) -> &'a T {
        self.value()
            .unwrap_or_else(|| panic!("dereferenced a cursor on a sentinel"))
    }

    /// The bound node's value, `None` on a sentinel
    pub fn value(&self) -> Option<&'a T> {
        self.list.node(self.pos.node).value()
    }

    /// The bound node's key
    pub fn key(&self) -> &'a Key<T> {
        self.list.node(self.pos.node).key()
    }

    /// Version the cursor reads
    pub fn time(&self) -> Time {
        self.pos.time
    }

    /// Current search level
    pub fn height(&self) -> usize {
        self.pos.height
    }

    /// Whether the cursor sits on the head sentinel
    pub fn is_head(&self) -> bool {
        self.pos.node == HEAD
    }

    /// Handle of the bound node
    pub fn node_id(&self) -> NodeId {
        self.pos.node
    }

    /// Iterate over the version from the bound node on, at level 0
    pub fn iter(&self) -> Iter<'a, T> {
        let start = if self.is_head() {
            self.list.successor(HEAD, self.pos.time, 0)
        } else {
            Some(self.pos.node)
        };
        Iter::new(self.list, self.pos.time, start)
    }
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<T> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("node", &self.pos.node)
            .field("time", &self.pos.time)
            .field("height", &self.pos.height)
            .finish()
    }
}

impl<T: Ord + Clone> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T: Ord + Clone> PartialOrd for Cursor<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.key().cmp(other.key()))
    }
}

/// Traversal handle on the present version that can unlink nodes
pub struct CursorMut<'a, T> {
    list: &'a mut SkipList<T>,
    pos: Position,
}

impl<'a, T: Ord + Clone> CursorMut<'a, T> {
    pub(crate) fn new(list: &'a mut SkipList<T>, node: NodeId, time: Time, height: usize) -> Self {
        Self {
            list,
            pos: Position { node, time, height },
        }
    }

    /// Move to the successor at the current level
    pub fn move_next(&mut self) -> Result<(), Error> {
        self.pos.node = self.pos.next(self.list)?;
        Ok(())
    }

    /// Drop one level
    pub fn move_down(&mut self) -> Result<(), Error> {
        self.pos.move_down(self.list)
    }

    /// Value a [`move_next`](Self::move_next) would land on
    pub fn peek_next(&self) -> Option<&T> {
        let next = self.pos.next(self.list).ok()?;
        self.list.node(next).value()
    }

    /// The bound node's value.
    ///
    /// # Panics
    ///
    /// Panics when bound to the head sentinel.
    pub fn get(&self) -> &T {
        self.value()
            .unwrap_or_else(|| panic!("dereferenced a cursor on a sentinel"))
    }

    /// The bound node's value, `None` on a sentinel
    pub fn value(&self) -> Option<&T> {
        self.list.node(self.pos.node).value()
    }

    /// Version the cursor reads
    pub fn time(&self) -> Time {
        self.pos.time
    }

    /// Current search level
    pub fn height(&self) -> usize {
        self.pos.height
    }

    /// Whether the cursor sits on the head sentinel
    pub fn is_head(&self) -> bool {
        self.pos.node == HEAD
    }

    /// Read-only view at the same position
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            list: self.list,
            pos: self.pos,
        }
    }

    /// Unlink the bound node from the cursor's version.
    ///
    /// The cursor first steps past the node: to its successor at the
    /// cursor's level, or back to its predecessor there if it was the last
    /// one. The node then leaves every level of its tower as of the cursor's
    /// time. Only the present version can change; earlier versions keep the
    /// node, and its value stays rejected as a duplicate.
    pub fn remove_current(&mut self) -> Result<(), Error> {
        let target = self.pos.node;
        self.list.check_detachable(target, self.pos.time)?;

        self.pos.node = match self.list.successor(target, self.pos.time, self.pos.height) {
            Some(next) => next,
            None => self
                .list
                .node(target)
                .back_reference(self.pos.height)
                .unwrap_or(HEAD),
        };
        self.list.detach(target, self.pos.time)
    }
}

impl<T> fmt::Debug for CursorMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorMut")
            .field("node", &self.pos.node)
            .field("time", &self.pos.time)
            .field("height", &self.pos.height)
            .finish()
    }
}
