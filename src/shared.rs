//! Thread-shared skip list
//!
//! All mutation goes through a single write lock; readers share the read
//! lock. Sealed cells never change, so a reader holding a past version sees
//! the same answer no matter what the writer does next.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::Time;
use crate::config::SkipListConfig;
use crate::error::Error;
use crate::skiplist::SkipList;

/// Cloneable handle to a skip list behind a reader-writer lock
pub struct SharedSkipList<T> {
    inner: Arc<RwLock<SkipList<T>>>,
}

impl<T> Clone for SharedSkipList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Ord + Clone> Default for SharedSkipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> SharedSkipList<T> {
    /// Create an empty shared skip list
    pub fn new() -> Self {
        Self::from_list(SkipList::new())
    }

    /// Create an empty shared skip list with the given configuration
    pub fn with_config(config: SkipListConfig) -> Result<Self, Error> {
        Ok(Self::from_list(SkipList::with_config(config)?))
    }

    /// Share an existing skip list
    pub fn from_list(list: SkipList<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(list)),
        }
    }

    /// Insert at the present version
    pub fn insert(&self, value: T) -> Result<Time, Error> {
        self.inner.write().insert(value)
    }

    /// Start a new version
    pub fn advance_time(&self) -> Time {
        self.inner.write().advance_time()
    }

    /// The present version
    pub fn present(&self) -> Time {
        self.inner.read().present()
    }

    /// Whether `value` is visible in version `t`
    pub fn contains_at(&self, value: &T, t: Time) -> bool {
        self.inner.read().contains_at(value, t)
    }

    /// Copy out the contents of version `t`
    pub fn snapshot_at(&self, t: Time) -> Vec<T> {
        self.inner.read().iter_at(t).cloned().collect()
    }

    /// Run `f` under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&SkipList<T>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` under the write lock
    pub fn write<R>(&self, f: impl FnOnce(&mut SkipList<T>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_readers_see_stable_versions() {
        let shared = SharedSkipList::new();
        for v in 0..100u32 {
            shared.insert(v * 2).unwrap();
        }
        shared.advance_time();
        let frozen = shared.snapshot_at(0);

        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for v in 0..100u32 {
                    shared.insert(v * 2 + 1).unwrap();
                    if v % 10 == 0 {
                        shared.advance_time();
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let frozen = frozen.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        assert_eq!(shared.snapshot_at(0), frozen);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(shared.snapshot_at(0), frozen);
        let present = shared.present();
        assert_eq!(shared.snapshot_at(present).len(), 200);
        assert_eq!(shared.insert(3), Err(Error::Duplicate));
        shared.read(|list| list.validate()).unwrap();
    }

    #[test]
    fn test_write_closure() {
        let shared: SharedSkipList<&str> =
            SharedSkipList::with_config(SkipListConfig::default().with_seed(1)).unwrap();
        shared.write(|list| {
            list.insert("b").unwrap();
            list.insert("a").unwrap();
        });
        assert!(shared.contains_at(&"a", 0));
        assert_eq!(shared.read(|list| list.len()), 2);
    }
}
