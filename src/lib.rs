//! pskip: Persistent Skip List
//!
//! This crate provides an ordered index that supports insertion while keeping
//! every earlier state queryable by version number. Each insert copies only
//! the successor cells it changes, so versions share everything else.
//! A planar dominance index ("which points lie north-east of (x, y)") is
//! built on top by using one coordinate's rank as the version axis.

#![warn(missing_docs)]

/// Versioned successor cells and their arena
pub mod cell;

/// Skip list vertices
pub mod node;

/// Tower height sampling
pub mod height;

/// The multi-version skip list engine
pub mod skiplist;

/// Read-only and mutating traversal handles
pub mod cursor;

/// North-east dominance queries over point sets
pub mod dominance;

/// Single-writer handle for sharing a skip list across threads
pub mod shared;


/// Version number of a skip list snapshot
pub type Time = u64;

// Re-exports
pub use cell::{CellArena, CellId, VersionedCell};
pub use config::SkipListConfig;
pub use cursor::{Cursor, CursorMut};
pub use dominance::{DominanceIndex, Point};
pub use error::Error;
pub use height::{DEFAULT_MAX_HEIGHT, HeightSampler};
pub use node::{Key, Node, NodeId};
pub use shared::SharedSkipList;
pub use skiplist::{HeadView, Iter, SkipList, SkipListStats};

/// Error types for skip list operations
pub mod error {
    use std::error::Error as StdError;
    use std::fmt;

    use crate::Time;

    /// Error types that can occur in skip list operations
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        /// The value was inserted before
        Duplicate,
        /// A cursor has no successor at its level
        EndOfList,
        /// A cursor level is not valid for the node it is bound to
        InvalidLevel {
            /// Requested level
            level: usize,
            /// Height of the bound node
            height: usize,
        },
        /// A mutation was attempted through a cursor bound to a past version
        NotPresent {
            /// Cursor version
            time: Time,
            /// Present version
            present: Time,
        },
        /// The node is no longer linked at the present version
        Detached,
        /// Sentinels carry no value and cannot be unlinked
        Sentinel,
        /// Internal structure failed validation
        Corrupted(String),
        /// Configuration error
        ConfigError(String),
    }

    impl fmt::Display for Error {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Error::Duplicate => write!(f, "Value already inserted"),
                Error::EndOfList => write!(f, "No successor at this level"),
                Error::InvalidLevel { level, height } => {
                    write!(f, "Level {} is invalid for a node of height {}", level, height)
                }
                Error::NotPresent { time, present } => write!(
                    f,
                    "Version {} is sealed, only the present version {} can change",
                    time, present
                ),
                Error::Detached => write!(f, "Node is not linked at the present version"),
                Error::Sentinel => write!(f, "Operation not valid on a sentinel node"),
                Error::Corrupted(msg) => write!(f, "Corrupted structure: {}", msg),
                Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            }
        }
    }

    impl StdError for Error {}
}

/// Configuration options for a skip list
pub mod config {
    use crate::error::Error;
    use crate::height::{DEFAULT_MAX_HEIGHT, MAX_SUPPORTED_HEIGHT};

    /// Configuration for a [`SkipList`](crate::SkipList)
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SkipListConfig {
        /// Cap on tower height
        pub max_height: usize,
        /// Seed for the height sampler; `None` draws from system entropy
        pub seed: Option<u64>,
        /// Number of nodes to reserve room for up front
        pub initial_capacity: usize,
    }

    impl Default for SkipListConfig {
        fn default() -> Self {
            Self {
                max_height: DEFAULT_MAX_HEIGHT,
                seed: None,
                initial_capacity: 64,
            }
        }
    }

    impl SkipListConfig {
        /// Set the tower height cap
        pub fn with_max_height(mut self, max_height: usize) -> Self {
            self.max_height = max_height;
            self
        }

        /// Make height sampling reproducible
        pub fn with_seed(mut self, seed: u64) -> Self {
            self.seed = Some(seed);
            self
        }

        /// Reserve room for `capacity` nodes
        pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
            self.initial_capacity = capacity;
            self
        }

        /// Check that the options are usable
        pub fn validate(&self) -> Result<(), Error> {
            if self.max_height == 0 || self.max_height > MAX_SUPPORTED_HEIGHT {
                return Err(Error::ConfigError(format!(
                    "max_height must be in 1..={}, got {}",
                    MAX_SUPPORTED_HEIGHT, self.max_height
                )));
            }
            Ok(())
        }
    }
}
