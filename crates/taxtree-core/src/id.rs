//! Stable ID newtypes for taxonomy entities.
//!
//! All IDs are distinct newtype wrappers over `i64` (SQLite INTEGER affinity),
//! providing type safety so that a `NodeId` cannot be accidentally used where
//! a `RankCode` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable taxonomy node identifier, either source-native (e.g. an NCBI taxid)
/// or synthetically allocated above the native id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub i64);

/// Integer code of a rank name ("species", "genus", "no rank", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RankCode(pub i64);

/// The tree root. Node 1 carries a self-referential link `(1, 1)`, is never
/// deleted, and is never assigned a different parent.
pub const ROOT: NodeId = NodeId(1);

// Display implementations -- just print the inner value.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RankCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
