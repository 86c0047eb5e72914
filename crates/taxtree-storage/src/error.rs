//! Storage error types for taxtree-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage
//! layer: the SQLite driver, schema migration, id conflicts, and
//! structural tree violations detected at insertion or validation time.

use taxtree_core::NodeId;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A forced node id is already bound to a different name. Ids are
    /// primary keys; reusing one would silently rename an existing node.
    #[error("node id {id} is already in use")]
    DuplicateNodeId { id: NodeId },

    /// A node acquired a second distinct incoming link. Every node except
    /// the root must have exactly one parent; this is a hard structural
    /// error, not retried.
    #[error("node {child} has more than one parent")]
    MultipleParents { child: NodeId },

    /// Whole-tree validation failed (cycle, unreachable node, detached
    /// root). The store's consistency can no longer be trusted.
    #[error("invalid tree: {reason}")]
    InvalidTree { reason: String },
}
