//! Error taxonomy for the merge engine.
//!
//! Three classes of failure:
//! - input errors (bad delta file, missing source, unusable anchor) abort
//!   before any mutation reaches the store;
//! - tree errors (single-parent violation, post-commit validation failure)
//!   are fatal and never retried;
//! - storage/io errors pass through from the collaborators.
//!
//! Lookup misses during annotation transfer are not errors at all: the
//! record is skipped and counted.

use std::path::PathBuf;

use taxtree_core::CoreError;
use taxtree_storage::StorageError;
use thiserror::Error;

/// Errors produced by merge, clean, and annotate operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Neither a modification database nor a modification file was supplied.
    #[error("no modification source: a source database or file is required")]
    MissingSource,

    /// The modification source path does not exist. Checked up front so a
    /// mistyped path never turns into a freshly created empty database.
    #[error("modification source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The anchor name does not resolve in the primary store.
    #[error("anchor node '{name}' was not found in the primary store")]
    AnchorNotFound { name: String },

    /// The anchor exists but has no incoming link to graft under.
    #[error("anchor node '{name}' has no parent link")]
    AnchorDetached { name: String },

    /// The anchor's incoming link is the root self-link; merging at the
    /// root would let a replace operation disconnect the whole tree.
    #[error("anchor node '{name}' is the tree root and cannot be merged into")]
    AnchorIsRoot { name: String },

    /// The delta file header is unusable.
    #[error("bad delta file header: {reason}")]
    BadHeader { reason: String },

    /// A data row could not be parsed.
    #[error("bad row at line {line}: {reason}")]
    BadRow { line: usize, reason: String },

    /// The foreign store's own tables are inconsistent (a link references
    /// a node or rank with no name).
    #[error("inconsistent foreign store: {reason}")]
    ForeignStore { reason: String },

    /// The store has no genome annotations; cleaning would delete the
    /// entire tree, so the operation declines to run.
    #[error("store has no genome annotations, refusing to clean the whole tree")]
    NoAnnotations,

    /// The tree structure is broken. When this surfaces after a commit the
    /// store can no longer be trusted by this process.
    #[error("tree error: {reason}")]
    Tree { reason: String },

    /// A storage-layer failure unrelated to tree structure.
    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for MergeError {
    fn from(err: StorageError) -> Self {
        match err {
            // Structural violations belong to the tree class.
            StorageError::MultipleParents { .. } | StorageError::InvalidTree { .. } => {
                MergeError::Tree {
                    reason: err.to_string(),
                }
            }
            other => MergeError::Storage(other),
        }
    }
}

impl MergeError {
    /// True for errors in the caller's input, reported before any mutation.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            MergeError::MissingSource
                | MergeError::SourceNotFound { .. }
                | MergeError::AnchorNotFound { .. }
                | MergeError::AnchorDetached { .. }
                | MergeError::AnchorIsRoot { .. }
                | MergeError::BadHeader { .. }
                | MergeError::BadRow { .. }
                | MergeError::ForeignStore { .. }
                | MergeError::NoAnnotations
        )
    }
}
