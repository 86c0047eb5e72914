//! Core error types for taxtree-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the failure modes of the core data model.

use thiserror::Error;

/// Core errors produced by the taxtree-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node display name is already bound to a different id.
    /// Display names are unique within a store.
    #[error("duplicate node name: '{name}'")]
    DuplicateNodeName { name: String },
}
