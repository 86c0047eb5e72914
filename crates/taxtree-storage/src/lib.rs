//! Storage abstraction for persistent taxonomy trees.
//!
//! Provides the [`TreeStore`] trait defining the storage contract that all
//! backends implement, plus [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends.
//!
//! # Architecture
//!
//! A store holds three kinds of rows: nodes (id, unique display name),
//! ranks (code, unique name), and links `(parent, child, rank)`. Genome
//! annotations map external accession ids onto nodes. Mutations accumulate
//! in an open transaction; [`TreeStore::commit`] is the single durability
//! point so that a multi-step modification lands atomically or not at all.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: TreeStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`validate`]: whole-tree invariant checks shared by all backends

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod validate;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::TreeStore;
