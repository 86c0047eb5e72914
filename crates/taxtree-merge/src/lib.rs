//! Tree merge engine for taxonomy stores.
//!
//! Merges a second taxonomy, supplied either as a full foreign store or
//! as a flat delta file, into a designated anchor node of a primary
//! store. Replace mode excises the anchor's existing subtree and
//! substitutes the incoming one. Independent of merging, the crate also
//! garbage-collects unannotated structure and ingests genome-to-taxon
//! annotation files.
//!
//! # Pipeline
//!
//! One merge runs reconcile -> diff -> apply:
//! - [`context`]: MergeContext carrying anchor, mode, and working sets
//! - [`allocator`]: synthetic node id allocation above the native id space
//! - [`reconcile`]: translating a foreign source into primary ids by name
//! - [`diff`]: classifying candidate links against the existing subtree
//! - [`apply`]: transactional delete/insert, annotation transfer,
//!   revalidation and compaction
//! - [`clean`]: garbage collection keeping annotated nodes root-reachable
//! - [`annotate`]: genome annotation file ingestion
//!
//! The high-level entry points [`merge_with_store`], [`merge_with_database`]
//! and [`merge_with_file`] run the whole pipeline and roll the store back on
//! any error, so a failed merge leaves no partial state behind.

pub mod allocator;
pub mod annotate;
pub mod apply;
pub mod clean;
pub mod context;
pub mod diff;
pub mod error;
pub mod reconcile;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use taxtree_storage::{SqliteStore, TreeStore};

pub use allocator::NodeAllocator;
pub use annotate::{annotate, AnnotateStats};
pub use apply::MergeStats;
pub use clean::{clean, CleanStats};
pub use context::MergeContext;
pub use diff::TreeDiff;
pub use error::MergeError;

/// What and how to merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Name of the existing node to graft under.
    pub anchor: String,
    /// Delete the anchor's existing descendants not present in the
    /// incoming source.
    pub replace: bool,
    /// Field separator for flat files.
    pub separator: String,
}

impl MergeOptions {
    pub fn new(anchor: impl Into<String>) -> Self {
        MergeOptions {
            anchor: anchor.into(),
            replace: false,
            separator: "\t".to_string(),
        }
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Merges a foreign store into the primary store, transferring the
/// foreign genome annotations after commit.
pub fn merge_with_store<S, F>(
    store: &mut S,
    foreign: &F,
    options: &MergeOptions,
) -> Result<MergeStats, MergeError>
where
    S: TreeStore,
    F: TreeStore,
{
    info!(anchor = %options.anchor, replace = options.replace, "merging foreign store");
    let mut ctx = MergeContext::open(store, &options.anchor, options.replace, &options.separator)?;
    let result = (|| {
        let annotations = reconcile::ingest_store(store, &mut ctx, foreign)?;
        let diff = diff::diff(store, &ctx)?;
        apply::apply(store, &ctx, &diff, Some(&annotations))
    })();
    discard_on_error(store, result)
}

/// Opens the modification database at `path` and merges it into the
/// primary store. The path must already exist: opening a missing path
/// would silently create an empty database and merge nothing.
pub fn merge_with_database<S: TreeStore>(
    store: &mut S,
    path: &Path,
    options: &MergeOptions,
) -> Result<MergeStats, MergeError> {
    if !path.exists() {
        return Err(MergeError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let foreign = SqliteStore::open(path)?;
    merge_with_store(store, &foreign, options)
}

/// Merges a flat delta file into the primary store.
pub fn merge_with_file<S: TreeStore>(
    store: &mut S,
    path: &Path,
    options: &MergeOptions,
) -> Result<MergeStats, MergeError> {
    info!(anchor = %options.anchor, replace = options.replace, path = %path.display(), "merging delta file");
    let mut ctx = MergeContext::open(store, &options.anchor, options.replace, &options.separator)?;
    let result = (|| {
        let reader = BufReader::new(File::open(path)?);
        reconcile::ingest_file(store, &mut ctx, reader)?;
        let diff = diff::diff(store, &ctx)?;
        apply::apply(store, &ctx, &diff, None)
    })();
    discard_on_error(store, result)
}

/// Ingests an annotation file at `path` into the store.
pub fn annotate_from_file<S: TreeStore>(
    store: &mut S,
    path: &Path,
    separator: &str,
) -> Result<AnnotateStats, MergeError> {
    let reader = BufReader::new(File::open(path)?);
    let result = annotate::annotate(store, reader, separator);
    discard_on_error(store, result)
}

/// Rolls back any buffered mutations when the pipeline failed. The
/// original error wins over a rollback failure.
fn discard_on_error<S: TreeStore, T>(
    store: &mut S,
    result: Result<T, MergeError>,
) -> Result<T, MergeError> {
    if result.is_err() {
        let _ = store.rollback();
    }
    result
}
