//! The [`TreeStore`] trait defining the storage contract for taxonomy trees.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait, ensuring
//! they are fully swappable without changing merge-engine logic. The trait
//! is synchronous (not async): one merge or clean operation runs to
//! completion before another begins.
//!
//! Mutating operations buffer inside an open transaction. Nothing is
//! durable until [`TreeStore::commit`]; [`TreeStore::rollback`] discards
//! everything buffered since the last commit.

use std::collections::{BTreeSet, HashMap, HashSet};

use taxtree_core::{Link, NodeId, RankCode};

use crate::error::StorageError;

/// The storage contract for persistent taxonomy trees.
pub trait TreeStore {
    // -------------------------------------------------------------------
    // Node and rank lookups
    // -------------------------------------------------------------------

    /// All nodes as an id -> display-name mapping.
    fn node_names(&self) -> Result<HashMap<NodeId, String>, StorageError>;

    /// All nodes as a display-name -> id mapping.
    fn node_ids(&self) -> Result<HashMap<String, NodeId>, StorageError>;

    /// Resolves a single display name to its node id.
    fn node_id(&self, name: &str) -> Result<Option<NodeId>, StorageError>;

    /// All ranks as a code -> name mapping.
    fn rank_names(&self) -> Result<HashMap<RankCode, String>, StorageError>;

    /// All ranks as a name -> code mapping.
    fn rank_codes(&self) -> Result<HashMap<String, RankCode>, StorageError>;

    /// The current maximum node id, native or synthetic. Input for the
    /// merge engine's allocator base.
    fn max_native_id(&self) -> Result<i64, StorageError>;

    // -------------------------------------------------------------------
    // Link queries
    // -------------------------------------------------------------------

    /// Every link in the store.
    fn all_links(&self) -> Result<HashSet<Link>, StorageError>;

    /// Links touching the given node set. With `only_parents`, only each
    /// node's incoming link (child in the set) is returned; otherwise any
    /// link whose parent *or* child is in the set.
    fn get_links(
        &self,
        nodes: &HashSet<NodeId>,
        only_parents: bool,
    ) -> Result<HashSet<Link>, StorageError>;

    /// Strict descendants of the given nodes (the query set itself is not
    /// included), optionally limited to `maxdepth` levels.
    fn get_children(
        &self,
        nodes: &HashSet<NodeId>,
        maxdepth: Option<u32>,
    ) -> Result<HashSet<NodeId>, StorageError>;

    /// Parents of the given nodes, one step up, or the full transitive
    /// ancestor closure when `find_all` is set.
    fn get_parents(
        &self,
        nodes: &HashSet<NodeId>,
        find_all: bool,
    ) -> Result<HashSet<NodeId>, StorageError>;

    /// The unique incoming link of a node, if any. The root reports its
    /// self-referential link.
    fn get_parent(&self, node: NodeId) -> Result<Option<Link>, StorageError>;

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Inserts a node row. A `forced_id` wins over store assignment;
    /// without one the store assigns max(id)+1. Inserting a name that
    /// already exists returns the existing id unchanged.
    fn add_node(&mut self, name: &str, forced_id: Option<NodeId>)
        -> Result<NodeId, StorageError>;

    /// Get-or-create a rank code for a name.
    fn add_rank(&mut self, name: &str) -> Result<RankCode, StorageError>;

    /// Inserts a set of links. Re-inserting a triple that already exists is
    /// a no-op. Returns the links actually inserted and the child nodes
    /// that gained their first incoming link. Enforces the single-parent
    /// invariant immediately after each insertion.
    fn add_links(
        &mut self,
        links: &BTreeSet<Link>,
    ) -> Result<(Vec<Link>, Vec<NodeId>), StorageError>;

    /// Deletes exact link triples, returning how many rows were removed.
    fn delete_links(&mut self, links: &HashSet<Link>) -> Result<usize, StorageError>;

    /// Deletes node rows, returning how many rows were removed.
    fn delete_nodes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError>;

    // -------------------------------------------------------------------
    // Genome annotations
    // -------------------------------------------------------------------

    /// Deletes all genome annotations owned by the given nodes.
    fn delete_genomes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError>;

    /// Points a genome annotation at a node. Returns `true` when an
    /// existing row was updated, `false` when a new row was inserted.
    fn update_genome(&mut self, genome: &str, node: NodeId) -> Result<bool, StorageError>;

    /// All genome annotations as a genome-id -> node-id mapping.
    fn get_genomes(&self) -> Result<HashMap<String, NodeId>, StorageError>;

    // -------------------------------------------------------------------
    // Integrity and transaction boundary
    // -------------------------------------------------------------------

    /// Revalidates the whole-tree invariant: every non-root node has
    /// exactly one parent, no cycles, root self-rooted and every node
    /// reachable from it.
    fn validate_tree(&self) -> Result<(), StorageError>;

    /// Makes all buffered mutations durable.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Discards all mutations buffered since the last commit.
    fn rollback(&mut self) -> Result<(), StorageError>;

    /// Reclaims storage (VACUUM for SQLite). Commits any open transaction
    /// first.
    fn compact(&mut self) -> Result<(), StorageError>;
}
