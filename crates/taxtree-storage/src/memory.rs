//! In-memory implementation of [`TreeStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and anywhere
//! persistence isn't needed. It stores all data in HashMaps with identical
//! observable semantics to the SQLite backend, including the
//! commit/rollback boundary: the pre-mutation state is snapshotted when a
//! logical transaction opens and restored on rollback.

use std::collections::{BTreeSet, HashMap, HashSet};

use taxtree_core::{Link, NodeId, RankCode};

use crate::error::StorageError;
use crate::traits::TreeStore;
use crate::validate::validate_links;

/// The mutable tree state, snapshotted as a unit for rollback.
#[derive(Debug, Clone, Default)]
struct TreeState {
    /// Node id -> display name
    nodes: HashMap<NodeId, String>,
    /// Display name -> node id
    names: HashMap<String, NodeId>,
    /// Rank code -> rank name
    ranks: HashMap<RankCode, String>,
    /// All link triples
    links: HashSet<Link>,
    /// Genome accession -> node id
    genomes: HashMap<String, NodeId>,
}

/// HashMap-backed implementation of [`TreeStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: TreeState,
    /// State as of the last commit; restored on rollback.
    snapshot: Option<TreeState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the rollback snapshot if a logical transaction isn't open yet.
    fn begin(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.state.clone());
        }
    }
}

impl TreeStore for InMemoryStore {
    // -------------------------------------------------------------------
    // Node and rank lookups
    // -------------------------------------------------------------------

    fn node_names(&self) -> Result<HashMap<NodeId, String>, StorageError> {
        Ok(self.state.nodes.clone())
    }

    fn node_ids(&self) -> Result<HashMap<String, NodeId>, StorageError> {
        Ok(self.state.names.clone())
    }

    fn node_id(&self, name: &str) -> Result<Option<NodeId>, StorageError> {
        Ok(self.state.names.get(name).copied())
    }

    fn rank_names(&self) -> Result<HashMap<RankCode, String>, StorageError> {
        Ok(self.state.ranks.clone())
    }

    fn rank_codes(&self) -> Result<HashMap<String, RankCode>, StorageError> {
        Ok(self
            .state
            .ranks
            .iter()
            .map(|(code, name)| (name.clone(), *code))
            .collect())
    }

    fn max_native_id(&self) -> Result<i64, StorageError> {
        Ok(self.state.nodes.keys().map(|id| id.0).max().unwrap_or(0))
    }

    // -------------------------------------------------------------------
    // Link queries
    // -------------------------------------------------------------------

    fn all_links(&self) -> Result<HashSet<Link>, StorageError> {
        Ok(self.state.links.clone())
    }

    fn get_links(
        &self,
        nodes: &HashSet<NodeId>,
        only_parents: bool,
    ) -> Result<HashSet<Link>, StorageError> {
        Ok(self
            .state
            .links
            .iter()
            .filter(|link| {
                nodes.contains(&link.child) || (!only_parents && nodes.contains(&link.parent))
            })
            .copied()
            .collect())
    }

    fn get_children(
        &self,
        nodes: &HashSet<NodeId>,
        maxdepth: Option<u32>,
    ) -> Result<HashSet<NodeId>, StorageError> {
        let mut found: HashSet<NodeId> = HashSet::new();
        let mut frontier: Vec<NodeId> = nodes.iter().copied().collect();
        let mut depth = 0u32;
        while !frontier.is_empty() {
            if let Some(limit) = maxdepth {
                if depth >= limit {
                    break;
                }
            }
            depth += 1;
            let mut next = Vec::new();
            for node in frontier {
                for link in &self.state.links {
                    if link.parent == node && !link.is_self_loop() {
                        let child = link.child;
                        if !nodes.contains(&child) && found.insert(child) {
                            next.push(child);
                        }
                    }
                }
            }
            frontier = next;
        }
        Ok(found)
    }

    fn get_parents(
        &self,
        nodes: &HashSet<NodeId>,
        find_all: bool,
    ) -> Result<HashSet<NodeId>, StorageError> {
        let mut found: HashSet<NodeId> = HashSet::new();
        let mut frontier: Vec<NodeId> = nodes.iter().copied().collect();
        loop {
            let mut next = Vec::new();
            for node in frontier {
                for link in &self.state.links {
                    if link.child == node && !link.is_self_loop() && found.insert(link.parent) {
                        next.push(link.parent);
                    }
                }
            }
            if !find_all || next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(found)
    }

    fn get_parent(&self, node: NodeId) -> Result<Option<Link>, StorageError> {
        Ok(self
            .state
            .links
            .iter()
            .find(|link| link.child == node)
            .copied())
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    fn add_node(
        &mut self,
        name: &str,
        forced_id: Option<NodeId>,
    ) -> Result<NodeId, StorageError> {
        if let Some(&existing) = self.state.names.get(name) {
            return Ok(existing);
        }
        let id = match forced_id {
            Some(id) => id,
            None => NodeId(self.max_native_id()? + 1),
        };
        if self.state.nodes.contains_key(&id) {
            return Err(StorageError::DuplicateNodeId { id });
        }
        self.begin();
        self.state.nodes.insert(id, name.to_string());
        self.state.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn add_rank(&mut self, name: &str) -> Result<RankCode, StorageError> {
        for (code, existing) in &self.state.ranks {
            if existing == name {
                return Ok(*code);
            }
        }
        self.begin();
        let code = RankCode(self.state.ranks.keys().map(|c| c.0).max().map_or(0, |m| m + 1));
        self.state.ranks.insert(code, name.to_string());
        Ok(code)
    }

    fn add_links(
        &mut self,
        links: &BTreeSet<Link>,
    ) -> Result<(Vec<Link>, Vec<NodeId>), StorageError> {
        self.begin();
        let mut inserted_links = Vec::new();
        let mut inserted_nodes = Vec::new();
        for link in links {
            if self.state.links.contains(link) {
                continue;
            }
            let had_parent = self.state.links.iter().any(|l| l.child == link.child);
            self.state.links.insert(*link);
            // Single-parent invariant, enforced immediately after insertion.
            if had_parent {
                return Err(StorageError::MultipleParents { child: link.child });
            }
            inserted_links.push(*link);
            inserted_nodes.push(link.child);
        }
        Ok((inserted_links, inserted_nodes))
    }

    fn delete_links(&mut self, links: &HashSet<Link>) -> Result<usize, StorageError> {
        self.begin();
        let before = self.state.links.len();
        for link in links {
            self.state.links.remove(link);
        }
        Ok(before - self.state.links.len())
    }

    fn delete_nodes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError> {
        self.begin();
        let mut removed = 0;
        for node in nodes {
            if let Some(name) = self.state.nodes.remove(node) {
                self.state.names.remove(&name);
                removed += 1;
            }
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------
    // Genome annotations
    // -------------------------------------------------------------------

    fn delete_genomes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError> {
        self.begin();
        let before = self.state.genomes.len();
        self.state.genomes.retain(|_, id| !nodes.contains(id));
        Ok(before - self.state.genomes.len())
    }

    fn update_genome(&mut self, genome: &str, node: NodeId) -> Result<bool, StorageError> {
        self.begin();
        Ok(self.state.genomes.insert(genome.to_string(), node).is_some())
    }

    fn get_genomes(&self) -> Result<HashMap<String, NodeId>, StorageError> {
        Ok(self.state.genomes.clone())
    }

    // -------------------------------------------------------------------
    // Integrity and transaction boundary
    // -------------------------------------------------------------------

    fn validate_tree(&self) -> Result<(), StorageError> {
        validate_links(&self.state.links)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<(), StorageError> {
        // Nothing to reclaim in memory; commit the open transaction to
        // mirror the SQLite backend's observable behavior.
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let root = store.add_node("root", Some(NodeId(1))).unwrap();
        let bacteria = store.add_node("Bacteria", None).unwrap();
        let ecoli = store.add_node("E.coli", None).unwrap();
        let no_rank = store.add_rank("no rank").unwrap();
        let genus = store.add_rank("genus").unwrap();
        let links: BTreeSet<Link> = [
            Link::new(root, root, no_rank),
            Link::new(root, bacteria, no_rank),
            Link::new(bacteria, ecoli, genus),
        ]
        .into_iter()
        .collect();
        store.add_links(&links).unwrap();
        store.commit().unwrap();
        store
    }

    #[test]
    fn mirrors_sqlite_id_assignment() {
        let mut store = InMemoryStore::new();
        assert_eq!(store.add_node("root", Some(NodeId(1))).unwrap(), NodeId(1));
        assert_eq!(store.add_node("Bacteria", None).unwrap(), NodeId(2));
        assert_eq!(store.add_node("Bacteria", None).unwrap(), NodeId(2));
    }

    #[test]
    fn forced_id_bound_to_another_name_is_rejected() {
        let mut store = InMemoryStore::new();
        store.add_node("root", Some(NodeId(1))).unwrap();
        let err = store.add_node("Bacteria", Some(NodeId(1))).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateNodeId { id } if id == NodeId(1)));
        // The original binding is untouched in both directions.
        assert_eq!(store.node_id("root").unwrap(), Some(NodeId(1)));
        assert_eq!(store.node_id("Bacteria").unwrap(), None);
    }

    #[test]
    fn rollback_restores_last_committed_state() {
        let mut store = seeded();
        store.add_node("Salmonella", None).unwrap();
        let doomed: HashSet<NodeId> = [NodeId(3)].into_iter().collect();
        store.delete_nodes(&doomed).unwrap();
        store.rollback().unwrap();
        assert_eq!(store.node_id("Salmonella").unwrap(), None);
        assert_eq!(store.node_id("E.coli").unwrap(), Some(NodeId(3)));
    }

    #[test]
    fn second_parent_is_rejected() {
        let mut store = seeded();
        let links: BTreeSet<Link> =
            [Link::new(NodeId(1), NodeId(3), RankCode(0))].into_iter().collect();
        assert!(matches!(
            store.add_links(&links).unwrap_err(),
            StorageError::MultipleParents { .. }
        ));
    }

    #[test]
    fn only_parents_restricts_to_incoming_links() {
        let store = seeded();
        let bacteria: HashSet<NodeId> = [NodeId(2)].into_iter().collect();
        let incoming = store.get_links(&bacteria, true).unwrap();
        assert_eq!(
            incoming,
            [Link::new(NodeId(1), NodeId(2), RankCode(0))].into_iter().collect()
        );
        let touching = store.get_links(&bacteria, false).unwrap();
        assert_eq!(touching.len(), 2);
    }

    #[test]
    fn delete_genomes_by_owner() {
        let mut store = seeded();
        store.update_genome("GCF_1", NodeId(3)).unwrap();
        store.update_genome("GCF_2", NodeId(2)).unwrap();
        let owners: HashSet<NodeId> = [NodeId(3)].into_iter().collect();
        assert_eq!(store.delete_genomes(&owners).unwrap(), 1);
        assert_eq!(store.get_genomes().unwrap().len(), 1);
    }
}
