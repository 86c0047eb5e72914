//! Whole-tree invariant checks shared by all backends.
//!
//! Operates on a materialized link set so that both the SQLite and the
//! in-memory backend validate through the same code path. Checks, in order:
//! single parent per node, root self-rooted, acyclicity, and reachability
//! of every linked node from the root.

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use taxtree_core::{Link, NodeId, ROOT};

use crate::error::StorageError;

/// Validates the tree invariant over a full link set.
///
/// An empty link set is trivially valid (a freshly created store).
pub fn validate_links(links: &HashSet<Link>) -> Result<(), StorageError> {
    if links.is_empty() {
        return Ok(());
    }

    // Every node has exactly one incoming link. The root's self-loop is its
    // one incoming link, so no special case is needed here.
    let mut parent_of: HashMap<NodeId, Link> = HashMap::new();
    for link in links {
        if let Some(previous) = parent_of.insert(link.child, *link) {
            if previous != *link {
                return Err(StorageError::MultipleParents { child: link.child });
            }
        }
    }

    if !parent_of
        .get(&ROOT)
        .map(Link::is_self_loop)
        .unwrap_or(false)
    {
        return Err(StorageError::InvalidTree {
            reason: format!("root node {} is not self-rooted", ROOT),
        });
    }

    // Build a parent -> child digraph, leaving the root's self-loop out so
    // cycle detection only reports genuine ancestry cycles.
    let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut index_of = |graph: &mut DiGraph<NodeId, ()>, id: NodeId| -> NodeIndex {
        *indices.entry(id).or_insert_with(|| graph.add_node(id))
    };
    for link in links {
        if link.is_self_loop() {
            continue;
        }
        let parent = index_of(&mut graph, link.parent);
        let child = index_of(&mut graph, link.child);
        graph.add_edge(parent, child, ());
    }

    if is_cyclic_directed(&graph) {
        return Err(StorageError::InvalidTree {
            reason: "cycle detected in tree links".to_string(),
        });
    }

    // Every linked node must be reachable from the root.
    let root_index = match indices.get(&ROOT) {
        Some(index) => *index,
        None => {
            // Only the self-loop exists; nothing else to reach.
            return Ok(());
        }
    };
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut dfs = Dfs::new(&graph, root_index);
    while let Some(index) = dfs.next(&graph) {
        visited.insert(index);
    }
    for (id, index) in &indices {
        if !visited.contains(index) {
            return Err(StorageError::InvalidTree {
                reason: format!("node {} is not reachable from the root", id),
            });
        }
    }

    Ok(())
}
