//! Garbage collection of unannotated structure.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use taxtree_core::{NodeId, ROOT};
use taxtree_storage::TreeStore;

use crate::error::MergeError;

/// Counters reported by one garbage collection run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub links_removed: usize,
    pub nodes_removed: usize,
    pub nodes_kept: usize,
}

/// Deletes every node and link not needed to keep an annotated node
/// reachable from the root.
///
/// The kept set is the annotated nodes plus their full ancestor closure,
/// so an annotated node can never lose its path to the root. With
/// `preserve_top_level` the root's immediate children survive even when
/// unannotated, keeping the top rank skeleton intact. A store with no
/// annotations at all is refused outright.
pub fn clean<S: TreeStore>(
    store: &mut S,
    preserve_top_level: bool,
) -> Result<CleanStats, MergeError> {
    let annotated: HashSet<NodeId> = store.get_genomes()?.into_values().collect();
    info!(nodes = annotated.len(), "annotated nodes");
    if annotated.is_empty() {
        return Err(MergeError::NoAnnotations);
    }

    let all_links = store.all_links()?;
    let all_nodes: HashSet<NodeId> = store.node_names()?.into_keys().collect();

    let mut kept = annotated.clone();
    kept.extend(store.get_parents(&annotated, true)?);
    debug!(ancestors = kept.len() - annotated.len(), "ancestors added");
    if preserve_top_level {
        let top: HashSet<NodeId> = store.get_children(&[ROOT].into_iter().collect(), Some(1))?;
        debug!(nodes = top.len(), "keeping top-level skeleton");
        kept.extend(top);
        kept.insert(ROOT);
    }

    let kept_links = store.get_links(&kept, true)?;
    let clean_links: HashSet<_> = all_links.difference(&kept_links).copied().collect();
    let clean_nodes: HashSet<NodeId> = all_nodes.difference(&kept).copied().collect();
    info!(
        links = clean_links.len(),
        nodes = clean_nodes.len(),
        "structure to remove"
    );

    let mut stats = CleanStats {
        nodes_kept: kept.len(),
        ..CleanStats::default()
    };
    if clean_links.len() < all_links.len() && !clean_links.is_empty() {
        stats.links_removed = store.delete_links(&clean_links)?;
    }
    if clean_nodes.len() < all_nodes.len() && !clean_nodes.is_empty() {
        stats.nodes_removed = store.delete_nodes(&clean_nodes)?;
        if !preserve_top_level {
            store.delete_genomes(&clean_nodes)?;
        }
    }

    store.validate_tree()?;
    store.commit()?;
    store.compact()?;
    info!("store cleaned");
    Ok(stats)
}
