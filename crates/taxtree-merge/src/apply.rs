//! Applying a computed diff as one atomic unit.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use taxtree_core::Link;
use taxtree_storage::TreeStore;

use crate::context::MergeContext;
use crate::diff::TreeDiff;
use crate::error::MergeError;

/// Counters reported by one merge application.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub links_added: usize,
    pub nodes_added: usize,
    pub links_removed: usize,
    pub nodes_removed: usize,
    pub genomes_added: usize,
    pub genomes_updated: usize,
    pub genomes_skipped: usize,
    /// False when the whole merge was already present and nothing was
    /// committed.
    pub changed: bool,
}

/// Deletes obsolete structure, inserts the candidate links, transfers
/// foreign genome annotations, then revalidates and compacts.
///
/// All deletions and insertions land in one transaction. A merge whose
/// every effect is already present commits nothing and reports
/// `changed: false`.
pub fn apply<S: TreeStore>(
    store: &mut S,
    ctx: &MergeContext,
    diff: &TreeDiff,
    annotations: Option<&HashMap<String, String>>,
) -> Result<MergeStats, MergeError> {
    let mut stats = MergeStats::default();

    if ctx.replace {
        // Annotations under the anchor are superseded by the incoming
        // source; the transfer below rebuilds the surviving ones.
        let mut subtree = diff.existing_nodes.clone();
        subtree.insert(ctx.anchor);
        store.delete_genomes(&subtree)?;

        let mut deletions: HashSet<Link> = diff
            .old_links
            .union(&diff.non_overlapping_old_links)
            .copied()
            .collect();
        deletions.remove(&ctx.anchor_parent);
        if !deletions.is_empty() {
            info!(links = deletions.len(), "deleting superseded links");
            stats.links_removed = store.delete_links(&deletions)?;
        }
        if !diff.old_nodes.is_empty() {
            info!(nodes = diff.old_nodes.len(), "deleting superseded nodes");
            stats.nodes_removed = store.delete_nodes(&diff.old_nodes)?;
        }
    }

    let (inserted_links, inserted_nodes) = store.add_links(&ctx.new_links)?;
    stats.links_added = inserted_links.len();
    stats.nodes_added = inserted_nodes.len();

    if stats.links_added + stats.nodes_added + diff.non_overlapping_old_links.len() == 0 {
        info!("all updates already present, nothing changed");
        store.rollback()?;
        return Ok(stats);
    }
    stats.changed = true;
    info!(
        links_added = stats.links_added,
        nodes_added = stats.nodes_added,
        links_removed = stats.links_removed,
        nodes_removed = stats.nodes_removed,
        "committing merge"
    );
    store.commit()?;

    if let Some(annotations) = annotations {
        transfer_annotations(store, annotations, &mut stats)?;
    }

    store.validate_tree()?;
    store.compact()?;
    Ok(stats)
}

/// Post-commit genome transfer: the node table is re-read so freshly
/// inserted nodes are visible, then each annotation is joined by name.
/// A name with no node in the receiving store is skipped and counted,
/// never fatal.
fn transfer_annotations<S: TreeStore>(
    store: &mut S,
    annotations: &HashMap<String, String>,
    stats: &mut MergeStats,
) -> Result<(), MergeError> {
    if annotations.is_empty() {
        return Ok(());
    }
    info!(genomes = annotations.len(), "transferring genome annotations");
    let nodes = store.node_ids()?;
    for (genome, name) in annotations {
        let Some(&id) = nodes.get(name.as_str()) else {
            debug!(genome, name, "target taxon missing, annotation skipped");
            stats.genomes_skipped += 1;
            continue;
        };
        if store.update_genome(genome, id)? {
            stats.genomes_updated += 1;
        } else {
            stats.genomes_added += 1;
        }
    }
    store.commit()?;
    if stats.genomes_skipped > 0 {
        info!(
            skipped = stats.genomes_skipped,
            "annotations without a receiving taxon were skipped"
        );
    }
    info!(
        added = stats.genomes_added,
        updated = stats.genomes_updated,
        "genome annotations transferred"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Cursor;
    use taxtree_core::ROOT;
    use taxtree_storage::InMemoryStore;

    use crate::diff::diff;
    use crate::reconcile::ingest_file;

    fn seeded() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let root = store.add_node("root", Some(ROOT)).unwrap();
        let bacteria = store.add_node("Bacteria", None).unwrap();
        let ecoli = store.add_node("E.coli", None).unwrap();
        let salmonella = store.add_node("Salmonella", None).unwrap();
        let no_rank = store.add_rank("no rank").unwrap();
        let species = store.add_rank("species").unwrap();
        let links: BTreeSet<Link> = [
            Link::new(root, root, no_rank),
            Link::new(root, bacteria, no_rank),
            Link::new(bacteria, ecoli, species),
            Link::new(bacteria, salmonella, species),
        ]
        .into_iter()
        .collect();
        store.add_links(&links).unwrap();
        store.commit().unwrap();
        store
    }

    fn merge_file(store: &mut InMemoryStore, file: &str, replace: bool) -> MergeStats {
        let mut ctx = MergeContext::open(store, "Bacteria", replace, "\t").unwrap();
        ingest_file(store, &mut ctx, Cursor::new(file)).unwrap();
        let diff = diff(store, &ctx).unwrap();
        apply(store, &ctx, &diff, None).unwrap()
    }

    #[test]
    fn non_replace_merge_only_adds() {
        let mut store = seeded();
        let stats = merge_file(
            &mut store,
            "parent\tchild\trank\nBacteria\tListeria\tgenus\n",
            false,
        );
        assert!(stats.changed);
        assert_eq!(stats.links_added, 1);
        assert_eq!(stats.nodes_added, 1);
        assert_eq!(stats.links_removed, 0);
        assert_eq!(stats.nodes_removed, 0);

        // Bacteria now has three children and nothing was deleted.
        let bacteria = store.node_id("Bacteria").unwrap().unwrap();
        let children = store
            .get_children(&[bacteria].into_iter().collect(), Some(1))
            .unwrap();
        assert_eq!(children.len(), 3);
        assert!(store.node_id("Salmonella").unwrap().is_some());
        store.validate_tree().unwrap();
    }

    #[test]
    fn replace_merge_deletes_untouched_descendants() {
        let mut store = seeded();
        let stats = merge_file(
            &mut store,
            "parent\tchild\trank\nBacteria\tE.coli\tspecies\n",
            true,
        );
        assert!(stats.changed);
        assert_eq!(stats.nodes_removed, 1);
        assert!(store.node_id("Salmonella").unwrap().is_none());
        assert!(store.node_id("E.coli").unwrap().is_some());

        // The anchor is still connected to the root.
        let bacteria = store.node_id("Bacteria").unwrap().unwrap();
        let parent = store.get_parent(bacteria).unwrap().unwrap();
        assert_eq!(parent.parent, ROOT);
        store.validate_tree().unwrap();
    }

    #[test]
    fn second_identical_merge_changes_nothing() {
        let mut store = seeded();
        let file = "parent\tchild\trank\nBacteria\tListeria\tgenus\n";
        let first = merge_file(&mut store, file, false);
        assert!(first.changed);

        let second = merge_file(&mut store, file, false);
        assert!(!second.changed);
        assert_eq!(second.links_added, 0);
        assert_eq!(second.nodes_added, 0);
    }

    #[test]
    fn annotation_transfer_skips_missing_taxa() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "parent\tchild\trank\nBacteria\tListeria\tgenus\n";
        ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap();
        let diff = diff(&store, &ctx).unwrap();

        let annotations: HashMap<String, String> = [
            ("genome1".to_string(), "Listeria".to_string()),
            ("genome2".to_string(), "Vibrio".to_string()),
        ]
        .into_iter()
        .collect();
        let stats = apply(&mut store, &ctx, &diff, Some(&annotations)).unwrap();
        assert_eq!(stats.genomes_added, 1);
        assert_eq!(stats.genomes_skipped, 1);

        let genomes = store.get_genomes().unwrap();
        let listeria = store.node_id("Listeria").unwrap().unwrap();
        assert_eq!(genomes.get("genome1"), Some(&listeria));
        assert!(!genomes.contains_key("genome2"));
    }
}
