//! Translating a foreign source into the primary store's id space.
//!
//! Node ids are meaningless across stores; display names are the join
//! key. Both ingestion paths resolve every referenced name through
//! [`MergeContext::resolve_node`] and accumulate candidate links in the
//! context's working sets.

use std::collections::HashMap;
use std::io::BufRead;

use tracing::{debug, info};

use taxtree_core::{NO_RANK, ROOT};
use taxtree_storage::TreeStore;

use crate::context::MergeContext;
use crate::error::MergeError;

/// Reads an entire foreign store and translates its link set into the
/// primary namespace.
///
/// A self-referential link can only be the foreign tree's own root
/// identity and is never translated into an ordinary link. In replace
/// mode a foreign root that is not the primitive root instead records the
/// anchor's existing parent link as a keep-alive, so the anchor cannot be
/// disconnected while its old subtree is torn down.
///
/// Returns the foreign genome annotations keyed by target node *name*,
/// ready for a post-commit transfer.
pub fn ingest_store<S, F>(
    store: &mut S,
    ctx: &mut MergeContext,
    foreign: &F,
) -> Result<HashMap<String, String>, MergeError>
where
    S: TreeStore,
    F: TreeStore,
{
    info!("reading foreign store");
    let foreign_names = foreign.node_names()?;
    let foreign_ranks = foreign.rank_names()?;

    for link in foreign.all_links()? {
        if link.is_self_loop() {
            if ctx.replace && link.parent != ROOT {
                debug!(link = %ctx.anchor_parent, "recording anchor keep-alive link");
                ctx.new_links.insert(ctx.anchor_parent);
            }
            continue;
        }
        let parent = foreign_names
            .get(&link.parent)
            .ok_or_else(|| MergeError::ForeignStore {
                reason: format!("link parent {} has no node row", link.parent),
            })?
            .trim()
            .to_string();
        let child = foreign_names
            .get(&link.child)
            .ok_or_else(|| MergeError::ForeignStore {
                reason: format!("link child {} has no node row", link.child),
            })?
            .trim()
            .to_string();
        let rank = foreign_ranks
            .get(&link.rank)
            .ok_or_else(|| MergeError::ForeignStore {
                reason: format!("link rank {} has no rank row", link.rank),
            })?
            .clone();

        let parent_id = ctx.resolve_node(store, &parent)?.id();
        let child_id = ctx.resolve_node(store, &child)?.id();
        let rank_code = ctx.resolve_rank(store, &rank)?;
        ctx.push_link(parent_id, child_id, rank_code);
    }

    let mut annotations = HashMap::new();
    for (genome, node) in foreign.get_genomes()? {
        let name = foreign_names
            .get(&node)
            .ok_or_else(|| MergeError::ForeignStore {
                reason: format!("genome '{genome}' references node {node} with no node row"),
            })?;
        annotations.insert(genome, name.trim().to_string());
    }
    info!(
        links = ctx.new_links.len(),
        genomes = annotations.len(),
        "foreign store ingested"
    );
    Ok(annotations)
}

/// Reads a flat delta file and translates its rows into the primary
/// namespace.
///
/// The header declares two or three columns and must lead with "parent"
/// or "child" (case-insensitive). A "child" header swaps the two data
/// columns so downstream code always observes `(parent, child)` order.
/// A missing third column defaults the rank to "no rank". Header problems
/// abort the whole ingestion; no self-loop special case applies here.
pub fn ingest_file<S, R>(
    store: &mut S,
    ctx: &mut MergeContext,
    reader: R,
) -> Result<(), MergeError>
where
    S: TreeStore,
    R: BufRead,
{
    info!("parsing delta file");
    let mut lines = reader.lines();
    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| MergeError::BadHeader {
            reason: "file is empty".to_string(),
        })?;
    let columns: Vec<&str> = header.trim().split(ctx.separator.as_str()).collect();
    if columns.len() < 2 || columns.len() > 3 {
        return Err(MergeError::BadHeader {
            reason: format!(
                "expected 2 or 3 columns separated by {:?}, found {}",
                ctx.separator,
                columns.len()
            ),
        });
    }
    let swap = match columns[0].to_lowercase().as_str() {
        "child" => true,
        "parent" => false,
        other => {
            return Err(MergeError::BadHeader {
                reason: format!("first column must be 'parent' or 'child', found '{other}'"),
            });
        }
    };

    for (index, line) in lines.enumerate() {
        let line = line?;
        // Header is line 1.
        let lineno = index + 2;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim().split(ctx.separator.as_str()).collect();
        let (mut parent, mut child, rank) = match fields.as_slice() {
            [parent, child] => (*parent, *child, NO_RANK),
            [parent, child, rank] => (*parent, *child, *rank),
            _ => {
                return Err(MergeError::BadRow {
                    line: lineno,
                    reason: format!("expected 2 or 3 fields, found {}", fields.len()),
                });
            }
        };
        if swap {
            std::mem::swap(&mut parent, &mut child);
        }
        let parent_id = ctx.resolve_node(store, parent.trim())?.id();
        let child_id = ctx.resolve_node(store, child.trim())?.id();
        let rank_code = ctx.resolve_rank(store, rank.trim())?;
        ctx.push_link(parent_id, child_id, rank_code);
    }
    info!(links = ctx.new_links.len(), "delta file ingested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Cursor;
    use taxtree_core::Link;
    use taxtree_storage::InMemoryStore;

    fn seeded() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let root = store.add_node("root", Some(ROOT)).unwrap();
        let bacteria = store.add_node("Bacteria", None).unwrap();
        let no_rank = store.add_rank("no rank").unwrap();
        let links: BTreeSet<Link> = [
            Link::new(root, root, no_rank),
            Link::new(root, bacteria, no_rank),
        ]
        .into_iter()
        .collect();
        store.add_links(&links).unwrap();
        store.commit().unwrap();
        store
    }

    #[test]
    fn parent_header_reads_rows_in_order() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "parent\tchild\trank\nBacteria\tListeria\tgenus\n";
        ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap();

        let bacteria = store.node_id("Bacteria").unwrap().unwrap();
        let listeria = store.node_id("Listeria").unwrap().unwrap();
        let genus = store.rank_codes().unwrap()["genus"];
        assert!(ctx.new_links.contains(&Link::new(bacteria, listeria, genus)));
    }

    #[test]
    fn child_header_swaps_columns() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "child\tparent\nListeria\tBacteria\n";
        ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap();

        let bacteria = store.node_id("Bacteria").unwrap().unwrap();
        let listeria = store.node_id("Listeria").unwrap().unwrap();
        let link = ctx.new_links.iter().next().copied().unwrap();
        assert_eq!(link.parent, bacteria);
        assert_eq!(link.child, listeria);
    }

    #[test]
    fn missing_rank_column_defaults_to_no_rank() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "parent\tchild\nBacteria\tListeria\n";
        ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap();

        let no_rank = store.rank_codes().unwrap()["no rank"];
        assert!(ctx.new_links.iter().all(|link| link.rank == no_rank));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "parent\tchild\n\nBacteria\tListeria\n\n";
        ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap();
        assert_eq!(ctx.new_links.len(), 1);
    }

    #[test]
    fn bad_headers_abort_before_any_row() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();

        let err =
            ingest_file(&mut store, &mut ctx, Cursor::new("taxon\tother\nA\tB\n")).unwrap_err();
        assert!(matches!(err, MergeError::BadHeader { .. }));
        assert!(ctx.new_links.is_empty());

        let err = ingest_file(
            &mut store,
            &mut ctx,
            Cursor::new("parent\tchild\trank\textra\n"),
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::BadHeader { .. }));
    }

    #[test]
    fn malformed_rows_report_their_line_number() {
        let mut store = seeded();
        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let file = "parent\tchild\nBacteria\tListeria\nBacteria\tA\tgenus\textra\n";
        let err = ingest_file(&mut store, &mut ctx, Cursor::new(file)).unwrap_err();
        assert!(matches!(err, MergeError::BadRow { line: 3, .. }));
    }

    #[test]
    fn foreign_store_links_are_translated_by_name() {
        let mut store = seeded();

        // A foreign store with its own id space: Bacteria exists in both
        // stores under different ids.
        let mut foreign = InMemoryStore::new();
        let froot = foreign.add_node("foreign root", Some(ROOT)).unwrap();
        let fbact = foreign.add_node("Bacteria", None).unwrap();
        let flist = foreign.add_node("Listeria", None).unwrap();
        let fno = foreign.add_rank("no rank").unwrap();
        let fgenus = foreign.add_rank("genus").unwrap();
        let links: BTreeSet<Link> = [
            Link::new(froot, froot, fno),
            Link::new(froot, fbact, fno),
            Link::new(fbact, flist, fgenus),
        ]
        .into_iter()
        .collect();
        foreign.add_links(&links).unwrap();
        foreign.update_genome("genome123", flist).unwrap();
        foreign.commit().unwrap();

        let mut ctx = MergeContext::open(&store, "Bacteria", false, "\t").unwrap();
        let annotations = ingest_store(&mut store, &mut ctx, &foreign).unwrap();

        // Bacteria resolved to its primary id, Listeria freshly allocated.
        let bacteria = store.node_id("Bacteria").unwrap().unwrap();
        let listeria = store.node_id("Listeria").unwrap().unwrap();
        assert!(listeria.0 >= 1_000_000);
        let genus = store.rank_codes().unwrap()["genus"];
        assert!(ctx.new_links.contains(&Link::new(bacteria, listeria, genus)));

        // The foreign root self-link was not translated (non-replace mode).
        assert!(ctx.new_links.iter().all(|link| !link.is_self_loop()));

        // Annotations come back keyed by name for the post-commit join.
        assert_eq!(annotations["genome123"], "Listeria");
    }

    #[test]
    fn replace_mode_records_anchor_keep_alive_for_foreign_root() {
        let mut store = seeded();

        let mut foreign = InMemoryStore::new();
        // Foreign root deliberately not id 1.
        let fbact = foreign.add_node("Bacteria", Some(taxtree_core::NodeId(7))).unwrap();
        let flist = foreign.add_node("Listeria", None).unwrap();
        let fno = foreign.add_rank("no rank").unwrap();
        let links: BTreeSet<Link> = [
            Link::new(fbact, fbact, fno),
            Link::new(fbact, flist, fno),
        ]
        .into_iter()
        .collect();
        foreign.add_links(&links).unwrap();
        foreign.commit().unwrap();

        let mut ctx = MergeContext::open(&store, "Bacteria", true, "\t").unwrap();
        let anchor_parent = ctx.anchor_parent;
        ingest_store(&mut store, &mut ctx, &foreign).unwrap();
        assert!(ctx.new_links.contains(&anchor_parent));
    }
}
