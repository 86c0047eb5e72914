//! End-to-end tests for the merge pipeline against the SQLite backend.
//!
//! Each test seeds a small taxonomy, runs a merge (flat file or foreign
//! store), and verifies the resulting tree shape, the deletion behavior
//! of replace mode, annotation transfer, and the idempotence of
//! re-applying the same merge.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use taxtree_core::{Link, NodeId, ROOT};
use taxtree_merge::{
    clean, merge_with_database, merge_with_file, merge_with_store, MergeError, MergeOptions,
};
use taxtree_storage::{SqliteStore, TreeStore};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// root -> Bacteria -> {E.coli, Salmonella}
fn seeded_store() -> SqliteStore {
    let mut store = SqliteStore::in_memory().unwrap();
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

fn delta_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn children_of(store: &SqliteStore, name: &str) -> HashSet<NodeId> {
    let id = store.node_id(name).unwrap().unwrap();
    store
        .get_children(&[id].into_iter().collect(), Some(1))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Flat-file merges
// ---------------------------------------------------------------------------

#[test]
fn non_replace_merge_grafts_without_deleting() {
    let mut store = seeded_store();
    let file = delta_file("parent\tchild\trank\nBacteria\tListeria\tgenus\n");
    let options = MergeOptions::new("Bacteria");

    let stats = merge_with_file(&mut store, file.path(), &options).unwrap();
    assert!(stats.changed);
    assert_eq!(stats.links_added, 1);
    assert_eq!(stats.nodes_removed, 0);

    assert_eq!(children_of(&store, "Bacteria").len(), 3);
    assert!(store.node_id("Salmonella").unwrap().is_some());
    store.validate_tree().unwrap();
}

#[test]
fn child_header_files_merge_identically() {
    let mut parent_first = seeded_store();
    let mut child_first = seeded_store();
    let options = MergeOptions::new("Bacteria");

    let a = delta_file("parent\tchild\trank\nBacteria\tListeria\tgenus\n");
    let b = delta_file("child\tparent\trank\nListeria\tBacteria\tgenus\n");
    merge_with_file(&mut parent_first, a.path(), &options).unwrap();
    merge_with_file(&mut child_first, b.path(), &options).unwrap();

    let listeria = child_first.node_id("Listeria").unwrap().unwrap();
    let bacteria = child_first.node_id("Bacteria").unwrap().unwrap();
    let parent = child_first.get_parent(listeria).unwrap().unwrap();
    assert_eq!(parent.parent, bacteria);
    assert_eq!(
        children_of(&parent_first, "Bacteria").len(),
        children_of(&child_first, "Bacteria").len()
    );
}

#[test]
fn second_application_reports_no_changes() {
    let mut store = seeded_store();
    let file = delta_file("parent\tchild\trank\nBacteria\tListeria\tgenus\n");
    let options = MergeOptions::new("Bacteria");

    let first = merge_with_file(&mut store, file.path(), &options).unwrap();
    assert!(first.changed);

    let second = merge_with_file(&mut store, file.path(), &options).unwrap();
    assert!(!second.changed);
    assert_eq!(second.links_added, 0);
    assert_eq!(second.nodes_added, 0);
}

#[test]
fn bad_header_aborts_without_mutation() {
    let mut store = seeded_store();
    let file = delta_file("taxon\tother\nBacteria\tListeria\n");
    let options = MergeOptions::new("Bacteria");

    let err = merge_with_file(&mut store, file.path(), &options).unwrap_err();
    assert!(matches!(err, MergeError::BadHeader { .. }));
    assert!(err.is_input());

    // The tree is untouched.
    assert_eq!(children_of(&store, "Bacteria").len(), 2);
    assert!(store.node_id("Listeria").unwrap().is_none());
}

#[test]
fn missing_anchor_fails_before_reading_the_file() {
    let mut store = seeded_store();
    let file = delta_file("parent\tchild\nVibrio\tListeria\n");
    let options = MergeOptions::new("Vibrio");

    let err = merge_with_file(&mut store, file.path(), &options).unwrap_err();
    assert!(matches!(err, MergeError::AnchorNotFound { .. }));
    assert!(store.node_id("Listeria").unwrap().is_none());
}

#[test]
fn nonexistent_modification_database_is_rejected_up_front() {
    let mut store = seeded_store();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.db");
    let options = MergeOptions::new("Bacteria");

    let err = merge_with_database(&mut store, &path, &options).unwrap_err();
    assert!(matches!(err, MergeError::SourceNotFound { .. }));
    assert!(err.is_input());

    // The missing path must not come into existence as an empty database.
    assert!(!path.exists());
    assert_eq!(children_of(&store, "Bacteria").len(), 2);
}

// ---------------------------------------------------------------------------
// Replace mode
// ---------------------------------------------------------------------------

#[test]
fn replace_excises_descendants_missing_from_the_source() {
    let mut store = seeded_store();

    // Foreign store whose Bacteria subtree only contains E.coli.
    let mut foreign = SqliteStore::in_memory().unwrap();
    let froot = foreign.add_node("root", Some(ROOT)).unwrap();
    let fbact = foreign.add_node("Bacteria", None).unwrap();
    let fecoli = foreign.add_node("E.coli", None).unwrap();
    let fno = foreign.add_rank("no rank").unwrap();
    let fspecies = foreign.add_rank("species").unwrap();
    let links: BTreeSet<Link> = [
        Link::new(froot, froot, fno),
        Link::new(froot, fbact, fno),
        Link::new(fbact, fecoli, fspecies),
    ]
    .into_iter()
    .collect();
    foreign.add_links(&links).unwrap();
    foreign.commit().unwrap();

    let options = MergeOptions::new("Bacteria").replace(true);
    let stats = merge_with_store(&mut store, &foreign, &options).unwrap();
    assert!(stats.changed);

    // Salmonella and its link are gone, E.coli survives, the anchor is
    // still attached to the root.
    assert!(store.node_id("Salmonella").unwrap().is_none());
    assert!(store.node_id("E.coli").unwrap().is_some());
    let bacteria = store.node_id("Bacteria").unwrap().unwrap();
    let anchor_parent = store.get_parent(bacteria).unwrap().unwrap();
    assert_eq!(anchor_parent.parent, ROOT);
    store.validate_tree().unwrap();
}

#[test]
fn store_merge_transfers_foreign_annotations_by_name() {
    let mut store = seeded_store();

    let mut foreign = SqliteStore::in_memory().unwrap();
    let froot = foreign.add_node("root", Some(ROOT)).unwrap();
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

    let options = MergeOptions::new("Bacteria");
    let stats = merge_with_store(&mut store, &foreign, &options).unwrap();
    assert_eq!(stats.genomes_added, 1);
    assert_eq!(stats.genomes_skipped, 0);

    // The annotation points at the *primary* Listeria id, not the
    // foreign one.
    let listeria = store.node_id("Listeria").unwrap().unwrap();
    assert_ne!(listeria, flist);
    assert_eq!(store.get_genomes().unwrap()["genome123"], listeria);
}

#[test]
fn merge_then_clean_keeps_only_annotated_paths() {
    let mut store = seeded_store();
    let ecoli = store.node_id("E.coli").unwrap().unwrap();
    store.update_genome("genome1", ecoli).unwrap();
    store.commit().unwrap();

    let file = delta_file("parent\tchild\trank\nBacteria\tListeria\tgenus\n");
    merge_with_file(&mut store, file.path(), &MergeOptions::new("Bacteria")).unwrap();

    let stats = clean(&mut store, false).unwrap();
    // Salmonella and the freshly merged but unannotated Listeria go.
    assert_eq!(stats.nodes_removed, 2);
    assert!(store.node_id("E.coli").unwrap().is_some());
    assert!(store.node_id("Listeria").unwrap().is_none());
    store.validate_tree().unwrap();
}

// ---------------------------------------------------------------------------
// Durability
// ---------------------------------------------------------------------------

#[test]
fn merged_tree_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taxonomy.db");

    {
        let mut store = SqliteStore::open(&path).unwrap();
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

        let file = delta_file("parent\tchild\trank\nBacteria\tListeria\tgenus\n");
        merge_with_file(&mut store, file.path(), &MergeOptions::new("Bacteria")).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(store.node_id("Listeria").unwrap().is_some());
    store.validate_tree().unwrap();
}
