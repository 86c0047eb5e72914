//! Genome annotation ingestion from flat files.

use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, info, warn};

use taxtree_core::NodeId;
use taxtree_storage::TreeStore;

use crate::error::MergeError;

/// Fallback separator for files written with aligned whitespace instead
/// of the configured one.
const ALT_SEPARATOR: &str = "    ";

/// Counters reported by one annotation run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotateStats {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Reads `genome<sep>taxon` records and points each genome at its taxon.
///
/// A second field that parses as an integer is taken as an already
/// resolved node id; anything else is resolved by name. Either way a
/// taxon with no node in the store is skipped and counted, never fatal.
/// Rows that do not split into two fields on either separator are a hard
/// input error.
pub fn annotate<S, R>(
    store: &mut S,
    reader: R,
    separator: &str,
) -> Result<AnnotateStats, MergeError>
where
    S: TreeStore,
    R: BufRead,
{
    info!("updating genome annotations");
    let nodes = store.node_ids()?;
    let known_ids: std::collections::HashSet<NodeId> = nodes.values().copied().collect();
    let mut stats = AnnotateStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let (genome, taxon) = split_record(&line, separator).ok_or_else(|| {
            MergeError::BadRow {
                line: lineno,
                reason: format!("expected 'genome{separator}taxon'"),
            }
        })?;

        let id = if let Ok(raw) = taxon.parse::<i64>() {
            warn!(line = lineno, "annotation uses a numeric id instead of a name");
            let id = NodeId(raw);
            if !known_ids.contains(&id) {
                debug!(genome, %id, "no such node id, annotation skipped");
                stats.skipped += 1;
                continue;
            }
            id
        } else {
            match nodes.get(taxon) {
                Some(&id) => id,
                None => {
                    debug!(genome, taxon, "no such taxon, annotation skipped");
                    stats.skipped += 1;
                    continue;
                }
            }
        };
        if store.update_genome(genome, id)? {
            stats.updated += 1;
        } else {
            stats.added += 1;
        }
    }
    store.commit()?;
    info!(
        added = stats.added,
        updated = stats.updated,
        skipped = stats.skipped,
        "genome annotations written"
    );
    Ok(stats)
}

fn split_record<'a>(line: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    let split = |sep: &str| {
        let mut fields = line.trim().split(sep).filter(|field| !field.is_empty());
        match (fields.next(), fields.next(), fields.next()) {
            (Some(genome), Some(taxon), None) => Some((genome.trim(), taxon.trim())),
            _ => None,
        }
    };
    split(separator).or_else(|| split(ALT_SEPARATOR))
}
