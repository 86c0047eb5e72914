//! Classifying candidate links against the anchor's existing subtree.

use std::collections::HashSet;

use tracing::{debug, info};

use taxtree_core::{Link, NodeId};
use taxtree_storage::TreeStore;

use crate::context::MergeContext;
use crate::error::MergeError;

/// Existing structure under the anchor, split against the candidate sets.
///
/// Link identity is the full triple, so a rank change shows up as one
/// entry in `old_links` plus one in the context's `new_links`, never as
/// an in-place update.
#[derive(Debug, Default)]
pub struct TreeDiff {
    /// Strict descendants of the anchor before the merge.
    pub existing_nodes: HashSet<NodeId>,
    /// Links touching those descendants before the merge.
    pub existing_links: HashSet<Link>,
    /// Existing nodes the source never mentions. Deleted only in replace
    /// mode, untouched otherwise.
    pub old_nodes: HashSet<NodeId>,
    /// Existing links absent from the candidate set. Deleted only in
    /// replace mode, retained otherwise.
    pub old_links: HashSet<Link>,
    /// Links identical on both sides. Re-added on apply (a storage no-op)
    /// so the final link set stays consistent even when intermediate steps
    /// deleted and reinserted nodes.
    pub overlapping_links: HashSet<Link>,
    /// Replace mode only: links internal to nodes that exist on both
    /// sides but whose structure the source redefines. Deleted before the
    /// candidate links are inserted. The anchor's parent link is never a
    /// member.
    pub non_overlapping_old_links: HashSet<Link>,
}

/// Computes the diff between the store's current subtree under the
/// anchor and the context's candidate sets.
pub fn diff<S: TreeStore>(store: &S, ctx: &MergeContext) -> Result<TreeDiff, MergeError> {
    let anchor_set: HashSet<NodeId> = [ctx.anchor].into_iter().collect();
    let existing_nodes = store.get_children(&anchor_set, None)?;
    info!(
        children = existing_nodes.len(),
        anchor = %ctx.anchor_name,
        "existing subtree"
    );
    let existing_links = if existing_nodes.is_empty() {
        HashSet::new()
    } else {
        store.get_links(&existing_nodes, false)?
    };

    let new_links: HashSet<Link> = ctx.new_links.iter().copied().collect();
    let old_nodes: HashSet<NodeId> = existing_nodes
        .difference(&ctx.new_nodes)
        .copied()
        .collect();
    let overlapping_links: HashSet<Link> =
        existing_links.intersection(&new_links).copied().collect();
    let old_links: HashSet<Link> = existing_links.difference(&new_links).copied().collect();

    let mut non_overlapping_old_links = HashSet::new();
    if ctx.replace && !existing_nodes.is_empty() {
        // Structure among nodes present on both sides is being redefined
        // by the incoming data. The anchor itself is excluded so its
        // parent link can never enter a deletion set.
        let mut shared: HashSet<NodeId> = existing_nodes
            .intersection(&ctx.new_nodes)
            .copied()
            .collect();
        shared.remove(&ctx.anchor);
        if !shared.is_empty() {
            non_overlapping_old_links = store.get_links(&shared, false)?;
        }
        non_overlapping_old_links.remove(&ctx.anchor_parent);
    }

    debug!(
        old_nodes = old_nodes.len(),
        old_links = old_links.len(),
        overlapping = overlapping_links.len(),
        conflicting = non_overlapping_old_links.len(),
        "diff computed"
    );
    Ok(TreeDiff {
        existing_nodes,
        existing_links,
        old_nodes,
        old_links,
        overlapping_links,
        non_overlapping_old_links,
    })
}
