//! Per-merge working state.
//!
//! A [`MergeContext`] carries the anchor, mode flags, translation tables,
//! and the accumulated candidate sets through reconcile -> diff -> apply.
//! It is built once per merge and discarded after commit; no process-wide
//! state is involved.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use taxtree_core::{GetOrCreate, Link, NodeId, NodeTable, RankCode, RankRegistry};
use taxtree_storage::TreeStore;

use crate::allocator::NodeAllocator;
use crate::error::MergeError;

/// Working state of one merge operation.
#[derive(Debug)]
pub struct MergeContext {
    pub anchor_name: String,
    pub anchor: NodeId,
    /// The anchor's existing incoming link. Never enters any deletion set.
    pub anchor_parent: Link,
    pub replace: bool,
    pub separator: String,
    allocator: NodeAllocator,
    nodes: NodeTable,
    ranks: RankRegistry,
    /// Candidate nodes referenced by the incoming source, in primary ids.
    pub new_nodes: HashSet<NodeId>,
    /// Candidate links from the incoming source, in primary ids.
    pub new_links: BTreeSet<Link>,
    nodes_created: usize,
}

impl MergeContext {
    /// Resolves the anchor against the primary store and captures its
    /// translation tables. Fails before any mutation when the anchor is
    /// missing, detached, or the root itself.
    pub fn open<S: TreeStore>(
        store: &S,
        anchor_name: &str,
        replace: bool,
        separator: &str,
    ) -> Result<Self, MergeError> {
        let nodes = NodeTable::from_names(store.node_ids()?);
        let ranks = RankRegistry::from_pairs(store.rank_names()?);

        let anchor = nodes
            .id(anchor_name)
            .ok_or_else(|| MergeError::AnchorNotFound {
                name: anchor_name.to_string(),
            })?;
        let anchor_parent =
            store
                .get_parent(anchor)?
                .ok_or_else(|| MergeError::AnchorDetached {
                    name: anchor_name.to_string(),
                })?;
        if anchor_parent.is_self_loop() {
            return Err(MergeError::AnchorIsRoot {
                name: anchor_name.to_string(),
            });
        }

        let allocator = NodeAllocator::new(store.max_native_id()?);
        debug!(base = %allocator.base(), "taxid base");

        Ok(MergeContext {
            anchor_name: anchor_name.to_string(),
            anchor,
            anchor_parent,
            replace,
            separator: separator.to_string(),
            allocator,
            nodes,
            ranks,
            new_nodes: HashSet::new(),
            new_links: BTreeSet::new(),
            nodes_created: 0,
        })
    }

    /// Get-or-create-by-name: the universal cross-store node resolution.
    /// On a miss a fresh synthetic id is allocated and the node row is
    /// registered with the store (buffered until the merge commits).
    pub fn resolve_node<S: TreeStore>(
        &mut self,
        store: &mut S,
        name: &str,
    ) -> Result<GetOrCreate, MergeError> {
        if let Some(id) = self.nodes.id(name) {
            return Ok(GetOrCreate::Found(id));
        }
        let id = self.allocator.next_id();
        let id = store.add_node(name, Some(id))?;
        self.nodes.insert(name, id)?;
        self.nodes_created += 1;
        Ok(GetOrCreate::Created(id))
    }

    /// Get-or-create a rank code by name.
    pub fn resolve_rank<S: TreeStore>(
        &mut self,
        store: &mut S,
        name: &str,
    ) -> Result<RankCode, MergeError> {
        if let Some(code) = self.ranks.code(name) {
            return Ok(code);
        }
        let code = store.add_rank(name)?;
        self.ranks.insert(name, code);
        Ok(code)
    }

    /// Records a candidate link and both of its endpoints.
    pub fn push_link(&mut self, parent: NodeId, child: NodeId, rank: RankCode) {
        self.new_nodes.insert(parent);
        self.new_nodes.insert(child);
        self.new_links.insert(Link::new(parent, child, rank));
    }

    /// Nodes created (rather than found) during this merge.
    pub fn nodes_created(&self) -> usize {
        self.nodes_created
    }
}
