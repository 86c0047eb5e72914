//! Per-merge node name <-> id translation table.
//!
//! Node ids are store-local integers and never comparable across stores;
//! display names are the join key. A `NodeTable` is built once per merge
//! from the primary store's node table and discarded after commit.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::id::NodeId;

/// Result of a get-or-create-by-name resolution.
///
/// Distinguishing the two outcomes explicitly keeps creation statistics
/// observable instead of relying on failure semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetOrCreate {
    /// The name already resolved to an existing node.
    Found(NodeId),
    /// A new node was allocated for the name.
    Created(NodeId),
}

impl GetOrCreate {
    pub fn id(&self) -> NodeId {
        match self {
            GetOrCreate::Found(id) | GetOrCreate::Created(id) => *id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, GetOrCreate::Created(_))
    }
}

/// Bidirectional map between node display names and node ids.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    by_name: HashMap<String, NodeId>,
    by_id: HashMap<NodeId, String>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from a persisted name -> id mapping.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = (String, NodeId)>,
    {
        let mut table = Self::new();
        for (name, id) in names {
            // Persisted tables are unique on both columns.
            table.by_name.insert(name.clone(), id);
            table.by_id.insert(id, name);
        }
        table
    }

    /// Registers a name/id pair. A name already bound to a *different* id is
    /// a hard error: display names are unique within a store.
    pub fn insert(&mut self, name: &str, id: NodeId) -> Result<(), CoreError> {
        if let Some(&existing) = self.by_name.get(name) {
            if existing != id {
                return Err(CoreError::DuplicateNodeName {
                    name: name.to_string(),
                });
            }
            return Ok(());
        }
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
