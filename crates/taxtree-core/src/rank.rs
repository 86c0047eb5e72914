//! Bidirectional rank name <-> code registry.
//!
//! Ranks are created on first use and never removed. The registry is a
//! per-process cache over whatever the backing store has persisted; code
//! allocation itself is the store's job.

use std::collections::HashMap;

use crate::id::RankCode;

/// Rank name used when an input row carries no rank column.
pub const NO_RANK: &str = "no rank";

/// Lazily growing bidirectional map between rank names and integer codes.
#[derive(Debug, Clone, Default)]
pub struct RankRegistry {
    by_name: HashMap<String, RankCode>,
    by_code: HashMap<RankCode, String>,
}

impl RankRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from persisted `(code, name)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (RankCode, String)>,
    {
        let mut registry = Self::new();
        for (code, name) in pairs {
            registry.insert(&name, code);
        }
        registry
    }

    /// Registers a name/code pair in both directions.
    pub fn insert(&mut self, name: &str, code: RankCode) {
        self.by_name.insert(name.to_string(), code);
        self.by_code.insert(code, name.to_string());
    }

    pub fn code(&self, name: &str) -> Option<RankCode> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, code: RankCode) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
