//! SQLite implementation of [`TreeStore`].
//!
//! [`SqliteStore`] persists the taxonomy in a SQLite database with WAL mode
//! and automatic schema migrations. Mutations accumulate in a lazily opened
//! transaction; [`TreeStore::commit`] is the sole durability point, so a
//! multi-step modification lands atomically or not at all.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use taxtree_core::{Link, NodeId, RankCode};

use crate::error::StorageError;
use crate::traits::TreeStore;
use crate::validate::validate_links;

/// SQLite-backed implementation of [`TreeStore`].
pub struct SqliteStore {
    conn: Connection,
    in_tx: bool,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn, in_tx: false })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn, in_tx: false })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Opens the write transaction if one is not already open. Reads on the
    /// same connection observe the buffered state.
    fn begin(&mut self) -> Result<(), StorageError> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn read_links(&self, sql: &str, id: NodeId) -> Result<Vec<Link>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![id.0], |row| {
            let parent: i64 = row.get(0)?;
            let child: i64 = row.get(1)?;
            let rank: i64 = row.get(2)?;
            Ok(Link::new(NodeId(parent), NodeId(child), RankCode(rank)))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Number of incoming links of a node.
    fn incoming_count(&self, node: NodeId) -> Result<i64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tree WHERE child = ?1",
            params![node.0],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn link_exists(&self, link: &Link) -> Result<bool, StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tree WHERE parent = ?1 AND child = ?2 AND rank = ?3)",
            params![link.parent.0, link.child.0, link.rank.0],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl TreeStore for SqliteStore {
    // -------------------------------------------------------------------
    // Node and rank lookups
    // -------------------------------------------------------------------

    fn node_names(&self) -> Result<HashMap<NodeId, String>, StorageError> {
        let mut stmt = self.conn.prepare_cached("SELECT id, name FROM nodes")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            Ok((NodeId(id), name))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (id, name) = row?;
            map.insert(id, name);
        }
        Ok(map)
    }

    fn node_ids(&self) -> Result<HashMap<String, NodeId>, StorageError> {
        let mut stmt = self.conn.prepare_cached("SELECT name, id FROM nodes")?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let id: i64 = row.get(1)?;
            Ok((name, NodeId(id)))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (name, id) = row?;
            map.insert(name, id);
        }
        Ok(map)
    }

    fn node_id(&self, name: &str) -> Result<Option<NodeId>, StorageError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM nodes WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(NodeId))
    }

    fn rank_names(&self) -> Result<HashMap<RankCode, String>, StorageError> {
        let mut stmt = self.conn.prepare_cached("SELECT code, name FROM ranks")?;
        let rows = stmt.query_map([], |row| {
            let code: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            Ok((RankCode(code), name))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (code, name) = row?;
            map.insert(code, name);
        }
        Ok(map)
    }

    fn rank_codes(&self) -> Result<HashMap<String, RankCode>, StorageError> {
        let names = self.rank_names()?;
        Ok(names.into_iter().map(|(code, name)| (name, code)).collect())
    }

    fn max_native_id(&self) -> Result<i64, StorageError> {
        let max: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM nodes", [], |row| {
                row.get(0)
            })?;
        Ok(max)
    }

    // -------------------------------------------------------------------
    // Link queries
    // -------------------------------------------------------------------

    fn all_links(&self) -> Result<HashSet<Link>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT parent, child, rank FROM tree")?;
        let rows = stmt.query_map([], |row| {
            let parent: i64 = row.get(0)?;
            let child: i64 = row.get(1)?;
            let rank: i64 = row.get(2)?;
            Ok(Link::new(NodeId(parent), NodeId(child), RankCode(rank)))
        })?;
        let mut links = HashSet::new();
        for row in rows {
            links.insert(row?);
        }
        Ok(links)
    }

    fn get_links(
        &self,
        nodes: &HashSet<NodeId>,
        only_parents: bool,
    ) -> Result<HashSet<Link>, StorageError> {
        let mut links = HashSet::new();
        for &node in nodes {
            for link in
                self.read_links("SELECT parent, child, rank FROM tree WHERE child = ?1", node)?
            {
                links.insert(link);
            }
            if !only_parents {
                for link in self
                    .read_links("SELECT parent, child, rank FROM tree WHERE parent = ?1", node)?
                {
                    links.insert(link);
                }
            }
        }
        Ok(links)
    }

    fn get_children(
        &self,
        nodes: &HashSet<NodeId>,
        maxdepth: Option<u32>,
    ) -> Result<HashSet<NodeId>, StorageError> {
        let mut found: HashSet<NodeId> = HashSet::new();
        let mut frontier: Vec<NodeId> = nodes.iter().copied().collect();
        let mut depth = 0u32;
        while !frontier.is_empty() {
            if let Some(limit) = maxdepth {
                if depth >= limit {
                    break;
                }
            }
            depth += 1;
            let mut next = Vec::new();
            let mut stmt = self
                .conn
                .prepare_cached("SELECT child FROM tree WHERE parent = ?1 AND child != parent")?;
            for node in frontier {
                let rows = stmt.query_map(params![node.0], |row| {
                    let child: i64 = row.get(0)?;
                    Ok(NodeId(child))
                })?;
                for row in rows {
                    let child = row?;
                    if !nodes.contains(&child) && found.insert(child) {
                        next.push(child);
                    }
                }
            }
            frontier = next;
        }
        Ok(found)
    }

    fn get_parents(
        &self,
        nodes: &HashSet<NodeId>,
        find_all: bool,
    ) -> Result<HashSet<NodeId>, StorageError> {
        let mut found: HashSet<NodeId> = HashSet::new();
        let mut frontier: Vec<NodeId> = nodes.iter().copied().collect();
        loop {
            let mut next = Vec::new();
            let mut stmt = self
                .conn
                .prepare_cached("SELECT parent FROM tree WHERE child = ?1 AND child != parent")?;
            for node in frontier {
                let rows = stmt.query_map(params![node.0], |row| {
                    let parent: i64 = row.get(0)?;
                    Ok(NodeId(parent))
                })?;
                for row in rows {
                    let parent = row?;
                    if found.insert(parent) {
                        next.push(parent);
                    }
                }
            }
            if !find_all || next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(found)
    }

    fn get_parent(&self, node: NodeId) -> Result<Option<Link>, StorageError> {
        let link = self
            .conn
            .query_row(
                "SELECT parent, child, rank FROM tree WHERE child = ?1",
                params![node.0],
                |row| {
                    let parent: i64 = row.get(0)?;
                    let child: i64 = row.get(1)?;
                    let rank: i64 = row.get(2)?;
                    Ok(Link::new(NodeId(parent), NodeId(child), RankCode(rank)))
                },
            )
            .optional()?;
        Ok(link)
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    fn add_node(
        &mut self,
        name: &str,
        forced_id: Option<NodeId>,
    ) -> Result<NodeId, StorageError> {
        if let Some(existing) = self.node_id(name)? {
            return Ok(existing);
        }
        let id = match forced_id {
            Some(id) => id,
            None => NodeId(self.max_native_id()? + 1),
        };
        let taken: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM nodes WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StorageError::DuplicateNodeId { id });
        }
        self.begin()?;
        self.conn.execute(
            "INSERT INTO nodes (id, name) VALUES (?1, ?2)",
            params![id.0, name],
        )?;
        Ok(id)
    }

    fn add_rank(&mut self, name: &str) -> Result<RankCode, StorageError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT code FROM ranks WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(code) = existing {
            return Ok(RankCode(code));
        }
        self.begin()?;
        let code: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(code), -1) + 1 FROM ranks", [], |row| {
                row.get(0)
            })?;
        self.conn.execute(
            "INSERT INTO ranks (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(RankCode(code))
    }

    fn add_links(
        &mut self,
        links: &BTreeSet<Link>,
    ) -> Result<(Vec<Link>, Vec<NodeId>), StorageError> {
        self.begin()?;
        let mut inserted_links = Vec::new();
        let mut inserted_nodes = Vec::new();
        for link in links {
            if self.link_exists(link)? {
                continue;
            }
            let had_parent = self.incoming_count(link.child)? > 0;
            self.conn.execute(
                "INSERT INTO tree (parent, child, rank) VALUES (?1, ?2, ?3)",
                params![link.parent.0, link.child.0, link.rank.0],
            )?;
            // Single-parent invariant, enforced immediately after insertion.
            if had_parent {
                return Err(StorageError::MultipleParents { child: link.child });
            }
            inserted_links.push(*link);
            inserted_nodes.push(link.child);
        }
        Ok((inserted_links, inserted_nodes))
    }

    fn delete_links(&mut self, links: &HashSet<Link>) -> Result<usize, StorageError> {
        self.begin()?;
        let mut removed = 0;
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM tree WHERE parent = ?1 AND child = ?2 AND rank = ?3")?;
        for link in links {
            removed += stmt.execute(params![link.parent.0, link.child.0, link.rank.0])?;
        }
        Ok(removed)
    }

    fn delete_nodes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError> {
        self.begin()?;
        let mut removed = 0;
        let mut stmt = self.conn.prepare_cached("DELETE FROM nodes WHERE id = ?1")?;
        for node in nodes {
            removed += stmt.execute(params![node.0])?;
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------
    // Genome annotations
    // -------------------------------------------------------------------

    fn delete_genomes(&mut self, nodes: &HashSet<NodeId>) -> Result<usize, StorageError> {
        self.begin()?;
        let mut removed = 0;
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM genomes WHERE id = ?1")?;
        for node in nodes {
            removed += stmt.execute(params![node.0])?;
        }
        Ok(removed)
    }

    fn update_genome(&mut self, genome: &str, node: NodeId) -> Result<bool, StorageError> {
        self.begin()?;
        let updated = self.conn.execute(
            "UPDATE genomes SET id = ?2 WHERE genome = ?1",
            params![genome, node.0],
        )?;
        if updated > 0 {
            return Ok(true);
        }
        self.conn.execute(
            "INSERT INTO genomes (genome, id) VALUES (?1, ?2)",
            params![genome, node.0],
        )?;
        Ok(false)
    }

    fn get_genomes(&self) -> Result<HashMap<String, NodeId>, StorageError> {
        let mut stmt = self.conn.prepare_cached("SELECT genome, id FROM genomes")?;
        let rows = stmt.query_map([], |row| {
            let genome: String = row.get(0)?;
            let id: i64 = row.get(1)?;
            Ok((genome, NodeId(id)))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (genome, id) = row?;
            map.insert(genome, id);
        }
        Ok(map)
    }

    // -------------------------------------------------------------------
    // Integrity and transaction boundary
    // -------------------------------------------------------------------

    fn validate_tree(&self) -> Result<(), StorageError> {
        validate_links(&self.all_links()?)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if self.in_tx {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<(), StorageError> {
        // VACUUM cannot run inside a transaction.
        self.commit()?;
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }
}
