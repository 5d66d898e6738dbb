mod schema;

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::store::{Node, NodeId, NodeStore, PropertyValue, StoreError, VersionInfo};

const SAVEPOINT: &str = "node_store_atomic";

/// SQLite-backed [`NodeStore`].
///
/// Cloning is cheap; clones share one connection. Every operation holds the
/// writer lock, and [`NodeStore::atomically`] holds it for the whole closure,
/// so no other thread's statements can land inside an open savepoint.
#[derive(Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    writer: Arc<ReentrantMutex<()>>,
}

/// Connection access for one statement batch. The writer lock is reentrant,
/// so a thread inside `atomically` can keep issuing statements.
struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
    _writer: ReentrantMutexGuard<'a, ()>,
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            writer: Arc::new(ReentrantMutex::new(())),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            writer: Arc::new(ReentrantMutex::new(())),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> Session<'_> {
        let writer = self.writer.lock();
        Session {
            conn: self.conn.lock().expect("database lock poisoned"),
            _writer: writer,
        }
    }
}

/// Default database location in the per-user data directory.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "feedstore")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("feedstore.db"))
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            writer: self.writer.clone(),
        }
    }
}

// ============================================================
// Connection-level helpers (caller holds the lock)
// ============================================================

struct VersionState {
    checked_out: bool,
    locked: bool,
    base_version: u32,
}

fn node_exists(conn: &Connection, id: NodeId) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM nodes WHERE id = ?",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn require_node(conn: &Connection, id: NodeId) -> Result<(), StoreError> {
    if node_exists(conn, id)? {
        Ok(())
    } else {
        Err(StoreError::NodeNotFound(id))
    }
}

fn parent_of(conn: &Connection, id: NodeId) -> Result<Option<NodeId>, StoreError> {
    let parent: Option<Option<String>> = conn
        .query_row(
            "SELECT parent_id FROM nodes WHERE id = ?",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match parent {
        None => Err(StoreError::NodeNotFound(id)),
        Some(parent) => Ok(parent.map(parse_id)),
    }
}

fn version_state(conn: &Connection, id: NodeId) -> Result<Option<VersionState>, StoreError> {
    let state = conn
        .query_row(
            "SELECT checked_out, locked, base_version FROM version_control WHERE node_id = ?",
            [id.to_string()],
            |row| {
                Ok(VersionState {
                    checked_out: row.get::<_, i64>(0)? != 0,
                    locked: row.get::<_, i64>(1)? != 0,
                    base_version: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(state)
}

/// Version state of an existing versionable node, or the reason there is none.
fn require_version_state(conn: &Connection, id: NodeId) -> Result<VersionState, StoreError> {
    match version_state(conn, id)? {
        Some(state) => Ok(state),
        None => {
            require_node(conn, id)?;
            Err(StoreError::NotVersionable(id))
        }
    }
}

/// Nearest versionable node at or above `id`, with its state.
fn version_root(
    conn: &Connection,
    id: NodeId,
) -> Result<Option<(NodeId, VersionState)>, StoreError> {
    let mut current = Some(id);
    while let Some(node) = current {
        if let Some(state) = version_state(conn, node)? {
            return Ok(Some((node, state)));
        }
        current = parent_of(conn, node)?;
    }
    Ok(None)
}

/// Refuse structural changes below a checked-in version root.
fn require_writable(conn: &Connection, parent: NodeId) -> Result<(), StoreError> {
    match version_root(conn, parent)? {
        Some((root, state)) if !state.checked_out => Err(StoreError::CheckedIn(root)),
        _ => Ok(()),
    }
}

#[derive(Serialize)]
struct SnapshotNode {
    id: String,
    parent_id: Option<String>,
    name: String,
    node_type: String,
    properties: BTreeMap<String, serde_json::Value>,
}

/// Serialize a subtree with all of its properties.
fn snapshot(conn: &Connection, id: NodeId) -> Result<String, StoreError> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id) AS (
             SELECT ?1
             UNION ALL
             SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
         )
         SELECT n.id, n.parent_id, n.name, n.node_type, p.name, p.value
         FROM subtree s
         JOIN nodes n ON n.id = s.id
         LEFT JOIN properties p ON p.node_id = n.id
         ORDER BY n.position, n.id, p.name",
    )?;

    let rows = stmt
        .query_map([id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut nodes: BTreeMap<String, SnapshotNode> = BTreeMap::new();
    for (node_id, parent_id, name, node_type, prop_name, prop_value) in rows {
        let entry = nodes.entry(node_id.clone()).or_insert_with(|| SnapshotNode {
            id: node_id,
            parent_id,
            name,
            node_type,
            properties: BTreeMap::new(),
        });
        if let (Some(prop_name), Some(prop_value)) = (prop_name, prop_value) {
            entry
                .properties
                .insert(prop_name, serde_json::from_str(&prop_value)?);
        }
    }

    let nodes: Vec<SnapshotNode> = nodes.into_values().collect();
    Ok(serde_json::to_string(&nodes)?)
}

// ============================================================
// NodeStore
// ============================================================

impl NodeStore for Database {
    fn node(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let conn = self.conn();
        let node = conn
            .query_row(
                "SELECT id, parent_id, name, node_type, created_at FROM nodes WHERE id = ?",
                [id.to_string()],
                |row| {
                    Ok(Node {
                        id: parse_id(row.get::<_, String>(0)?),
                        parent_id: row.get::<_, Option<String>>(1)?.map(parse_id),
                        name: row.get(2)?,
                        node_type: row.get(3)?,
                        created_at: parse_datetime(row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;
        Ok(node)
    }

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>, StoreError> {
        let conn = self.conn();
        parent_of(&conn, id)
    }

    fn get_child(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StoreError> {
        let conn = self.conn();
        let child = conn
            .query_row(
                "SELECT id FROM nodes WHERE parent_id = ? AND name = ? ORDER BY position LIMIT 1",
                (parent.to_string(), name),
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(child.map(parse_id))
    }

    fn children(&self, parent: NodeId, name: &str) -> Result<Vec<NodeId>, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM nodes WHERE parent_id = ? AND name = ? ORDER BY position")?;
        let children = stmt
            .query_map((parent.to_string(), name), |row| {
                Ok(parse_id(row.get::<_, String>(0)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(children)
    }

    fn list_children(&self, parent: NodeId) -> Result<Vec<Node>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, name, node_type, created_at FROM nodes
             WHERE parent_id = ? ORDER BY position",
        )?;
        let children = stmt
            .query_map([parent.to_string()], |row| {
                Ok(Node {
                    id: parse_id(row.get::<_, String>(0)?),
                    parent_id: row.get::<_, Option<String>>(1)?.map(parse_id),
                    name: row.get(2)?,
                    node_type: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(children)
    }

    fn add_child(
        &self,
        parent: NodeId,
        name: &str,
        node_type: &str,
    ) -> Result<NodeId, StoreError> {
        let conn = self.conn();
        require_node(&conn, parent)?;
        require_writable(&conn, parent)?;

        let id = NodeId::new();
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM nodes WHERE parent_id = ?",
            [parent.to_string()],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO nodes (id, parent_id, name, node_type, position, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                parent.to_string(),
                name,
                node_type,
                position,
                Utc::now().to_rfc3339(),
            ),
        )?;

        Ok(id)
    }

    fn remove_node(&self, id: NodeId) -> Result<(), StoreError> {
        let conn = self.conn();
        let parent = parent_of(&conn, id)?.ok_or(StoreError::RootRemoval)?;
        require_writable(&conn, parent)?;

        // Subtree, properties and version state go with it via ON DELETE CASCADE.
        conn.execute("DELETE FROM nodes WHERE id = ?", [id.to_string()])?;
        Ok(())
    }

    fn get_property(
        &self,
        node: NodeId,
        name: &str,
    ) -> Result<Option<PropertyValue>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                "SELECT value FROM properties WHERE node_id = ? AND name = ?",
                (node.to_string(), name),
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_property(
        &self,
        node: NodeId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        require_node(&conn, node)?;
        let json = serde_json::to_string(&value)?;
        conn.execute(
            "INSERT INTO properties (node_id, name, value) VALUES (?, ?, ?)
             ON CONFLICT(node_id, name) DO UPDATE SET value = excluded.value",
            (node.to_string(), name, json),
        )?;
        Ok(())
    }

    fn remove_property(&self, node: NodeId, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        let rows = conn.execute(
            "DELETE FROM properties WHERE node_id = ? AND name = ?",
            (node.to_string(), name),
        )?;
        Ok(rows > 0)
    }

    fn make_versionable(&self, node: NodeId) -> Result<(), StoreError> {
        let conn = self.conn();
        require_node(&conn, node)?;
        conn.execute(
            "INSERT OR IGNORE INTO version_control (node_id, checked_out, locked, base_version)
             VALUES (?, 1, 0, 0)",
            [node.to_string()],
        )?;
        Ok(())
    }

    fn is_versionable(&self, node: NodeId) -> Result<bool, StoreError> {
        let conn = self.conn();
        Ok(version_state(&conn, node)?.is_some())
    }

    /// Checked-out state of the nearest version root. Nodes outside version
    /// control are always writable.
    fn is_checked_out(&self, node: NodeId) -> Result<bool, StoreError> {
        let conn = self.conn();
        require_node(&conn, node)?;
        Ok(version_root(&conn, node)?.map_or(true, |(_, state)| state.checked_out))
    }

    fn checkout(&self, node: NodeId) -> Result<(), StoreError> {
        let conn = self.conn();
        let state = require_version_state(&conn, node)?;
        if state.locked {
            return Err(StoreError::Locked(node));
        }
        if !state.checked_out {
            conn.execute(
                "UPDATE version_control SET checked_out = 1 WHERE node_id = ?",
                [node.to_string()],
            )?;
        }
        Ok(())
    }

    fn checkin(&self, node: NodeId) -> Result<u32, StoreError> {
        let conn = self.conn();
        let state = require_version_state(&conn, node)?;
        if state.locked {
            return Err(StoreError::Locked(node));
        }
        if !state.checked_out {
            return Ok(state.base_version);
        }

        let version = state.base_version + 1;
        let snapshot = snapshot(&conn, node)?;
        conn.execute(
            "INSERT INTO node_versions (node_id, version, snapshot, created_at) VALUES (?, ?, ?, ?)",
            (node.to_string(), version, snapshot, Utc::now().to_rfc3339()),
        )?;
        conn.execute(
            "UPDATE version_control SET checked_out = 0, base_version = ? WHERE node_id = ?",
            (version, node.to_string()),
        )?;
        Ok(version)
    }

    fn versions(&self, node: NodeId) -> Result<Vec<VersionInfo>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT version, created_at FROM node_versions WHERE node_id = ? ORDER BY version",
        )?;
        let versions = stmt
            .query_map([node.to_string()], |row| {
                Ok(VersionInfo {
                    node_id: node,
                    version: row.get(0)?,
                    created_at: parse_datetime(row.get::<_, String>(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn lock(&self, node: NodeId) -> Result<(), StoreError> {
        let conn = self.conn();
        require_version_state(&conn, node)?;
        conn.execute(
            "UPDATE version_control SET locked = 1 WHERE node_id = ?",
            [node.to_string()],
        )?;
        Ok(())
    }

    fn unlock(&self, node: NodeId) -> Result<(), StoreError> {
        let conn = self.conn();
        require_version_state(&conn, node)?;
        conn.execute(
            "UPDATE version_control SET locked = 0 WHERE node_id = ?",
            [node.to_string()],
        )?;
        Ok(())
    }

    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>,
    {
        // Held until the savepoint is released or rolled back.
        let _writer = self.writer.lock();

        self.conn()
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))
            .map_err(StoreError::from)?;

        match f() {
            Ok(value) => {
                self.conn()
                    .execute_batch(&format!("RELEASE {SAVEPOINT}"))
                    .map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                let rollback = self
                    .conn()
                    .execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"));
                if let Err(rollback) = rollback {
                    tracing::error!(error = %rollback, "failed to roll back savepoint");
                }
                Err(e)
            }
        }
    }
}

fn parse_id(s: String) -> NodeId {
    Uuid::parse_str(&s)
        .map(NodeId::from)
        .unwrap_or(NodeId::ROOT)
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("feeds.db");

        let node = {
            let db = Database::open(path.clone()).unwrap();
            db.migrate().unwrap();
            let node = db.add_child(db.root(), "kept", "nt:unstructured").unwrap();
            db.set_property(node, "count", PropertyValue::Long(2)).unwrap();
            node
        };

        let db = Database::open(path).unwrap();
        db.migrate().unwrap();
        assert_eq!(db.get_child(db.root(), "kept").unwrap(), Some(node));
        assert_eq!(db.get_property(node, "count").unwrap(), Some(PropertyValue::Long(2)));
    }

    #[test]
    fn test_checkin_snapshots_the_subtree() {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let root = db.add_child(db.root(), "doc", "nt:unstructured").unwrap();
        db.make_versionable(root).unwrap();
        let leaf = db.add_child(root, "leaf", "nt:unstructured").unwrap();
        db.set_property(leaf, "title", PropertyValue::String("hello".into())).unwrap();
        db.checkin(root).unwrap();

        let snapshot: String = db
            .conn()
            .query_row(
                "SELECT snapshot FROM node_versions WHERE node_id = ? AND version = 1",
                [root.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(snapshot.contains(&leaf.to_string()));
        assert!(snapshot.contains("hello"));
    }
}
