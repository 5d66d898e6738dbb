//! Hierarchical, versioned node store interface.
//!
//! Everything in the feed layer is persisted as named, typed nodes with
//! properties. The [`NodeStore`] trait is the narrow surface the feed layer
//! consumes; [`crate::db::Database`] is the SQLite-backed implementation.
//!
//! # Versioning
//!
//! A node can be made versionable. Versionable nodes are either checked out
//! (writable) or checked in. Structural changes (adding or removing a child)
//! below a checked-in versionable node are refused with
//! [`StoreError::CheckedIn`]; use [`version::Writable`] to bring the nearest
//! version root into a writable state first.

pub mod codec;
pub mod version;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identity of a node in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// The well-known id of the root node.
    pub const ROOT: NodeId = NodeId(Uuid::nil());

    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Structural metadata of a stored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub node_type: String,
    pub created_at: DateTime<Utc>,
}

/// A property value as the store persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    /// Single reference to a node anywhere in the tree.
    Reference(NodeId),
    /// Multi-valued reference property with set semantics.
    References(Vec<NodeId>),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Long(_) => "long",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::Reference(_) => "reference",
            Self::References(_) => "references",
        }
    }
}

/// One recorded check-in of a versionable node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub node_id: NodeId,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// Errors raised by node store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("the root node cannot be removed")]
    RootRemoval,

    #[error("node {0} is not versionable")]
    NotVersionable(NodeId),

    /// A structural change was attempted below a checked-in version root.
    #[error("node {0} is checked in and must be checked out before structural changes")]
    CheckedIn(NodeId),

    #[error("node {0} is locked")]
    Locked(NodeId),

    #[error("property {property} on node {node} is not a {expected}, found {found}")]
    TypeMismatch {
        node: NodeId,
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The narrow node store surface the feed layer is built on.
///
/// Implementations are cheap handles (`Clone`) onto shared storage.
pub trait NodeStore: Clone + Send + Sync + 'static {
    /// The root node; always present.
    fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn node(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>, StoreError>;

    /// First child named `name`, in insertion order.
    fn get_child(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, StoreError>;

    /// All same-name children of `parent`, in insertion order.
    fn children(&self, parent: NodeId, name: &str) -> Result<Vec<NodeId>, StoreError>;

    /// Every child of `parent` regardless of name, in insertion order.
    fn list_children(&self, parent: NodeId) -> Result<Vec<Node>, StoreError>;

    fn add_child(&self, parent: NodeId, name: &str, node_type: &str)
        -> Result<NodeId, StoreError>;

    /// Remove a node and its whole subtree.
    fn remove_node(&self, id: NodeId) -> Result<(), StoreError>;

    fn get_property(&self, node: NodeId, name: &str)
        -> Result<Option<PropertyValue>, StoreError>;

    fn set_property(&self, node: NodeId, name: &str, value: PropertyValue)
        -> Result<(), StoreError>;

    /// Returns whether the property existed.
    fn remove_property(&self, node: NodeId, name: &str) -> Result<bool, StoreError>;

    /// Put a node under version control. It starts out checked out.
    fn make_versionable(&self, node: NodeId) -> Result<(), StoreError>;

    fn is_versionable(&self, node: NodeId) -> Result<bool, StoreError>;

    fn is_checked_out(&self, node: NodeId) -> Result<bool, StoreError>;

    fn checkout(&self, node: NodeId) -> Result<(), StoreError>;

    /// Check a node in, recording a new version. Returns the version number.
    fn checkin(&self, node: NodeId) -> Result<u32, StoreError>;

    fn versions(&self, node: NodeId) -> Result<Vec<VersionInfo>, StoreError>;

    fn lock(&self, node: NodeId) -> Result<(), StoreError>;

    fn unlock(&self, node: NodeId) -> Result<(), StoreError>;

    /// Run `f` so that either all of its writes persist or none do.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StoreError>;

    /// Node ids held by a multi-valued reference property.
    fn get_set_property(&self, node: NodeId, name: &str) -> Result<Vec<NodeId>, StoreError> {
        match self.get_property(node, name)? {
            None => Ok(Vec::new()),
            Some(PropertyValue::References(ids)) => Ok(ids),
            Some(PropertyValue::Reference(id)) => Ok(vec![id]),
            Some(other) => Err(StoreError::TypeMismatch {
                node,
                property: name.to_string(),
                expected: "references",
                found: other.kind(),
            }),
        }
    }

    /// Returns `false` if `target` was already a member.
    fn add_to_set(&self, node: NodeId, name: &str, target: NodeId) -> Result<bool, StoreError> {
        let mut ids = self.get_set_property(node, name)?;
        if ids.contains(&target) {
            return Ok(false);
        }
        ids.push(target);
        self.set_property(node, name, PropertyValue::References(ids))?;
        Ok(true)
    }

    /// Returns `false` if `target` was not a member.
    fn remove_from_set(&self, node: NodeId, name: &str, target: NodeId) -> Result<bool, StoreError> {
        let mut ids = self.get_set_property(node, name)?;
        let before = ids.len();
        ids.retain(|id| *id != target);
        if ids.len() == before {
            return Ok(false);
        }
        self.set_property(node, name, PropertyValue::References(ids))?;
        Ok(true)
    }

    /// Like [`NodeStore::get_set_property`], but drops references whose
    /// target node no longer exists.
    fn get_reference_set_property(
        &self,
        node: NodeId,
        name: &str,
    ) -> Result<Vec<NodeId>, StoreError> {
        let mut resolved = Vec::new();
        for id in self.get_set_property(node, name)? {
            if self.node(id)?.is_some() {
                resolved.push(id);
            }
        }
        Ok(resolved)
    }
}
