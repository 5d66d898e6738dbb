//! Feed metadata on top of a [`NodeStore`].
//!
//! A feed is persisted as a small subtree:
//!
//! ```text
//! /feeds/<category>/<systemName>   tba:feed (versionable)
//!     tba:summary                  tba:feedSummary
//!         tba:details              tba:feedDetails
//!             tba:sources*         tba:feedSource
//!             tba:destinations*    tba:feedDestination
//!             tba:precondition?    tba:feedPrecondition
//!                 tba:sla          tba:sla
//! ```
//!
//! [`FeedDetails`] is the facade over the details node. It keeps the
//! `dependentFeeds`/`usedByFeeds` edge sets of two feeds symmetric, keeps SLA
//! references and endpoint bindings consistent, and routes every structural
//! change through a [`crate::store::version::Writable`] guard.

mod datasource;
mod dependencies;
mod details;
mod endpoints;
mod error;
mod precondition;
mod provider;
mod slas;

pub use datasource::Datasource;
pub use details::FeedDetails;
pub use endpoints::{Endpoint, FeedDestination, FeedSource};
pub use error::FeedError;
pub use precondition::FeedPrecondition;
pub use provider::FeedProvider;

use crate::models::FeedSummary;
use crate::store::{codec, NodeId, NodeStore, StoreError, VersionInfo};

/// Node and property names of the persisted layout.
pub(crate) mod names {
    pub const FOLDER_TYPE: &str = "nt:folder";
    pub const FEEDS_FOLDER: &str = "feeds";
    pub const DATASOURCES_FOLDER: &str = "datasources";
    pub const SLAS_FOLDER: &str = "slas";
    pub const TEMPLATES_FOLDER: &str = "templates";

    pub const CATEGORY_TYPE: &str = "tba:category";
    pub const FEED_TYPE: &str = "tba:feed";
    pub const SUMMARY: &str = "tba:summary";
    pub const SUMMARY_TYPE: &str = "tba:feedSummary";
    pub const DETAILS: &str = "tba:details";
    pub const DETAILS_TYPE: &str = "tba:feedDetails";
    pub const SYSTEM_NAME: &str = "tba:systemName";
    pub const CATEGORY: &str = "tba:category";

    pub const FEED_JSON: &str = "tba:json";
    pub const PROCESS_GROUP_ID: &str = "tba:processGroupId";
    pub const TEMPLATE: &str = "tba:template";
    pub const DEPENDENTS: &str = "tba:dependentFeeds";
    pub const USED_BY_FEEDS: &str = "tba:usedByFeeds";
    pub const SLAS: &str = "tba:slas";

    pub const SOURCES: &str = "tba:sources";
    pub const SOURCE_TYPE: &str = "tba:feedSource";
    pub const DESTINATIONS: &str = "tba:destinations";
    pub const DESTINATION_TYPE: &str = "tba:feedDestination";
    pub const DATASOURCE: &str = "tba:datasource";

    pub const PRECONDITION: &str = "tba:precondition";
    pub const PRECONDITION_TYPE: &str = "tba:feedPrecondition";
    pub const SLA: &str = "tba:sla";
    pub const SLA_TYPE: &str = "tba:sla";
    pub const SLA_REF: &str = "tba:slaRef";

    pub const DATASOURCE_TYPE: &str = "tba:datasource";
    pub const FEED_SOURCES: &str = "tba:feedSources";
    pub const FEED_DESTINATIONS: &str = "tba:feedDestinations";

    pub const TEMPLATE_TYPE: &str = "tba:feedTemplate";
    pub const NAME: &str = "tba:name";
    pub const DESCRIPTION: &str = "tba:description";
}

/// Handle on a feed node.
///
/// Equality is node identity.
#[derive(Clone)]
pub struct Feed<S: NodeStore> {
    store: S,
    node: NodeId,
}

impl<S: NodeStore> PartialEq for Feed<S> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<S: NodeStore> Eq for Feed<S> {}

impl<S: NodeStore> std::fmt::Debug for Feed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed").field("node", &self.node).finish()
    }
}

impl<S: NodeStore> Feed<S> {
    pub(crate) fn new(store: S, node: NodeId) -> Self {
        Self { store, node }
    }

    /// Wrap `node` if it exists and is a feed.
    pub fn load(store: S, node: NodeId) -> Result<Option<Self>, StoreError> {
        match store.node(node)? {
            Some(n) if n.node_type == names::FEED_TYPE => Ok(Some(Self::new(store, node))),
            _ => Ok(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    fn summary_node(&self) -> Result<NodeId, FeedError> {
        self.store
            .get_child(self.node, names::SUMMARY)?
            .ok_or_else(|| FeedError::Incomplete {
                feed: self.node.to_string(),
                child: names::SUMMARY,
            })
    }

    pub fn system_name(&self) -> Result<String, FeedError> {
        let summary = self.summary_node()?;
        Ok(codec::get_string(&self.store, summary, names::SYSTEM_NAME)?.unwrap_or_default())
    }

    pub fn category(&self) -> Result<String, FeedError> {
        let summary = self.summary_node()?;
        Ok(codec::get_string(&self.store, summary, names::CATEGORY)?.unwrap_or_default())
    }

    /// System name for diagnostics, falling back to the node id.
    pub(crate) fn label(&self) -> String {
        match self.system_name() {
            Ok(name) if !name.is_empty() => name,
            _ => self.node.to_string(),
        }
    }

    pub fn details(&self) -> Result<FeedDetails<S>, FeedError> {
        let summary = self.summary_node()?;
        let details = self
            .store
            .get_child(summary, names::DETAILS)?
            .ok_or_else(|| FeedError::Incomplete {
                feed: self.label(),
                child: names::DETAILS,
            })?;
        Ok(FeedDetails::new(self.store.clone(), details))
    }

    /// See [`FeedDetails::add_used_by_feed`]; this alone does not keep the
    /// edge symmetric.
    pub fn add_used_by_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        self.details()?.add_used_by_feed(feed)
    }

    /// See [`FeedDetails::remove_used_by_feed`].
    pub fn remove_used_by_feed(&self, feed: &Feed<S>) -> Result<bool, FeedError> {
        self.details()?.remove_used_by_feed(feed)
    }

    /// Check-in history of the feed.
    pub fn versions(&self) -> Result<Vec<VersionInfo>, StoreError> {
        self.store.versions(self.node)
    }

    pub fn to_summary(&self) -> Result<FeedSummary, FeedError> {
        let node = self
            .store
            .node(self.node)?
            .ok_or(StoreError::NodeNotFound(self.node))?;
        Ok(FeedSummary {
            id: self.node,
            category: self.category()?,
            system_name: self.system_name()?,
            created_at: node.created_at,
        })
    }
}
