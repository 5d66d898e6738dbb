use super::names;
use super::slas::load_shared_sla;
use super::{Datasource, Feed, FeedError};
use crate::models::{FeedTemplate, ServiceLevelAgreement};
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Creates and finds feeds and the shared objects they point at.
#[derive(Clone)]
pub struct FeedProvider<S: NodeStore> {
    store: S,
}

impl<S: NodeStore> FeedProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Top-level folder `name`, created on first use.
    fn folder(&self, name: &str) -> Result<NodeId, StoreError> {
        let root = self.store.root();
        match self.store.get_child(root, name)? {
            Some(folder) => Ok(folder),
            None => self.store.add_child(root, name, names::FOLDER_TYPE),
        }
    }

    /// Children of a top-level folder having `node_type`.
    fn folder_items(&self, folder: &str, node_type: &str) -> Result<Vec<NodeId>, StoreError> {
        let Some(folder) = self.store.get_child(self.store.root(), folder)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .list_children(folder)?
            .into_iter()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.id)
            .collect())
    }

    // ============================================================
    // Feeds
    // ============================================================

    /// Create a feed with empty details. The new feed is checked in.
    pub fn create_feed(&self, category: &str, system_name: &str) -> Result<Feed<S>, FeedError> {
        self.store.atomically(|| {
            let feeds = self.folder(names::FEEDS_FOLDER)?;
            let category_node = match self.store.get_child(feeds, category)? {
                Some(node) => node,
                None => self.store.add_child(feeds, category, names::CATEGORY_TYPE)?,
            };
            if self.store.get_child(category_node, system_name)?.is_some() {
                return Err(FeedError::DuplicateFeed {
                    category: category.to_string(),
                    system_name: system_name.to_string(),
                });
            }

            let feed = self
                .store
                .add_child(category_node, system_name, names::FEED_TYPE)?;
            self.store.make_versionable(feed)?;
            let summary = self
                .store
                .add_child(feed, names::SUMMARY, names::SUMMARY_TYPE)?;
            codec::set_string(&self.store, summary, names::SYSTEM_NAME, Some(system_name))?;
            codec::set_string(&self.store, summary, names::CATEGORY, Some(category))?;
            self.store
                .add_child(summary, names::DETAILS, names::DETAILS_TYPE)?;
            self.store.checkin(feed)?;

            tracing::info!(feed = %feed, category, system_name, "created feed");
            Ok(Feed::new(self.store.clone(), feed))
        })
    }

    pub fn find_feed(&self, id: NodeId) -> Result<Option<Feed<S>>, StoreError> {
        Feed::load(self.store.clone(), id)
    }

    /// All feeds across categories.
    pub fn list_feeds(&self) -> Result<Vec<Feed<S>>, StoreError> {
        let mut feeds = Vec::new();
        for category in self.folder_items(names::FEEDS_FOLDER, names::CATEGORY_TYPE)? {
            for node in self.store.list_children(category)? {
                if node.node_type == names::FEED_TYPE {
                    feeds.push(Feed::new(self.store.clone(), node.id));
                }
            }
        }
        Ok(feeds)
    }

    // ============================================================
    // Datasources
    // ============================================================

    pub fn create_datasource(&self, name: &str) -> Result<Datasource<S>, StoreError> {
        self.store.atomically(|| {
            let folder = self.folder(names::DATASOURCES_FOLDER)?;
            let node = self
                .store
                .add_child(folder, name, names::DATASOURCE_TYPE)?;
            codec::set_string(&self.store, node, names::NAME, Some(name))?;
            Ok(Datasource::new(self.store.clone(), node))
        })
    }

    pub fn find_datasource(&self, id: NodeId) -> Result<Option<Datasource<S>>, StoreError> {
        Datasource::load(self.store.clone(), id)
    }

    pub fn list_datasources(&self) -> Result<Vec<Datasource<S>>, StoreError> {
        Ok(self
            .folder_items(names::DATASOURCES_FOLDER, names::DATASOURCE_TYPE)?
            .into_iter()
            .map(|id| Datasource::new(self.store.clone(), id))
            .collect())
    }

    // ============================================================
    // Service level agreements
    // ============================================================

    /// Create a shared SLA. Identical content still yields a new identity.
    pub fn create_sla(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<ServiceLevelAgreement, StoreError> {
        self.store.atomically(|| {
            let folder = self.folder(names::SLAS_FOLDER)?;
            let node = self.store.add_child(folder, name, names::SLA_TYPE)?;
            codec::set_string(&self.store, node, names::NAME, Some(name))?;
            codec::set_string(&self.store, node, names::DESCRIPTION, description)?;
            Ok(ServiceLevelAgreement {
                id: node,
                name: Some(name.to_string()),
                description: description.map(str::to_string),
            })
        })
    }

    /// A shared SLA. Agreements nested under a precondition are not found.
    pub fn find_sla(&self, id: NodeId) -> Result<Option<ServiceLevelAgreement>, StoreError> {
        load_shared_sla(&self.store, id)
    }

    pub fn list_slas(&self) -> Result<Vec<ServiceLevelAgreement>, StoreError> {
        let mut slas = Vec::new();
        for id in self.folder_items(names::SLAS_FOLDER, names::SLA_TYPE)? {
            slas.extend(load_shared_sla(&self.store, id)?);
        }
        Ok(slas)
    }

    // ============================================================
    // Templates
    // ============================================================

    pub fn create_template(&self, name: &str) -> Result<FeedTemplate, StoreError> {
        self.store.atomically(|| {
            let folder = self.folder(names::TEMPLATES_FOLDER)?;
            let node = self
                .store
                .add_child(folder, name, names::TEMPLATE_TYPE)?;
            codec::set_string(&self.store, node, names::NAME, Some(name))?;
            Ok(FeedTemplate {
                id: node,
                name: name.to_string(),
            })
        })
    }

    pub fn find_template(&self, id: NodeId) -> Result<Option<FeedTemplate>, StoreError> {
        match self.store.node(id)? {
            Some(node) if node.node_type == names::TEMPLATE_TYPE => Ok(Some(FeedTemplate {
                id,
                name: codec::get_string(&self.store, id, names::NAME)?.unwrap_or_default(),
            })),
            _ => Ok(None),
        }
    }
}
