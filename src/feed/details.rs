use super::names;
use super::{Feed, FeedError};
use crate::models::{FeedDetailsView, FeedSummary, FeedTemplate};
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Facade over a feed's details node.
///
/// The details node owns the feed's endpoints and precondition and holds its
/// dependency edges and SLA references. Operations are grouped by concern:
/// dependency edges, SLA references, endpoints and the precondition each live
/// in their own module.
#[derive(Clone)]
pub struct FeedDetails<S: NodeStore> {
    pub(super) store: S,
    pub(super) node: NodeId,
}

impl<S: NodeStore> FeedDetails<S> {
    pub(crate) fn new(store: S, node: NodeId) -> Self {
        Self { store, node }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    /// The feed owning this details node (details → summary → feed).
    pub fn parent_feed(&self) -> Result<Feed<S>, FeedError> {
        let feed = self
            .store
            .parent(self.node)?
            .map(|summary| self.store.parent(summary))
            .transpose()?
            .flatten()
            .ok_or_else(|| FeedError::Incomplete {
                feed: self.node.to_string(),
                child: names::SUMMARY,
            })?;
        Ok(Feed::new(self.store.clone(), feed))
    }

    pub(super) fn summary_node(&self) -> Result<NodeId, FeedError> {
        self.store
            .parent(self.node)?
            .ok_or_else(|| FeedError::Incomplete {
                feed: self.node.to_string(),
                child: names::SUMMARY,
            })
    }

    /// Owning feed's system name, or this node's id if it cannot be read.
    pub(super) fn label(&self) -> String {
        self.parent_feed()
            .map(|feed| feed.label())
            .unwrap_or_else(|_| self.node.to_string())
    }

    /// Wrap a store failure as a persistence error naming the owning feed.
    pub(super) fn fail(&self, operation: &'static str) -> impl Fn(StoreError) -> FeedError + '_ {
        move |source| FeedError::Persistence {
            feed: self.label(),
            operation,
            source,
        }
    }

    pub fn summary(&self) -> Result<FeedSummary, FeedError> {
        self.parent_feed()?.to_summary()
    }

    pub fn get_json(&self) -> Result<Option<String>, FeedError> {
        codec::get_string(&self.store, self.node, names::FEED_JSON).map_err(self.fail("read feed json"))
    }

    pub fn set_json(&self, json: Option<&str>) -> Result<(), FeedError> {
        codec::set_string(&self.store, self.node, names::FEED_JSON, json)
            .map_err(self.fail("write feed json"))
    }

    pub fn get_process_group_id(&self) -> Result<Option<String>, FeedError> {
        codec::get_string(&self.store, self.node, names::PROCESS_GROUP_ID)
            .map_err(self.fail("read process group id"))
    }

    pub fn set_process_group_id(&self, id: Option<&str>) -> Result<(), FeedError> {
        codec::set_string(&self.store, self.node, names::PROCESS_GROUP_ID, id)
            .map_err(self.fail("write process group id"))
    }

    pub fn get_template(&self) -> Result<Option<FeedTemplate>, FeedError> {
        let fail = self.fail("read template");
        let Some(id) = codec::get_reference(&self.store, self.node, names::TEMPLATE).map_err(&fail)?
        else {
            return Ok(None);
        };
        let name = codec::get_string(&self.store, id, names::NAME).map_err(&fail)?;
        Ok(Some(FeedTemplate {
            id,
            name: name.unwrap_or_default(),
        }))
    }

    /// `None` clears the template reference.
    pub fn set_template(&self, template: Option<&FeedTemplate>) -> Result<(), FeedError> {
        codec::set_reference(&self.store, self.node, names::TEMPLATE, template.map(|t| t.id))
            .map_err(self.fail("write template"))
    }

    /// Everything this details node holds, resolved.
    pub fn to_view(&self) -> Result<FeedDetailsView, FeedError> {
        let sources = self
            .get_sources()?
            .iter()
            .map(|s| s.to_summary())
            .collect::<Result<Vec<_>, _>>()
            .map_err(self.fail("read feed sources"))?;
        let destinations = self
            .get_destinations()?
            .iter()
            .map(|d| d.to_summary())
            .collect::<Result<Vec<_>, _>>()
            .map_err(self.fail("read feed destinations"))?;
        let dependent_feeds = self
            .get_dependent_feeds()?
            .iter()
            .map(Feed::to_summary)
            .collect::<Result<Vec<_>, _>>()?;
        let used_by_feeds = self
            .get_used_by_feeds()?
            .iter()
            .map(Feed::to_summary)
            .collect::<Result<Vec<_>, _>>()?;
        let precondition = match self.get_precondition()? {
            Some(p) => Some(p.to_summary().map_err(self.fail("read precondition"))?),
            None => None,
        };

        Ok(FeedDetailsView {
            feed: self.summary()?,
            json: self.get_json()?,
            process_group_id: self.get_process_group_id()?,
            template: self.get_template()?,
            sources,
            destinations,
            dependent_feeds,
            used_by_feeds,
            slas: self.get_service_level_agreements()?,
            precondition,
        })
    }
}
