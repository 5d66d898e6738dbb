use super::names;
use super::slas::load_sla;
use super::{FeedDetails, FeedError};
use crate::models::{PreconditionSummary, ServiceLevelAgreement};
use crate::store::version::Writable;
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Handle on a feed's precondition subtree.
///
/// The precondition owns one nested SLA node describing the gating
/// condition, and may additionally reference a shared SLA.
#[derive(Clone, Debug)]
pub struct FeedPrecondition<S: NodeStore> {
    store: S,
    node: NodeId,
}

impl<S: NodeStore> FeedPrecondition<S> {
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// The nested SLA node, if one exists.
    pub fn sla_node(&self) -> Result<Option<NodeId>, StoreError> {
        self.store.get_child(self.node, names::SLA)
    }

    pub fn sla_ref(&self) -> Result<Option<NodeId>, StoreError> {
        codec::get_reference(&self.store, self.node, names::SLA_REF)
    }

    pub fn set_sla_ref(&self, sla: Option<&ServiceLevelAgreement>) -> Result<(), StoreError> {
        codec::set_reference(&self.store, self.node, names::SLA_REF, sla.map(|s| s.id))
    }

    /// Write the name and description of the nested SLA.
    pub fn describe(&self, name: &str, description: Option<&str>) -> Result<(), StoreError> {
        let sla = self.sla_node()?.ok_or(StoreError::NodeNotFound(self.node))?;
        codec::set_string(&self.store, sla, names::NAME, Some(name))?;
        codec::set_string(&self.store, sla, names::DESCRIPTION, description)
    }

    /// The nested SLA, resolved.
    pub fn agreement(&self) -> Result<Option<ServiceLevelAgreement>, StoreError> {
        match self.sla_node()? {
            Some(id) => load_sla(&self.store, id),
            None => Ok(None),
        }
    }

    pub fn to_summary(&self) -> Result<PreconditionSummary, StoreError> {
        Ok(PreconditionSummary {
            id: self.node,
            sla_ref: self.sla_ref()?,
            sla: self.agreement()?,
        })
    }
}

impl<S: NodeStore> FeedDetails<S> {
    /// The precondition, or `None` if the feed has none.
    pub fn get_precondition(&self) -> Result<Option<FeedPrecondition<S>>, FeedError> {
        let node = self
            .store
            .get_child(self.node, names::PRECONDITION)
            .map_err(self.fail("read precondition"))?;
        Ok(node.map(|node| FeedPrecondition {
            store: self.store.clone(),
            node,
        }))
    }

    /// Make sure a precondition exists and reset it to an empty nested SLA.
    ///
    /// Any previous SLA reference and nested SLA are discarded, never merged.
    pub fn create_new_precondition(&self) -> Result<FeedPrecondition<S>, FeedError> {
        let feed_id = self.parent_feed()?.id();
        let fail = |source: StoreError| FeedError::Persistence {
            feed: feed_id.to_string(),
            operation: "create precondition",
            source,
        };

        self.store.atomically(|| {
            let _writable = Writable::acquire(&self.store, self.node).map_err(fail)?;
            let node = match self.store.get_child(self.node, names::PRECONDITION).map_err(fail)? {
                Some(node) => node,
                None => self
                    .store
                    .add_child(self.node, names::PRECONDITION, names::PRECONDITION_TYPE)
                    .map_err(fail)?,
            };

            self.store.remove_property(node, names::SLA_REF).map_err(fail)?;
            for old in self.store.children(node, names::SLA).map_err(fail)? {
                self.store.remove_node(old).map_err(fail)?;
            }
            let sla = self
                .store
                .add_child(node, names::SLA, names::SLA_TYPE)
                .map_err(fail)?;

            tracing::debug!(feed = %feed_id, precondition = %node, sla = %sla, "created new precondition");
            Ok(FeedPrecondition {
                store: self.store.clone(),
                node,
            })
        })
    }
}
