use super::names;
use crate::models::{DatasourceSummary, EndpointKind};
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Handle on a datasource node.
///
/// A datasource tracks the feed endpoints bound to it in two reference sets,
/// one per endpoint kind. Feed details keep these in step when endpoints are
/// created or removed.
#[derive(Clone)]
pub struct Datasource<S: NodeStore> {
    store: S,
    node: NodeId,
}

fn endpoint_set(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Source => names::FEED_SOURCES,
        EndpointKind::Destination => names::FEED_DESTINATIONS,
    }
}

impl<S: NodeStore> Datasource<S> {
    pub(crate) fn new(store: S, node: NodeId) -> Self {
        Self { store, node }
    }

    /// Wrap `node` if it exists and is a datasource.
    pub fn load(store: S, node: NodeId) -> Result<Option<Self>, StoreError> {
        match store.node(node)? {
            Some(n) if n.node_type == names::DATASOURCE_TYPE => Ok(Some(Self::new(store, node))),
            _ => Ok(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> Result<String, StoreError> {
        Ok(codec::get_string(&self.store, self.node, names::NAME)?.unwrap_or_default())
    }

    /// Endpoints of `kind` currently bound to this datasource.
    pub fn endpoints(&self, kind: EndpointKind) -> Result<Vec<NodeId>, StoreError> {
        codec::get_references(&self.store, self.node, endpoint_set(kind))
    }

    /// Record that `endpoint` is bound to this datasource.
    pub fn bind_endpoint(&self, kind: EndpointKind, endpoint: NodeId) -> Result<bool, StoreError> {
        self.store.add_to_set(self.node, endpoint_set(kind), endpoint)
    }

    /// Forget `endpoint`. The endpoint node itself is left alone.
    pub fn release_endpoint(
        &self,
        kind: EndpointKind,
        endpoint: NodeId,
    ) -> Result<bool, StoreError> {
        self.store.remove_from_set(self.node, endpoint_set(kind), endpoint)
    }

    pub fn to_summary(&self) -> Result<DatasourceSummary, StoreError> {
        Ok(DatasourceSummary {
            id: self.node,
            name: self.name()?,
            feed_sources: self.endpoints(EndpointKind::Source)?,
            feed_destinations: self.endpoints(EndpointKind::Destination)?,
        })
    }
}
