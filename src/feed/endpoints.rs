//! Feed sources and destinations.
//!
//! Endpoints are owned children of the details node, each bound to one
//! datasource. Sources and destinations behave identically apart from the
//! child name they are stored under, so both go through [`Endpoint`].

use super::names;
use super::{Datasource, FeedDetails, FeedError};
use crate::models::{EndpointKind, EndpointSummary, RemovalFailure, RemovalReport};
use crate::store::version::Writable;
use crate::store::{codec, NodeId, NodeStore, StoreError};

/// Handle on a feed source or destination node.
#[derive(Clone)]
pub struct Endpoint<S: NodeStore> {
    store: S,
    node: NodeId,
    kind: EndpointKind,
}

pub type FeedSource<S> = Endpoint<S>;
pub type FeedDestination<S> = Endpoint<S>;

fn child_name(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Source => names::SOURCES,
        EndpointKind::Destination => names::DESTINATIONS,
    }
}

fn node_type(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Source => names::SOURCE_TYPE,
        EndpointKind::Destination => names::DESTINATION_TYPE,
    }
}

impl<S: NodeStore> Endpoint<S> {
    fn new(store: S, node: NodeId, kind: EndpointKind) -> Self {
        Self { store, node, kind }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Id of the bound datasource; `None` if it no longer exists.
    pub fn datasource_id(&self) -> Result<Option<NodeId>, StoreError> {
        codec::get_reference(&self.store, self.node, names::DATASOURCE)
    }

    pub fn get_datasource(&self) -> Result<Option<Datasource<S>>, StoreError> {
        match self.datasource_id()? {
            Some(id) => Datasource::load(self.store.clone(), id),
            None => Ok(None),
        }
    }

    pub fn to_summary(&self) -> Result<EndpointSummary, StoreError> {
        Ok(EndpointSummary {
            id: self.node,
            kind: self.kind,
            datasource_id: self.datasource_id()?,
        })
    }
}

impl<S: NodeStore> FeedDetails<S> {
    pub fn get_sources(&self) -> Result<Vec<FeedSource<S>>, FeedError> {
        self.endpoints(EndpointKind::Source)
    }

    pub fn get_destinations(&self) -> Result<Vec<FeedDestination<S>>, FeedError> {
        self.endpoints(EndpointKind::Destination)
    }

    /// First source bound to `datasource_id`, if any.
    pub fn get_source(&self, datasource_id: NodeId) -> Result<Option<FeedSource<S>>, FeedError> {
        self.find_endpoint(EndpointKind::Source, datasource_id)
    }

    /// First destination bound to `datasource_id`, if any.
    pub fn get_destination(
        &self,
        datasource_id: NodeId,
    ) -> Result<Option<FeedDestination<S>>, FeedError> {
        self.find_endpoint(EndpointKind::Destination, datasource_id)
    }

    /// Create a new source bound to `datasource`.
    ///
    /// Always creates; use [`FeedDetails::get_source`] first to avoid
    /// binding the same datasource twice.
    pub fn ensure_feed_source(&self, datasource: &Datasource<S>) -> Result<FeedSource<S>, FeedError> {
        self.ensure_endpoint(EndpointKind::Source, datasource)
    }

    /// Create a new destination bound to `datasource`. Always creates.
    pub fn ensure_feed_destination(
        &self,
        datasource: &Datasource<S>,
    ) -> Result<FeedDestination<S>, FeedError> {
        self.ensure_endpoint(EndpointKind::Destination, datasource)
    }

    pub fn remove_feed_source(&self, source: &FeedSource<S>) -> Result<(), FeedError> {
        self.remove_endpoint(EndpointKind::Source, source)
    }

    pub fn remove_feed_destination(&self, dest: &FeedDestination<S>) -> Result<(), FeedError> {
        self.remove_endpoint(EndpointKind::Destination, dest)
    }

    /// Remove every source, releasing each datasource's back-reference.
    ///
    /// A failing item is logged and reported; the rest are still removed.
    pub fn remove_feed_sources(&self) -> Result<RemovalReport, FeedError> {
        self.remove_endpoints(EndpointKind::Source)
    }

    /// Remove every destination. Same contract as
    /// [`FeedDetails::remove_feed_sources`].
    pub fn remove_feed_destinations(&self) -> Result<RemovalReport, FeedError> {
        self.remove_endpoints(EndpointKind::Destination)
    }

    fn endpoints(&self, kind: EndpointKind) -> Result<Vec<Endpoint<S>>, FeedError> {
        let operation = match kind {
            EndpointKind::Source => "read feed sources",
            EndpointKind::Destination => "read feed destinations",
        };
        let nodes = self
            .store
            .children(self.node, child_name(kind))
            .map_err(self.fail(operation))?;
        Ok(nodes
            .into_iter()
            .map(|node| Endpoint::new(self.store.clone(), node, kind))
            .collect())
    }

    fn find_endpoint(
        &self,
        kind: EndpointKind,
        datasource_id: NodeId,
    ) -> Result<Option<Endpoint<S>>, FeedError> {
        for endpoint in self.endpoints(kind)? {
            let bound = endpoint
                .datasource_id()
                .map_err(self.fail("read endpoint datasource"))?;
            if bound == Some(datasource_id) {
                return Ok(Some(endpoint));
            }
        }
        Ok(None)
    }

    fn ensure_endpoint(
        &self,
        kind: EndpointKind,
        datasource: &Datasource<S>,
    ) -> Result<Endpoint<S>, FeedError> {
        let fail = self.fail(match kind {
            EndpointKind::Source => "add feed source",
            EndpointKind::Destination => "add feed destination",
        });

        self.store.atomically(|| {
            let _writable = Writable::acquire(&self.store, self.node).map_err(&fail)?;
            let node = self
                .store
                .add_child(self.node, child_name(kind), node_type(kind))
                .map_err(&fail)?;
            codec::set_reference(&self.store, node, names::DATASOURCE, Some(datasource.id()))
                .map_err(&fail)?;
            datasource.bind_endpoint(kind, node).map_err(&fail)?;

            tracing::debug!(
                feed = %self.label(),
                endpoint = %node,
                datasource = %datasource.id(),
                kind = kind.as_str(),
                "created feed endpoint"
            );
            Ok(Endpoint::new(self.store.clone(), node, kind))
        })
    }

    fn remove_endpoint(&self, kind: EndpointKind, endpoint: &Endpoint<S>) -> Result<(), FeedError> {
        let fail = self.fail(match kind {
            EndpointKind::Source => "remove feed source",
            EndpointKind::Destination => "remove feed destination",
        });

        let owned = endpoint.kind == kind
            && self.store.parent(endpoint.node).map_err(&fail)? == Some(self.node);
        if !owned {
            return Err(FeedError::ForeignEndpoint {
                feed: self.label(),
                kind: kind.as_str(),
                endpoint: endpoint.node,
            });
        }

        self.store.atomically(|| {
            let _writable = Writable::acquire(&self.store, self.node).map_err(&fail)?;
            release_and_remove(&self.store, endpoint).map_err(&fail)?;
            tracing::debug!(feed = %self.label(), endpoint = %endpoint.node, kind = kind.as_str(), "removed feed endpoint");
            Ok(())
        })
    }

    fn remove_endpoints(&self, kind: EndpointKind) -> Result<RemovalReport, FeedError> {
        let fail = self.fail(match kind {
            EndpointKind::Source => "remove feed sources",
            EndpointKind::Destination => "remove feed destinations",
        });

        let mut report = RemovalReport::default();
        let endpoints = self.endpoints(kind)?;
        if endpoints.is_empty() {
            return Ok(report);
        }

        // One checkout of the feed for the whole batch.
        let summary = self.summary_node()?;
        let _writable = Writable::acquire(&self.store, summary).map_err(&fail)?;

        for endpoint in endpoints {
            let result: Result<(), StoreError> =
                self.store.atomically(|| release_and_remove(&self.store, &endpoint));
            match result {
                Ok(()) => report.removed.push(endpoint.node),
                Err(e) => {
                    tracing::warn!(
                        feed = %self.label(),
                        endpoint = %endpoint.node,
                        kind = kind.as_str(),
                        error = %e,
                        "failed to remove feed endpoint, continuing with the rest"
                    );
                    report.failed.push(RemovalFailure {
                        endpoint_id: endpoint.node,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Release the datasource's back-reference, then delete the endpoint node.
fn release_and_remove<S: NodeStore>(store: &S, endpoint: &Endpoint<S>) -> Result<(), StoreError> {
    if let Some(datasource) = endpoint.get_datasource()? {
        datasource.release_endpoint(endpoint.kind, endpoint.node)?;
    }
    store.remove_node(endpoint.node)
}
