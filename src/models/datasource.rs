use serde::{Deserialize, Serialize};

use crate::store::NodeId;

/// An external data endpoint.
///
/// A datasource keeps back-references to every feed endpoint bound to it so
/// it can answer "which feeds read from / write to me?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceSummary {
    pub id: NodeId,
    pub name: String,
    /// Feed source endpoints bound to this datasource.
    pub feed_sources: Vec<NodeId>,
    /// Feed destination endpoints bound to this datasource.
    pub feed_destinations: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatasourceInput {
    pub name: String,
}
