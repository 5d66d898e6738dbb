use serde::{Deserialize, Serialize};

use crate::store::NodeId;

/// Which side of a feed an endpoint sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Source,
    Destination,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
        }
    }
}

/// A feed source or destination bound to a datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub id: NodeId,
    pub kind: EndpointKind,
    /// `None` if the bound datasource no longer exists.
    pub datasource_id: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachEndpointInput {
    pub datasource_id: NodeId,
}

/// Outcome of removing every endpoint of one kind from a feed.
///
/// Items are removed independently: one failure does not stop the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub removed: Vec<NodeId>,
    pub failed: Vec<RemovalFailure>,
}

impl RemovalReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalFailure {
    pub endpoint_id: NodeId,
    pub error: String,
}
