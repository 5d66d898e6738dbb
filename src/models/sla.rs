use serde::{Deserialize, Serialize};

use crate::store::NodeId;

/// A shared service level agreement.
///
/// Feeds hold references to SLAs, never copies. Two SLAs with the same name
/// and description are still distinct agreements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLevelAgreement {
    pub id: NodeId,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlaInput {
    pub name: String,
    pub description: Option<String>,
}

/// Replace the SLA references of a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSlasInput {
    pub sla_ids: Vec<NodeId>,
}

/// The gating condition of a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreconditionSummary {
    pub id: NodeId,
    /// Optional reference to a shared SLA.
    pub sla_ref: Option<NodeId>,
    /// The nested SLA owned by the precondition.
    pub sla: Option<ServiceLevelAgreement>,
}
