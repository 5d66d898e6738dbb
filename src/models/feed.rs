use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EndpointSummary, PreconditionSummary, ServiceLevelAgreement};
use crate::store::NodeId;

/// Identity of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub id: NodeId,
    pub category: String,
    pub system_name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeedInput {
    pub category: String,
    pub system_name: String,
}

/// Input for updating the scalar attributes of a feed's details.
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeedDetailsInput {
    /// Serialized feed definition, stored opaquely.
    pub json: Option<String>,
    /// Handle of the feed in the external orchestration system.
    pub process_group_id: Option<String>,
    pub template_id: Option<NodeId>,
}

/// The template a feed was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTemplate {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateInput {
    pub name: String,
}

/// Aggregated view of a feed's details node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDetailsView {
    #[serde(flatten)]
    pub feed: FeedSummary,
    pub json: Option<String>,
    pub process_group_id: Option<String>,
    pub template: Option<FeedTemplate>,
    pub sources: Vec<EndpointSummary>,
    pub destinations: Vec<EndpointSummary>,
    pub dependent_feeds: Vec<FeedSummary>,
    pub used_by_feeds: Vec<FeedSummary>,
    pub slas: Vec<ServiceLevelAgreement>,
    pub precondition: Option<PreconditionSummary>,
}

/// Whether a set-membership operation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeResponse {
    pub changed: bool,
}
