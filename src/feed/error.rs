use thiserror::Error;

use crate::store::{NodeId, StoreError};

/// Errors from feed metadata operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The node store refused or failed an operation on behalf of a feed.
    #[error("unable to {operation} for feed {feed}: {source}")]
    Persistence {
        /// System name of the owning feed, or its id when the name is unreadable.
        feed: String,
        operation: &'static str,
        source: StoreError,
    },

    #[error("feed {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("{kind} {endpoint} does not belong to feed {feed}")]
    ForeignEndpoint {
        feed: String,
        kind: &'static str,
        endpoint: NodeId,
    },

    /// Feeds may only reference agreements filed under the shared SLA folder.
    #[error("feed {feed} cannot reference {sla}: not a shared service level agreement")]
    UnsharedSla { feed: String, sla: NodeId },

    #[error("feed {system_name} already exists in category {category}")]
    DuplicateFeed {
        category: String,
        system_name: String,
    },

    #[error("feed {feed} has no {child} node")]
    Incomplete { feed: String, child: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FeedError {
    /// The failure came from contention on a version root: it is locked
    /// elsewhere or checked in.
    pub fn is_conflict(&self) -> bool {
        let source = match self {
            Self::Persistence { source, .. } => source,
            Self::Store(source) => source,
            _ => return false,
        };
        matches!(source, StoreError::Locked(_) | StoreError::CheckedIn(_))
    }
}
