//! Data-transfer types for the feed metadata store.
//!
//! # Core Concepts
//!
//! - [`FeedSummary`]: identity of a feed (category + system name).
//! - [`FeedDetailsView`]: everything the details node of a feed holds: its
//!   definition, endpoints, dependency edges, SLA references and precondition.
//! - [`DatasourceSummary`]: an external data endpoint feeds read from or write to.
//! - [`ServiceLevelAgreement`]: a shared SLA that many feeds may reference.
//! - [`FeedTemplate`]: the template a feed was built from.
//!
//! These are plain values. The live handles that mutate the store are in
//! [`crate::feed`].

mod datasource;
mod endpoint;
mod feed;
mod sla;

pub use datasource::*;
pub use endpoint::*;
pub use feed::*;
pub use sla::*;
