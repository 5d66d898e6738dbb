//! Feed metadata store.
//!
//! Keeps the metadata of data-pipeline feeds (sources, destinations,
//! dependency links, SLA references and an optional precondition) in a
//! hierarchical, versioned node store.
//!
//! - [`store`] - The node store interface, property codec and checkout guard
//! - [`db`] - SQLite implementation of the node store
//! - [`feed`] - Feed handles and the consistency rules between them
//! - [`models`] - Serializable summaries and inputs
//! - [`api`] - HTTP API
//! - [`config`] - Configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod feed;
pub mod models;
pub mod store;
