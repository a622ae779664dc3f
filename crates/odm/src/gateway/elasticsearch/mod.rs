//! Elasticsearch gateway.
//!
//! Talks to a cluster through the official `elasticsearch` client:
//!
//! - `client`: transport construction, authentication and retries
//! - `documents`: search, ES|QL, get, index, bulk and delete
//! - `indices`: index creation, mappings, deletion and refresh
//!
//! Requests that fail at the transport level or come back with 429/502/503/504
//! are retried with exponential backoff, up to `max_retries` times.

mod client;
mod documents;
mod indices;

pub use client::ElasticsearchGateway;
