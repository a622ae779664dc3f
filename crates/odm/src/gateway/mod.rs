//! The document gateway: the boundary between the ODM core and the store.
//!
//! The core only ever talks to a [`DocumentGateway`]. Index names passed in
//! are final (prefix already applied) and bodies are complete Query DSL
//! requests. Chunking of bulk work happens in the core, so
//! [`DocumentGateway::bulk`] receives exactly one batch.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GatewayResult;
use crate::model::IndexDefinition;
use crate::query::EsqlRequest;
use crate::types::{BulkBatchResult, BulkDocument};

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

#[cfg(feature = "elasticsearch")]
pub use self::elasticsearch::ElasticsearchGateway;

/// Outcome of a single-document delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The document existed and was removed.
    Deleted,
    /// The document did not exist.
    NotFound,
}

/// Executes document and index operations against a store.
#[async_trait]
pub trait DocumentGateway: Send + Sync + Debug {
    /// Returns a short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Runs a `_search` request and returns the raw response.
    async fn search(&self, index: &str, body: &Value) -> GatewayResult<Value>;

    /// Runs an ES|QL statement and returns the raw response.
    async fn esql(&self, request: &EsqlRequest) -> GatewayResult<Value>;

    /// Fetches one document as a raw hit. Returns `None` if it does not exist.
    async fn get(&self, index: &str, id: &str) -> GatewayResult<Option<Value>>;

    /// Creates or replaces a document.
    async fn index(&self, index: &str, id: &str, document: &Map<String, Value>)
    -> GatewayResult<()>;

    /// Indexes one batch of documents.
    async fn bulk(&self, index: &str, documents: &[BulkDocument])
    -> GatewayResult<BulkBatchResult>;

    /// Deletes one document. A missing document is not an error.
    async fn delete(&self, index: &str, id: &str) -> GatewayResult<DeleteOutcome>;

    /// Deletes every document matching `query`, returning how many were removed.
    async fn delete_by_query(&self, index: &str, query: &Value) -> GatewayResult<u64>;

    /// Returns true if the index exists.
    async fn index_exists(&self, index: &str) -> GatewayResult<bool>;

    /// Creates an index. Returns false if it already existed.
    async fn create_index(&self, index: &str, definition: &IndexDefinition)
    -> GatewayResult<bool>;

    /// Updates the mapping of an existing index. Returns the acknowledgement.
    async fn put_mapping(&self, index: &str, mappings: &Value) -> GatewayResult<bool>;

    /// Deletes an index. Returns false if it did not exist.
    async fn delete_index(&self, index: &str) -> GatewayResult<bool>;

    /// Makes recent writes visible to search.
    async fn refresh(&self, index: &str) -> GatewayResult<()>;
}
