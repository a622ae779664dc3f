//! Shared test infrastructure for the integration tests.
//!
//! [`RecordingGateway`] keeps every request it receives and answers searches
//! and bulk batches from scripted queues. Documents written through
//! `index` are kept in memory so repository round trips work.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use elastic_odm::config::OdmConfig;
use elastic_odm::context::OdmContext;
use elastic_odm::error::{GatewayError, GatewayResult};
use elastic_odm::gateway::{DeleteOutcome, DocumentGateway};
use elastic_odm::model::{FieldType, IndexDefinition, Model, ModelSchema, Relation};
use elastic_odm::query::EsqlRequest;
use elastic_odm::types::{BulkBatchResult, BulkDocument};

// ============================================================================
// Recording gateway
// ============================================================================

/// A gateway that records requests and replays scripted responses.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    searches: Mutex<Vec<(String, Value)>>,
    search_responses: Mutex<VecDeque<GatewayResult<Value>>>,
    bulk_batches: Mutex<Vec<usize>>,
    bulk_responses: Mutex<VecDeque<GatewayResult<BulkBatchResult>>>,
    documents: Mutex<BTreeMap<(String, String), Map<String, Value>>>,
}

impl RecordingGateway {
    /// Creates a shared gateway.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the response of the next search.
    pub fn respond(&self, response: Value) {
        self.search_responses.lock().push_back(Ok(response));
    }

    /// Queues a failure for the next search.
    pub fn fail_next_search(&self, status: u16) {
        self.search_responses
            .lock()
            .push_back(Err(GatewayError::Status {
                operation: "search".to_string(),
                status,
                body: "scripted failure".to_string(),
            }));
    }

    /// Queues the result of the next bulk batch.
    pub fn respond_bulk(&self, result: GatewayResult<BulkBatchResult>) {
        self.bulk_responses.lock().push_back(result);
    }

    /// Returns every recorded search as `(index, body)`.
    pub fn searches(&self) -> Vec<(String, Value)> {
        self.searches.lock().clone()
    }

    /// Returns the body of the most recent search.
    pub fn last_search(&self) -> Value {
        self.searches
            .lock()
            .last()
            .map(|(_, body)| body.clone())
            .unwrap_or(Value::Null)
    }

    /// Returns the size of every bulk batch received, in order.
    pub fn bulk_batches(&self) -> Vec<usize> {
        self.bulk_batches.lock().clone()
    }

    /// Returns a stored document source.
    pub fn stored(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.documents
            .lock()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    /// Builds a context over this gateway with the given configuration.
    pub fn context(self: &Arc<Self>, config: OdmConfig) -> OdmContext {
        let gateway: Arc<dyn DocumentGateway> = Arc::clone(self) as Arc<dyn DocumentGateway>;
        OdmContext::new(gateway, config)
    }
}

#[async_trait]
impl DocumentGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn search(&self, index: &str, body: &Value) -> GatewayResult<Value> {
        self.searches.lock().push((index.to_string(), body.clone()));
        self.search_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(search_response(0, &[])))
    }

    async fn esql(&self, request: &EsqlRequest) -> GatewayResult<Value> {
        self.searches.lock().push(("_query".to_string(), request.body()));
        self.search_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "columns": [], "values": [] })))
    }

    async fn get(&self, index: &str, id: &str) -> GatewayResult<Option<Value>> {
        Ok(self.stored(index, id).map(|source| {
            json!({ "_index": index, "_id": id, "found": true, "_source": source })
        }))
    }

    async fn index(
        &self,
        index: &str,
        id: &str,
        document: &Map<String, Value>,
    ) -> GatewayResult<()> {
        self.documents
            .lock()
            .insert((index.to_string(), id.to_string()), document.clone());
        Ok(())
    }

    async fn bulk(
        &self,
        _index: &str,
        documents: &[BulkDocument],
    ) -> GatewayResult<BulkBatchResult> {
        self.bulk_batches.lock().push(documents.len());
        self.bulk_responses.lock().pop_front().unwrap_or_else(|| {
            Ok(BulkBatchResult {
                success: documents.len() as u64,
                ..Default::default()
            })
        })
    }

    async fn delete(&self, index: &str, id: &str) -> GatewayResult<DeleteOutcome> {
        let removed = self
            .documents
            .lock()
            .remove(&(index.to_string(), id.to_string()));
        Ok(if removed.is_some() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn delete_by_query(&self, index: &str, _query: &Value) -> GatewayResult<u64> {
        let mut documents = self.documents.lock();
        let before = documents.len();
        documents.retain(|(i, _), _| i != index);
        Ok((before - documents.len()) as u64)
    }

    async fn index_exists(&self, _index: &str) -> GatewayResult<bool> {
        Ok(true)
    }

    async fn create_index(
        &self,
        _index: &str,
        _definition: &IndexDefinition,
    ) -> GatewayResult<bool> {
        Ok(true)
    }

    async fn put_mapping(&self, _index: &str, _mappings: &Value) -> GatewayResult<bool> {
        Ok(true)
    }

    async fn delete_index(&self, _index: &str) -> GatewayResult<bool> {
        Ok(true)
    }

    async fn refresh(&self, _index: &str) -> GatewayResult<()> {
        Ok(())
    }
}

/// Builds a `_search` response with the given total and `(id, score, source)` hits.
pub fn search_response(total: u64, hits: &[(&str, f64, Value)]) -> Value {
    let hits: Vec<Value> = hits
        .iter()
        .map(|(id, score, source)| json!({ "_id": id, "_score": score, "_source": source }))
        .collect();
    json!({
        "took": 4,
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
    })
}

// ============================================================================
// Models
// ============================================================================

/// A blog post with soft deletes and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Post {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            author_id: None,
            views: 0,
            tags: Vec::new(),
        }
    }
}

static POST_SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
    ModelSchema::builder("posts")
        .text_with_keyword("title")
        .field("author_id", FieldType::Keyword)
        .field("views", FieldType::Long)
        .field("tags", FieldType::Keyword)
        .dense_vector("embedding", 3)
        .timestamps(true)
        .relation("author", Relation::belongs_to("authors", "author_id"))
        .build()
});

impl Model for Post {
    fn schema() -> &'static ModelSchema {
        &POST_SCHEMA
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// An append-only log entry without soft deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
    pub level: String,
}

static LOG_SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
    ModelSchema::builder("logs")
        .field("message", FieldType::Text)
        .field("level", FieldType::Keyword)
        .soft_deletes(false)
        .build()
});

impl Model for LogEntry {
    fn schema() -> &'static ModelSchema {
        &LOG_SCHEMA
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Returns the soft-delete marker clause.
pub fn deleted_at_exists() -> Value {
    json!({ "exists": { "field": "_deleted_at" } })
}

/// Converts a JSON object literal into a map.
pub fn attributes(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
