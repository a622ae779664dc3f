//! Document operations: search, ES|QL, get, index, bulk and delete.

use std::time::Instant;

use async_trait::async_trait;
use elasticsearch::http::Method;
use elasticsearch::http::headers::HeaderMap;
use elasticsearch::http::request::JsonBody;
use elasticsearch::{
    BulkParts, DeleteByQueryParts, DeleteParts, GetParts, IndexParts, SearchParts,
};
use serde_json::{Map, Value, json};

use crate::error::GatewayResult;
use crate::gateway::{DeleteOutcome, DocumentGateway};
use crate::model::IndexDefinition;
use crate::query::EsqlRequest;
use crate::types::{BulkBatchResult, BulkDocument, BulkItemError};

use super::client::{ElasticsearchGateway, json_body};
use super::indices;

#[async_trait]
impl DocumentGateway for ElasticsearchGateway {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn search(&self, index: &str, body: &Value) -> GatewayResult<Value> {
        let started = Instant::now();
        let indices: &[&str] = &[index];
        // A point-in-time search names its index through the PIT id.
        let parts = if body.get("pit").is_some() {
            SearchParts::None
        } else {
            SearchParts::Index(indices)
        };
        let response = self
            .send_with_retry("search", move || {
                self.client().search(parts.clone()).body(body).send()
            })
            .await?;
        let result = json_body("search", response).await;

        let elapsed = started.elapsed().as_millis();
        if elapsed > u128::from(self.slow_query_threshold_ms()) {
            tracing::warn!(
                "Slow search on '{}' took {} ms: {}",
                index,
                elapsed,
                body
            );
        }
        result
    }

    async fn esql(&self, request: &EsqlRequest) -> GatewayResult<Value> {
        let body = request.body();
        let response = self
            .send_with_retry("esql", || {
                self.client().send(
                    Method::Post,
                    "/_query",
                    HeaderMap::new(),
                    Option::<&()>::None,
                    Some(JsonBody::new(body.clone())),
                    None,
                )
            })
            .await?;
        json_body("esql", response).await
    }

    async fn get(&self, index: &str, id: &str) -> GatewayResult<Option<Value>> {
        let response = self
            .send_with_retry("get", move || {
                self.client().get(GetParts::IndexId(index, id)).send()
            })
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        json_body("get", response).await.map(Some)
    }

    async fn index(
        &self,
        index: &str,
        id: &str,
        document: &Map<String, Value>,
    ) -> GatewayResult<()> {
        let refresh = self.refresh_param();
        let response = self
            .send_with_retry("index", move || {
                self.client()
                    .index(IndexParts::IndexId(index, id))
                    .body(document)
                    .refresh(refresh)
                    .send()
            })
            .await?;
        json_body("index", response).await.map(|_| ())
    }

    async fn bulk(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> GatewayResult<BulkBatchResult> {
        let operations = bulk_operations(documents);
        let refresh = self.refresh_param();
        let response = self
            .send_with_retry("bulk", || {
                let body: Vec<JsonBody<Value>> =
                    operations.iter().cloned().map(JsonBody::new).collect();
                self.client()
                    .bulk(BulkParts::Index(index))
                    .body(body)
                    .refresh(refresh)
                    .send()
            })
            .await?;
        let body = json_body("bulk", response).await?;
        Ok(bulk_result(&body))
    }

    async fn delete(&self, index: &str, id: &str) -> GatewayResult<DeleteOutcome> {
        let refresh = self.refresh_param();
        let response = self
            .send_with_retry("delete", move || {
                self.client()
                    .delete(DeleteParts::IndexId(index, id))
                    .refresh(refresh)
                    .send()
            })
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(DeleteOutcome::NotFound);
        }
        json_body("delete", response).await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_by_query(&self, index: &str, query: &Value) -> GatewayResult<u64> {
        let indices: &[&str] = &[index];
        let body = json!({ "query": query });
        let refresh = self.refreshes();
        let response = self
            .send_with_retry("delete_by_query", || {
                self.client()
                    .delete_by_query(DeleteByQueryParts::Index(indices))
                    .body(&body)
                    .refresh(refresh)
                    .send()
            })
            .await?;
        let body = json_body("delete_by_query", response).await?;
        Ok(body.get("deleted").and_then(|d| d.as_u64()).unwrap_or(0))
    }

    async fn index_exists(&self, index: &str) -> GatewayResult<bool> {
        indices::index_exists(self, index).await
    }

    async fn create_index(
        &self,
        index: &str,
        definition: &IndexDefinition,
    ) -> GatewayResult<bool> {
        indices::create_index(self, index, definition).await
    }

    async fn put_mapping(&self, index: &str, mappings: &Value) -> GatewayResult<bool> {
        indices::put_mapping(self, index, mappings).await
    }

    async fn delete_index(&self, index: &str) -> GatewayResult<bool> {
        indices::delete_index(self, index).await
    }

    async fn refresh(&self, index: &str) -> GatewayResult<()> {
        indices::refresh(self, index).await
    }
}

/// Builds the NDJSON lines of a bulk request: one action line per document
/// followed by its source.
fn bulk_operations(documents: &[BulkDocument]) -> Vec<Value> {
    let mut operations = Vec::with_capacity(documents.len() * 2);
    for document in documents {
        let action = match document.id {
            Some(ref id) => json!({ "index": { "_id": id } }),
            None => json!({ "index": {} }),
        };
        operations.push(action);
        operations.push(Value::Object(document.source.clone()));
    }
    operations
}

/// Counts item outcomes in a bulk response.
fn bulk_result(response: &Value) -> BulkBatchResult {
    let mut result = BulkBatchResult::default();
    let items = response
        .get("items")
        .and_then(|i| i.as_array())
        .map(|i| i.as_slice())
        .unwrap_or(&[]);

    for item in items {
        let Some(outcome) = item.as_object().and_then(|o| o.values().next()) else {
            continue;
        };
        let status = outcome.get("status").and_then(|s| s.as_u64()).unwrap_or(200);
        match outcome.get("error") {
            None if status < 300 => result.success += 1,
            error => {
                let error = error.cloned().unwrap_or_else(|| json!({ "status": status }));
                result.failed += 1;
                let reason = error
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                result.errors.push(BulkItemError {
                    id: outcome
                        .get("_id")
                        .and_then(|id| id.as_str())
                        .map(str::to_string),
                    reason,
                });
            }
        }
    }
    result
}
