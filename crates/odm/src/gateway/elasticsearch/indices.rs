//! Index lifecycle: existence checks, creation, mappings, deletion and refresh.

use elasticsearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesPutMappingParts,
    IndicesRefreshParts,
};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::model::IndexDefinition;

use super::client::{ElasticsearchGateway, json_body};

pub(super) async fn index_exists(
    gateway: &ElasticsearchGateway,
    index: &str,
) -> GatewayResult<bool> {
    let indices: &[&str] = &[index];
    let indices_api = &gateway.client().indices();
    let response = gateway
        .send_with_retry("index_exists", move || {
            indices_api
                .exists(IndicesExistsParts::Index(indices))
                .send()
        })
        .await?;

    let status = response.status_code();
    if status.is_success() {
        return Ok(true);
    }
    if status.as_u16() == 404 {
        return Ok(false);
    }
    Err(GatewayError::Status {
        operation: "index_exists".to_string(),
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

pub(super) async fn create_index(
    gateway: &ElasticsearchGateway,
    index: &str,
    definition: &IndexDefinition,
) -> GatewayResult<bool> {
    let body = definition.to_body();
    let indices_api = &gateway.client().indices();
    let response = gateway
        .send_with_retry("create_index", || {
            indices_api
                .create(IndicesCreateParts::Index(index))
                .body(&body)
                .send()
        })
        .await?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        // Lost a creation race or the index was already there.
        if body.contains("resource_already_exists_exception") {
            tracing::debug!("Index '{}' already exists", index);
            return Ok(false);
        }
        return Err(GatewayError::Status {
            operation: "create_index".to_string(),
            status: status.as_u16(),
            body,
        });
    }

    tracing::info!("Created Elasticsearch index '{}'", index);
    Ok(true)
}

pub(super) async fn put_mapping(
    gateway: &ElasticsearchGateway,
    index: &str,
    mappings: &Value,
) -> GatewayResult<bool> {
    let indices: &[&str] = &[index];
    let indices_api = &gateway.client().indices();
    let response = gateway
        .send_with_retry("put_mapping", move || {
            indices_api
                .put_mapping(IndicesPutMappingParts::Index(indices))
                .body(mappings)
                .send()
        })
        .await?;

    let body = json_body("put_mapping", response).await?;
    let acknowledged = body
        .get("acknowledged")
        .and_then(|a| a.as_bool())
        .unwrap_or(false);
    tracing::debug!("Updated mapping of '{}' (acknowledged: {})", index, acknowledged);
    Ok(acknowledged)
}

pub(super) async fn delete_index(
    gateway: &ElasticsearchGateway,
    index: &str,
) -> GatewayResult<bool> {
    let indices: &[&str] = &[index];
    let indices_api = &gateway.client().indices();
    let response = gateway
        .send_with_retry("delete_index", move || {
            indices_api
                .delete(IndicesDeleteParts::Index(indices))
                .send()
        })
        .await?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if body.contains("index_not_found_exception") {
            tracing::debug!("Index '{}' did not exist", index);
            return Ok(false);
        }
        return Err(GatewayError::Status {
            operation: "delete_index".to_string(),
            status: status.as_u16(),
            body,
        });
    }

    tracing::info!("Deleted Elasticsearch index '{}'", index);
    Ok(true)
}

pub(super) async fn refresh(gateway: &ElasticsearchGateway, index: &str) -> GatewayResult<()> {
    let indices: &[&str] = &[index];
    let indices_api = &gateway.client().indices();
    let response = gateway
        .send_with_retry("refresh", move || {
            indices_api
                .refresh(IndicesRefreshParts::Index(indices))
                .send()
        })
        .await?;
    json_body("refresh", response).await.map(|_| ())
}
