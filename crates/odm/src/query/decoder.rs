//! Decodes raw search responses into [`ResultSet`]s.

use serde_json::{Map, Value};

use crate::error::{DecodeError, OdmResult};
use crate::types::{Cursor, Document, ResultSet};

/// Decodes a `_search` response.
///
/// Hits without a string `_id` are skipped; the decode fails only when the
/// response carried hits and none of them could be decoded.
pub fn decode_search_response(response: &Value) -> OdmResult<ResultSet<Document>> {
    let raw_hits = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .map(|h| h.as_slice())
        .unwrap_or(&[]);

    let mut documents = Vec::with_capacity(raw_hits.len());
    for hit in raw_hits {
        match decode_hit(hit) {
            Some(document) => documents.push(document),
            None => tracing::warn!("Skipping search hit without a usable _id: {}", hit),
        }
    }

    if !raw_hits.is_empty() && documents.is_empty() {
        return Err(DecodeError::NoDecodableHits {
            hits: raw_hits.len(),
        }
        .into());
    }

    let next_cursor = documents
        .last()
        .and_then(|doc| doc.sort_values())
        .map(|values| Cursor::new(values.to_vec()).encode());

    Ok(ResultSet::new(documents, extract_total(response))
        .with_aggregations(extract_aggregations(response))
        .with_execution_time_ms(extract_took(response))
        .with_next_cursor(next_cursor))
}

/// Decodes one raw hit. Returns `None` when `_id` is missing or not a string.
pub fn decode_hit(hit: &Value) -> Option<Document> {
    let object = hit.as_object()?;
    let id = object.get("_id")?.as_str()?.to_string();
    if id.is_empty() {
        return None;
    }

    let score = object.get("_score").and_then(|s| s.as_f64());
    let source = object
        .get("_source")
        .and_then(|s| s.as_object())
        .cloned()
        .unwrap_or_default();

    let metadata: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "_id" | "_score" | "_source"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Document::from_parts(id, score, source, metadata))
}

/// Decodes a single-document `GET` response (`{_id, _source, found, ...}`).
pub fn decode_get_response(response: &Value) -> Option<Document> {
    if response.get("found").and_then(|f| f.as_bool()) == Some(false) {
        return None;
    }
    decode_hit(response)
}

/// Reads `hits.total.value`, or the legacy numeric `hits.total`. Defaults to 0.
pub fn extract_total(response: &Value) -> u64 {
    let total = response.get("hits").and_then(|h| h.get("total"));
    match total {
        Some(Value::Object(t)) => t.get("value").and_then(|v| v.as_u64()).unwrap_or(0),
        Some(t) => t.as_u64().unwrap_or(0),
        None => 0,
    }
}

fn extract_aggregations(response: &Value) -> Map<String, Value> {
    response
        .get("aggregations")
        .and_then(|a| a.as_object())
        .cloned()
        .unwrap_or_default()
}

fn extract_took(response: &Value) -> Option<f64> {
    response.get("took").and_then(|t| t.as_f64())
}

/// Decodes an ES|QL `_query` response (`columns` + `values`).
///
/// Each row becomes a document whose source maps column names to values.
/// The id is the `_id` column when selected, otherwise the row number.
pub fn decode_esql_response(response: &Value) -> OdmResult<ResultSet<Document>> {
    let columns: Vec<&str> = response
        .get("columns")
        .and_then(|c| c.as_array())
        .ok_or_else(|| DecodeError::MalformedResponse {
            message: "ES|QL response has no columns".to_string(),
        })?
        .iter()
        .map(|c| c.get("name").and_then(|n| n.as_str()).unwrap_or_default())
        .collect();

    let rows = response
        .get("values")
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[]);

    let documents: Vec<Document> = rows
        .iter()
        .enumerate()
        .map(|(ordinal, row)| {
            let values = row.as_array().map(|r| r.as_slice()).unwrap_or(&[]);
            let mut source = Map::new();
            for (column, value) in columns.iter().zip(values) {
                source.insert((*column).to_string(), value.clone());
            }
            let id = source
                .get("_id")
                .and_then(|id| id.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| ordinal.to_string());
            Document::new(id, source)
        })
        .collect();

    let total = documents.len() as u64;
    Ok(ResultSet::new(documents, total).with_execution_time_ms(extract_took(response)))
}
