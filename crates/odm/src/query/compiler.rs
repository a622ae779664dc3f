//! Compiles a [`QueryRequest`] into a search request body.
//!
//! Compilation is pure: the same request always yields the same body, and
//! optional sections (`aggs`, `_source`, `track_total_hits`, ...) appear only
//! when they were set.

use serde_json::{Map, Value, json};

use super::request::{KnnPlacement, QueryMode, QueryRequest, QueryWrapper};

/// A request ready for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    /// A Query DSL `_search` request.
    Search(SearchRequest),
    /// A raw ES|QL request.
    Esql(EsqlRequest),
}

impl CompiledQuery {
    /// Returns the search body, if this is a DSL request.
    pub fn as_search(&self) -> Option<&SearchRequest> {
        match self {
            CompiledQuery::Search(request) => Some(request),
            CompiledQuery::Esql(_) => None,
        }
    }

    /// Returns the ES|QL request, if this is one.
    pub fn as_esql(&self) -> Option<&EsqlRequest> {
        match self {
            CompiledQuery::Esql(request) => Some(request),
            CompiledQuery::Search(_) => None,
        }
    }
}

/// A compiled `_search` body.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// The complete request body.
    pub body: Value,
}

impl SearchRequest {
    /// Returns `from`, if set.
    pub fn from(&self) -> Option<u64> {
        self.body.get("from").and_then(|v| v.as_u64())
    }

    /// Returns `size`, if set.
    pub fn size(&self) -> Option<u64> {
        self.body.get("size").and_then(|v| v.as_u64())
    }

    /// Returns the compiled sort entries.
    pub fn sort(&self) -> &[Value] {
        self.body
            .get("sort")
            .and_then(|s| s.as_array())
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }
}

/// A compiled ES|QL request.
#[derive(Debug, Clone, PartialEq)]
pub struct EsqlRequest {
    /// The ES|QL statement.
    pub query: String,
}

impl EsqlRequest {
    /// Returns the `_query` request body.
    pub fn body(&self) -> Value {
        json!({ "query": self.query })
    }
}

/// Compiles a request into the body sent to the store.
pub fn compile(request: &QueryRequest) -> CompiledQuery {
    if let QueryMode::Esql(ref statement) = request.mode {
        return CompiledQuery::Esql(EsqlRequest {
            query: statement.clone(),
        });
    }

    let mut body = Map::new();

    // knn hits are unioned with query hits; bool clauses pre-filter both.
    let knn_filter = || (!request.bool_query.is_empty()).then(|| request.bool_query.to_value());
    match request.knn {
        Some((ref knn, KnnPlacement::Pure)) => {
            body.insert("knn".to_string(), knn.to_value(knn_filter()));
        }
        Some((ref knn, KnnPlacement::WithQuery)) => {
            body.insert("query".to_string(), build_query(request));
            body.insert("knn".to_string(), knn.to_value(knn_filter()));
        }
        None => {
            body.insert("query".to_string(), build_query(request));
        }
    }

    if let Some(from) = request.from {
        body.insert("from".to_string(), json!(from));
    }
    if let Some(size) = request.size {
        body.insert("size".to_string(), json!(size));
    }
    if !request.sort.is_empty() {
        let sort: Vec<Value> = request.sort.iter().map(|s| s.to_value()).collect();
        body.insert("sort".to_string(), Value::Array(sort));
    }
    if request.source.is_set() {
        body.insert("_source".to_string(), request.source.to_value());
    }
    if !request.aggregations.is_empty() {
        body.insert(
            "aggs".to_string(),
            Value::Object(request.aggregations.clone()),
        );
    }
    if let Some(track) = request.track_total_hits {
        body.insert("track_total_hits".to_string(), json!(track));
    }
    if let Some(ref highlight) = request.highlight {
        body.insert("highlight".to_string(), highlight.clone());
    }
    if let Some(ref collapse) = request.collapse {
        body.insert("collapse".to_string(), collapse.clone());
    }
    if let Some(ref search_after) = request.search_after {
        body.insert("search_after".to_string(), json!(search_after));
    }
    if let Some(min_score) = request.min_score {
        body.insert("min_score".to_string(), json!(min_score));
    }
    if !request.suggest.is_empty() {
        body.insert("suggest".to_string(), Value::Object(request.suggest.clone()));
    }
    if !request.runtime_mappings.is_empty() {
        body.insert(
            "runtime_mappings".to_string(),
            Value::Object(request.runtime_mappings.clone()),
        );
    }
    if let Some(explain) = request.explain {
        body.insert("explain".to_string(), json!(explain));
    }
    if !request.rescore.is_empty() {
        body.insert("rescore".to_string(), Value::Array(request.rescore.clone()));
    }
    if let Some(ref pit) = request.pit {
        body.insert("pit".to_string(), pit.clone());
    }

    CompiledQuery::Search(SearchRequest {
        body: Value::Object(body),
    })
}

/// Compiles the count probe for a request.
///
/// The probe keeps the query and knn clauses, forces `size: 0` and
/// `track_total_hits: true`, and drops everything that only shapes hits.
pub fn compile_count(request: &QueryRequest) -> CompiledQuery {
    let mut probe = QueryRequest {
        bool_query: request.bool_query.clone(),
        mode: request.mode.clone(),
        wrapper: request.wrapper.clone(),
        knn: request.knn.clone(),
        min_score: request.min_score,
        runtime_mappings: request.runtime_mappings.clone(),
        pit: request.pit.clone(),
        ..QueryRequest::default()
    };
    probe.size = Some(0);
    probe.track_total_hits = Some(true);
    compile(&probe)
}

/// Builds the `query` section: the bool query or its replacement, then the wrapper.
fn build_query(request: &QueryRequest) -> Value {
    let base = match request.mode {
        QueryMode::Replaced(ref replaced) if request.bool_query.is_empty() => replaced.clone(),
        QueryMode::Replaced(ref replaced) => json!({
            "bool": {
                "must": [replaced],
                "filter": [request.bool_query.to_value()]
            }
        }),
        QueryMode::Bool | QueryMode::Esql(_) => request.bool_query.to_value(),
    };

    match request.wrapper {
        Some(QueryWrapper::FunctionScore {
            ref functions,
            ref options,
        }) => {
            let mut function_score = Map::new();
            function_score.insert("query".to_string(), base);
            function_score.insert("functions".to_string(), json!(functions));
            for (key, value) in options {
                function_score.insert(key.clone(), value.clone());
            }
            json!({ "function_score": function_score })
        }
        Some(QueryWrapper::Pinned { ref ids }) => json!({
            "pinned": {
                "ids": ids,
                "organic": base
            }
        }),
        None => base,
    }
}
