//! The accumulating query request.
//!
//! [`QueryRequest`] is the plain value that chained builder calls mutate. It
//! knows nothing about transport; [`super::compiler`] turns it into a request
//! body.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use crate::error::QueryError;

// ============================================================================
// Bool query
// ============================================================================

/// One of the four bool-query buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Clauses that must match and contribute to the score.
    Must,
    /// Clauses that must not match.
    MustNot,
    /// Clauses that should match.
    Should,
    /// Clauses that must match without scoring.
    Filter,
}

impl Bucket {
    /// Every bucket, in compiled-output order.
    pub const ALL: [Bucket; 4] = [Bucket::Must, Bucket::MustNot, Bucket::Should, Bucket::Filter];

    /// Returns the Query DSL key of the bucket.
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Must => "must",
            Bucket::MustNot => "must_not",
            Bucket::Should => "should",
            Bucket::Filter => "filter",
        }
    }
}

/// The four ordered bool buckets plus `minimum_should_match`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    must: Vec<Value>,
    must_not: Vec<Value>,
    should: Vec<Value>,
    filter: Vec<Value>,
    minimum_should_match: Option<Value>,
}

impl BoolQuery {
    /// Creates an empty bool query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the clauses of a bucket in insertion order.
    pub fn bucket(&self, bucket: Bucket) -> &[Value] {
        match bucket {
            Bucket::Must => &self.must,
            Bucket::MustNot => &self.must_not,
            Bucket::Should => &self.should,
            Bucket::Filter => &self.filter,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<Value> {
        match bucket {
            Bucket::Must => &mut self.must,
            Bucket::MustNot => &mut self.must_not,
            Bucket::Should => &mut self.should,
            Bucket::Filter => &mut self.filter,
        }
    }

    /// Appends a clause to a bucket.
    pub fn push(&mut self, bucket: Bucket, clause: Value) {
        self.bucket_mut(bucket).push(clause);
    }

    /// Returns true if the bucket holds an identical clause.
    pub fn contains(&self, bucket: Bucket, clause: &Value) -> bool {
        self.bucket(bucket).contains(clause)
    }

    /// Removes every identical clause from a bucket, returning how many were removed.
    pub fn remove(&mut self, bucket: Bucket, clause: &Value) -> usize {
        let clauses = self.bucket_mut(bucket);
        let before = clauses.len();
        clauses.retain(|existing| existing != clause);
        before - clauses.len()
    }

    /// Sets `minimum_should_match` (a count or a percentage string).
    pub fn set_minimum_should_match(&mut self, value: Value) {
        self.minimum_should_match = Some(value);
    }

    /// Returns the `minimum_should_match` override.
    pub fn minimum_should_match(&self) -> Option<&Value> {
        self.minimum_should_match.as_ref()
    }

    /// Returns the number of clauses across all buckets.
    pub fn clause_count(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    /// Returns true if no bucket holds a clause.
    pub fn is_empty(&self) -> bool {
        self.clause_count() == 0
    }

    /// Compiles to `{"bool": {...}}`, omitting empty buckets.
    ///
    /// An empty bool query compiles to `{"bool": {}}`, which matches all documents.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        for bucket in Bucket::ALL {
            let clauses = self.bucket(bucket);
            if !clauses.is_empty() {
                body.insert(bucket.as_str().to_string(), Value::Array(clauses.to_vec()));
            }
        }
        if let Some(ref msm) = self.minimum_should_match {
            if !self.should.is_empty() {
                body.insert("minimum_should_match".to_string(), msm.clone());
            }
        }
        json!({ "bool": body })
    }
}

// ============================================================================
// Sorting and source filtering
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Returns the Query DSL spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(QueryError::InvalidDirection {
                direction: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(field, direction)` sort entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    /// Field to sort on (`_score` and `_doc` included).
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortField {
    /// Compiles to `{field: "asc"}`.
    pub fn to_value(&self) -> Value {
        json!({ self.field.as_str(): self.direction.as_str() })
    }
}

/// `_source` include/exclude lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFilter {
    /// Fields to return; `None` returns all.
    pub includes: Option<Vec<String>>,
    /// Fields to drop from the returned source.
    pub excludes: Option<Vec<String>>,
}

impl SourceFilter {
    /// Returns true if either list was set.
    pub fn is_set(&self) -> bool {
        self.includes.is_some() || self.excludes.is_some()
    }

    /// Compiles to `{"includes": [...], "excludes": [...]}`.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        if let Some(ref includes) = self.includes {
            body.insert("includes".to_string(), json!(includes));
        }
        if let Some(ref excludes) = self.excludes {
            body.insert("excludes".to_string(), json!(excludes));
        }
        Value::Object(body)
    }
}

// ============================================================================
// Vector search and query modes
// ============================================================================

/// An approximate nearest-neighbour clause.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnClause {
    /// The `dense_vector` field.
    pub field: String,
    /// The query vector.
    pub query_vector: Vec<f32>,
    /// Number of neighbours to return.
    pub k: u64,
    /// Candidates considered per shard.
    pub num_candidates: u64,
    /// Minimum similarity for a match.
    pub similarity: Option<f64>,
    /// Extra knn options (`boost`, `filter`, `inner_hits`, ...).
    pub options: Map<String, Value>,
}

/// Candidate pool size used for a given `k`.
pub fn num_candidates_for(k: u64) -> u64 {
    k.saturating_mul(2)
}

impl KnnClause {
    /// Creates a clause with the candidate pool sized for `k`.
    pub fn new(field: impl Into<String>, query_vector: Vec<f32>, k: u64) -> Self {
        Self {
            field: field.into(),
            query_vector,
            k,
            num_candidates: num_candidates_for(k),
            similarity: None,
            options: Map::new(),
        }
    }

    /// Compiles the clause, attaching `filter` as a pre-filter when given.
    ///
    /// A `filter` passed in `options` is kept; both become a filter array.
    pub fn to_value(&self, filter: Option<Value>) -> Value {
        let mut body = Map::new();
        body.insert("field".to_string(), json!(self.field));
        body.insert("query_vector".to_string(), json!(self.query_vector));
        body.insert("k".to_string(), json!(self.k));
        body.insert("num_candidates".to_string(), json!(self.num_candidates));
        if let Some(similarity) = self.similarity {
            body.insert("similarity".to_string(), json!(similarity));
        }
        for (key, value) in self.options.iter().filter(|(key, _)| *key != "filter") {
            body.insert(key.clone(), value.clone());
        }

        let mut filters: Vec<Value> = match self.options.get("filter") {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };
        filters.extend(filter);
        match filters.len() {
            0 => {}
            1 => {
                body.insert("filter".to_string(), filters.remove(0));
            }
            _ => {
                body.insert("filter".to_string(), Value::Array(filters));
            }
        }
        Value::Object(body)
    }
}

/// How a knn clause relates to the rest of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnPlacement {
    /// Only knn is sent; bool clauses become the knn pre-filter.
    Pure,
    /// knn is sent next to the query and the store combines the scores.
    WithQuery,
}

/// Which query drives execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryMode {
    /// The structured bool query.
    #[default]
    Bool,
    /// A top-level query that replaced the bool query (hybrid, sparse,
    /// semantic, rank features). Bool clauses still apply as a filter.
    Replaced(Value),
    /// A raw ES|QL statement; all DSL state is ignored.
    Esql(String),
}

/// A compound query wrapped around the compiled query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryWrapper {
    /// `function_score` with the given functions and options.
    FunctionScore {
        /// Score functions.
        functions: Vec<Value>,
        /// Options such as `score_mode` and `boost_mode`.
        options: Map<String, Value>,
    },
    /// `pinned`: promote the given ids above organic results.
    Pinned {
        /// Ids to pin, in order.
        ids: Vec<String>,
    },
}

// ============================================================================
// QueryRequest
// ============================================================================

/// Everything a chain of builder calls has accumulated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub(crate) bool_query: BoolQuery,
    pub(crate) mode: QueryMode,
    pub(crate) wrapper: Option<QueryWrapper>,
    pub(crate) knn: Option<(KnnClause, KnnPlacement)>,
    pub(crate) sort: Vec<SortField>,
    pub(crate) aggregations: Map<String, Value>,
    pub(crate) source: SourceFilter,
    pub(crate) from: Option<u64>,
    pub(crate) size: Option<u64>,
    pub(crate) track_total_hits: Option<bool>,
    pub(crate) highlight: Option<Value>,
    pub(crate) collapse: Option<Value>,
    pub(crate) search_after: Option<Vec<Value>>,
    pub(crate) min_score: Option<f64>,
    pub(crate) suggest: Map<String, Value>,
    pub(crate) runtime_mappings: Map<String, Value>,
    pub(crate) explain: Option<bool>,
    pub(crate) rescore: Vec<Value>,
    pub(crate) pit: Option<Value>,
}

impl QueryRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bool query.
    pub fn bool_query(&self) -> &BoolQuery {
        &self.bool_query
    }

    /// Returns the query mode.
    pub fn mode(&self) -> &QueryMode {
        &self.mode
    }

    /// Returns the knn clause and its placement.
    pub fn knn(&self) -> Option<&(KnnClause, KnnPlacement)> {
        self.knn.as_ref()
    }

    /// Returns the sort entries in priority order.
    pub fn sort(&self) -> &[SortField] {
        &self.sort
    }

    /// Returns the registered aggregations.
    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggregations
    }

    /// Returns the source filter.
    pub fn source(&self) -> &SourceFilter {
        &self.source
    }

    /// Returns the result offset.
    pub fn from(&self) -> Option<u64> {
        self.from
    }

    /// Returns the page size.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Returns the `track_total_hits` override.
    pub fn track_total_hits(&self) -> Option<bool> {
        self.track_total_hits
    }

    /// Returns true when a raw ES|QL statement drives execution.
    pub fn is_esql(&self) -> bool {
        matches!(self.mode, QueryMode::Esql(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bool_compiles_to_match_all() {
        assert_eq!(BoolQuery::new().to_value(), json!({ "bool": {} }));
    }

    #[test]
    fn test_bool_omits_empty_buckets() {
        let mut bool_query = BoolQuery::new();
        bool_query.push(Bucket::Filter, json!({ "term": { "a": 1 } }));
        bool_query.push(Bucket::Must, json!({ "term": { "b": 2 } }));

        let value = bool_query.to_value();
        let body = value["bool"].as_object().unwrap();
        assert_eq!(body.keys().collect::<Vec<_>>(), vec!["must", "filter"]);
    }

    #[test]
    fn test_remove_exact_clause() {
        let mut bool_query = BoolQuery::new();
        let clause = json!({ "exists": { "field": "_deleted_at" } });
        bool_query.push(Bucket::MustNot, clause.clone());
        bool_query.push(Bucket::MustNot, json!({ "exists": { "field": "other" } }));

        assert_eq!(bool_query.remove(Bucket::MustNot, &clause), 1);
        assert_eq!(bool_query.bucket(Bucket::MustNot).len(), 1);
        assert_eq!(bool_query.remove(Bucket::MustNot, &clause), 0);
    }

    #[test]
    fn test_minimum_should_match_only_with_should() {
        let mut bool_query = BoolQuery::new();
        bool_query.set_minimum_should_match(json!(1));
        assert!(bool_query.to_value()["bool"].get("minimum_should_match").is_none());

        bool_query.push(Bucket::Should, json!({ "term": { "a": 1 } }));
        assert_eq!(bool_query.to_value()["bool"]["minimum_should_match"], 1);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("Ascending".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_knn_candidates() {
        let knn = KnnClause::new("embedding", vec![0.1, 0.2], 5);
        let value = knn.to_value(None);
        assert_eq!(value["k"], 5);
        assert_eq!(value["num_candidates"], 10);
        assert!(value.get("similarity").is_none());
        assert!(value.get("filter").is_none());
    }

    #[test]
    fn test_knn_merges_option_filter() {
        let mut knn = KnnClause::new("embedding", vec![0.1], 2);
        knn.options
            .insert("filter".to_string(), json!({ "term": { "lang": "en" } }));

        let alone = knn.to_value(None);
        assert_eq!(alone["filter"], json!({ "term": { "lang": "en" } }));

        let merged = knn.to_value(Some(json!({ "bool": {} })));
        assert_eq!(
            merged["filter"],
            json!([{ "term": { "lang": "en" } }, { "bool": {} }])
        );
    }
}
