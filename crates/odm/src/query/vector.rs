//! Dense, sparse and hybrid vector queries.
//!
//! Hybrid search combines a boosted `multi_match` clause and a boosted `knn`
//! query clause under one `bool.should`. Each clause contributes its own
//! score multiplied by its weight, so the weights set the relative influence
//! of text relevance and vector similarity.

use serde_json::{Map, Value, json};

use super::clauses;
use super::request::num_candidates_for;

/// Relative weights for the two halves of a hybrid search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    /// Boost applied to the text clause.
    pub text: f64,
    /// Boost applied to the vector clause.
    pub vector: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            text: 1.0,
            vector: 1.0,
        }
    }
}

/// Inputs of a hybrid text + vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    /// The full-text query string.
    pub text: String,
    /// Fields for the text half; empty means all fields.
    pub text_fields: Vec<String>,
    /// The `dense_vector` field.
    pub vector_field: String,
    /// The query vector.
    pub vector: Vec<f32>,
    /// Number of neighbours for the vector half.
    pub k: u64,
    /// Weights of the two halves.
    pub weights: HybridWeights,
}

impl HybridQuery {
    /// Creates a hybrid query with equal weights over all text fields.
    pub fn new(
        text: impl Into<String>,
        vector_field: impl Into<String>,
        vector: Vec<f32>,
        k: u64,
    ) -> Self {
        Self {
            text: text.into(),
            text_fields: Vec::new(),
            vector_field: vector_field.into(),
            vector,
            k,
            weights: HybridWeights::default(),
        }
    }

    /// Restricts the text half to the given fields.
    pub fn with_text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the text and vector weights.
    pub fn with_weights(mut self, text: f64, vector: f64) -> Self {
        self.weights = HybridWeights { text, vector };
        self
    }

    /// Compiles to the should-boosted bool query.
    pub fn to_query(&self) -> Value {
        let mut text_clause = clauses::multi_match(&self.text, &self.text_fields, None);
        text_clause["multi_match"]["boost"] = json!(self.weights.text);

        let vector_clause = json!({
            "knn": {
                "field": self.vector_field,
                "query_vector": self.vector,
                "num_candidates": num_candidates_for(self.k),
                "boost": self.weights.vector
            }
        });

        json!({ "bool": { "should": [text_clause, vector_clause] } })
    }
}

/// `{"match_sparse": {field: {"tokens": tokens}}}` merged with `options`.
pub fn sparse_vector_query(
    field: &str,
    tokens: &Map<String, Value>,
    options: &Map<String, Value>,
) -> Value {
    let mut body = Map::new();
    body.insert(field.to_string(), json!({ "tokens": tokens }));
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    json!({ "match_sparse": body })
}

/// `{"neural": {"query": ..., "model_id": ...}}` merged with `options`.
pub fn semantic_query(query: &str, model_id: &str, options: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), json!(query));
    body.insert("model_id".to_string(), json!(model_id));
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    json!({ "neural": body })
}

/// `{"rank_features": {"features": [...]}}` merged with `options`.
pub fn rank_features_query(features: &[Value], options: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("features".to_string(), json!(features));
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    json!({ "rank_features": body })
}

/// `{"learning_to_rank": {"model_id", "features", ...options}}`.
pub fn learning_to_rank_query(
    model_id: &str,
    features: &[Value],
    options: &Map<String, Value>,
) -> Value {
    let mut body = Map::new();
    body.insert("model_id".to_string(), json!(model_id));
    body.insert("features".to_string(), json!(features));
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    json!({ "learning_to_rank": body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_should_boost() {
        let query = HybridQuery::new("rust async", "embedding", vec![0.5, 0.5], 4)
            .with_text_fields(["title", "body"])
            .with_weights(0.3, 0.7)
            .to_query();

        let should = query["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(should[0]["multi_match"]["query"], "rust async");
        assert_eq!(should[0]["multi_match"]["fields"], json!(["title", "body"]));
        assert_eq!(should[0]["multi_match"]["boost"], 0.3);
        assert_eq!(should[1]["knn"]["field"], "embedding");
        assert_eq!(should[1]["knn"]["num_candidates"], 8);
        assert_eq!(should[1]["knn"]["boost"], 0.7);
    }

    #[test]
    fn test_sparse_vector_query() {
        let tokens = json!({ "rust": 1.2, "tokio": 0.8 });
        let options = json!({ "boost": 2 });
        let query = sparse_vector_query(
            "ml.tokens",
            tokens.as_object().unwrap(),
            options.as_object().unwrap(),
        );
        assert_eq!(query["match_sparse"]["ml.tokens"]["tokens"]["rust"], 1.2);
        assert_eq!(query["match_sparse"]["boost"], 2);
    }

    #[test]
    fn test_semantic_query() {
        let query = semantic_query("fast web servers", "my-model", &Map::new());
        assert_eq!(query["neural"]["model_id"], "my-model");
    }
}
