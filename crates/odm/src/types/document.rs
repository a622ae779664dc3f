//! The decoded search hit.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document returned by the store.
///
/// `source` holds the document body exactly as stored; `metadata` holds every
/// other key found on the raw hit (`_index`, `highlight`, `sort`,
/// `inner_hits`, ...). Accessors never modify the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    score: Option<f64>,
    source: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl Document {
    /// Creates a document with no score or metadata.
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            score: None,
            source,
            metadata: Map::new(),
        }
    }

    pub(crate) fn from_parts(
        id: String,
        score: Option<f64>,
        source: Map<String, Value>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id,
            score,
            source,
            metadata,
        }
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the relevance score, if the query produced one.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Returns the stored document body.
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }

    /// Returns the hit metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Looks up a source field by dotted path (`author.name`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.source.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Looks up a source field and deserializes it.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.field(path)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Returns true when the source contains a non-null value at `path`.
    pub fn has(&self, path: &str) -> bool {
        self.field(path).is_some_and(|v| !v.is_null())
    }

    /// Returns the highlight fragments for a field.
    pub fn highlight(&self, field: &str) -> Vec<&str> {
        self.metadata
            .get("highlight")
            .and_then(|h| h.get(field))
            .and_then(|f| f.as_array())
            .map(|fragments| fragments.iter().filter_map(|f| f.as_str()).collect())
            .unwrap_or_default()
    }

    /// Returns the sort values of the hit, used for `search_after` paging.
    pub fn sort_values(&self) -> Option<&[Value]> {
        self.metadata
            .get("sort")
            .and_then(|s| s.as_array())
            .map(|values| values.as_slice())
    }

    /// Returns a single map with `_id`, `_score`, the source and metadata.
    ///
    /// Source keys win over metadata keys of the same name.
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut flat = Map::new();
        flat.insert("_id".to_string(), Value::String(self.id.clone()));
        flat.insert(
            "_score".to_string(),
            self.score.map(Value::from).unwrap_or(Value::Null),
        );
        for (key, value) in &self.metadata {
            flat.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.source {
            flat.insert(key.clone(), value.clone());
        }
        flat
    }

    /// Consumes the document, returning its id and source.
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.id, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        let source = json!({
            "title": "Rust in Action",
            "author": { "name": "Tim", "tags": ["systems", "rust"] },
            "deleted": null
        });
        let metadata = json!({
            "_index": "app_books",
            "highlight": { "title": ["<em>Rust</em> in Action"] },
            "sort": [1700000000000u64, "b-1"]
        });
        Document::from_parts(
            "b-1".to_string(),
            Some(1.5),
            source.as_object().unwrap().clone(),
            metadata.as_object().unwrap().clone(),
        )
    }

    #[test]
    fn test_field_dotted_path() {
        let doc = sample();
        assert_eq!(doc.field("title"), Some(&json!("Rust in Action")));
        assert_eq!(doc.field("author.name"), Some(&json!("Tim")));
        assert_eq!(doc.field("author.tags.1"), Some(&json!("rust")));
        assert_eq!(doc.field("author.missing"), None);
        assert_eq!(doc.get::<String>("author.name").as_deref(), Some("Tim"));
    }

    #[test]
    fn test_has_ignores_null() {
        let doc = sample();
        assert!(doc.has("title"));
        assert!(!doc.has("deleted"));
        assert!(!doc.has("nope"));
    }

    #[test]
    fn test_metadata_accessors() {
        let doc = sample();
        assert_eq!(doc.highlight("title"), vec!["<em>Rust</em> in Action"]);
        assert!(doc.highlight("body").is_empty());
        assert_eq!(doc.sort_values().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_to_flat_map() {
        let doc = sample();
        let flat = doc.to_flat_map();
        assert_eq!(flat["_id"], "b-1");
        assert_eq!(flat["_score"], 1.5);
        assert_eq!(flat["_index"], "app_books");
        assert_eq!(flat["title"], "Rust in Action");
        // Accessors leave the source untouched
        assert_eq!(doc.source().len(), 3);
    }
}
