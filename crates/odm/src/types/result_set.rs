//! Search result container.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The outcome of one terminal query call.
///
/// Items keep the order returned by the store. A result set produced from a
/// failed search is *degraded*: it is empty, reports a zero total and carries
/// the failure message in [`ResultSet::error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet<T> {
    items: Vec<T>,
    total: u64,
    aggregations: Map<String, Value>,
    execution_time_ms: Option<f64>,
    error: Option<String>,
    next_cursor: Option<String>,
}

impl<T> ResultSet<T> {
    /// Creates a result set from items and the matching total.
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            total,
            aggregations: Map::new(),
            execution_time_ms: None,
            error: None,
            next_cursor: None,
        }
    }

    /// Creates an empty result set describing a failed search.
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(Vec::new(), 0)
        }
    }

    /// Sets the aggregation payload.
    pub fn with_aggregations(mut self, aggregations: Map<String, Value>) -> Self {
        self.aggregations = aggregations;
        self
    }

    /// Sets the store-reported execution time.
    pub fn with_execution_time_ms(mut self, took: Option<f64>) -> Self {
        self.execution_time_ms = took;
        self
    }

    /// Sets the cursor for fetching the page after this one.
    pub fn with_next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor;
        self
    }

    /// Returns the items.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the result set, returning the items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Returns the number of documents matching the query.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns all aggregation results.
    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggregations
    }

    /// Returns a single aggregation result by name.
    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.get(name)
    }

    /// Returns the buckets of a bucket aggregation.
    pub fn buckets(&self, name: &str) -> &[Value] {
        self.aggregations
            .get(name)
            .and_then(|agg| agg.get("buckets"))
            .and_then(|buckets| buckets.as_array())
            .map(|buckets| buckets.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the execution time reported by the store, in milliseconds.
    pub fn execution_time_ms(&self) -> Option<f64> {
        self.execution_time_ms
    }

    /// Returns the failure message of a degraded result set.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true when the search failed and this set is a placeholder.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the `search_after` cursor for the next page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Returns the number of items in this set.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no items were returned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the first item.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Returns an iterator over the items.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Converts every item, keeping totals and metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ResultSet<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet {
            items,
            total: self.total,
            aggregations: self.aggregations,
            execution_time_ms: self.execution_time_ms,
            error: self.error,
            next_cursor: self.next_cursor,
        })
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
