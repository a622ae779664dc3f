//! The `where` family and the other bool-clause builders.
//!
//! [`Filterable`] is implemented by [`QueryBuilder`](super::QueryBuilder) and
//! by [`ClauseBuilder`], the sub-builder handed to `nested`, `has_child` and
//! `has_parent` closures. Every fallible call validates its input before
//! touching the bool query, so a failed call leaves the builder unchanged.

use serde_json::{Map, Value, json};

use crate::error::{OdmResult, QueryError, QueryResult};

use super::clauses;
use super::operator::Operator;
use super::request::{BoolQuery, Bucket};

/// Rejects empty or whitespace-only field names.
pub(crate) fn require_field(field: &str) -> QueryResult<()> {
    if field.trim().is_empty() {
        Err(QueryError::EmptyField)
    } else {
        Ok(())
    }
}

fn owned_fields(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_string()).collect()
}

/// Chainable builders that add clauses to a bool query.
pub trait Filterable: Sized {
    /// Returns the bool query being built.
    fn bool_query(&self) -> &BoolQuery;

    /// Returns the bool query being built, mutably.
    fn bool_query_mut(&mut self) -> &mut BoolQuery;

    // ========================================================================
    // Comparison operators
    // ========================================================================

    /// Adds `field <operator> value` to `must`, or to `must_not` for the
    /// negated operators.
    fn where_(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        let operator: Operator = operator.parse()?;
        self.where_op(field, operator, value)
    }

    /// Typed form of [`Filterable::where_`].
    fn where_op(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::for_operator(field, operator, value.into())?;
        let bucket = if operator.is_negated() {
            Bucket::MustNot
        } else {
            Bucket::Must
        };
        self.bool_query_mut().push(bucket, clause);
        Ok(self)
    }

    /// Adds `field = value` to `must`.
    fn where_eq(&mut self, field: &str, value: impl Into<Value>) -> OdmResult<&mut Self> {
        self.where_op(field, Operator::Eq, value)
    }

    /// Adds `field <operator> value` to `should`. Negated operators are
    /// wrapped in a `bool.must_not`.
    fn or_where(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        let operator: Operator = operator.parse()?;
        self.or_where_op(field, operator, value)
    }

    /// Typed form of [`Filterable::or_where`].
    fn or_where_op(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::for_operator(field, operator, value.into())?;
        let clause = if operator.is_negated() {
            clauses::negate(clause)
        } else {
            clause
        };
        self.bool_query_mut().push(Bucket::Should, clause);
        Ok(self)
    }

    /// Adds `field = value` to `should`.
    fn or_where_eq(&mut self, field: &str, value: impl Into<Value>) -> OdmResult<&mut Self> {
        self.or_where_op(field, Operator::Eq, value)
    }

    /// Adds a `terms` clause to `must`.
    fn where_in(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> OdmResult<&mut Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_op(field, Operator::In, values)
    }

    /// Adds a `terms` clause to `must_not`.
    fn where_not_in(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> OdmResult<&mut Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.where_op(field, Operator::NotIn, values)
    }

    /// Adds a `terms` clause to `should`.
    fn or_where_in(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> OdmResult<&mut Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.or_where_op(field, Operator::In, values)
    }

    /// Adds an inclusive range to `must`.
    fn where_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        self.where_op(field, Operator::Between, json!([low.into(), high.into()]))
    }

    /// Adds an inclusive range to `must_not`.
    fn where_not_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> OdmResult<&mut Self> {
        self.where_op(field, Operator::NotBetween, json!([low.into(), high.into()]))
    }

    // ========================================================================
    // Field existence
    // ========================================================================

    /// Matches documents without a value for `field`.
    fn where_null(&mut self, field: &str) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.bool_query_mut()
            .push(Bucket::MustNot, clauses::exists(field));
        Ok(self)
    }

    /// Matches documents with a value for `field`.
    fn where_not_null(&mut self, field: &str) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.bool_query_mut().push(Bucket::Must, clauses::exists(field));
        Ok(self)
    }

    /// Adds "`field` is missing" to `should`.
    fn or_where_null(&mut self, field: &str) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.bool_query_mut()
            .push(Bucket::Should, clauses::negate(clauses::exists(field)));
        Ok(self)
    }

    /// Adds "`field` is present" to `should`.
    fn or_where_not_null(&mut self, field: &str) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.bool_query_mut()
            .push(Bucket::Should, clauses::exists(field));
        Ok(self)
    }

    // ========================================================================
    // Raw clauses
    // ========================================================================

    /// Adds a raw clause to `filter` (no scoring).
    fn filter(&mut self, clause: Value) -> &mut Self {
        self.bool_query_mut().push(Bucket::Filter, clause);
        self
    }

    /// Adds a raw clause to the given bucket.
    fn where_raw(&mut self, bucket: Bucket, clause: Value) -> &mut Self {
        self.bool_query_mut().push(bucket, clause);
        self
    }

    /// Sets `minimum_should_match` (a count or a percentage such as `"75%"`).
    fn minimum_should_match(&mut self, value: impl Into<Value>) -> &mut Self {
        self.bool_query_mut().set_minimum_should_match(value.into());
        self
    }

    // ========================================================================
    // Full-text
    // ========================================================================

    /// Fuzzy full-text search across all fields.
    fn search(&mut self, term: &str) -> &mut Self {
        self.search_fields(term, &[], Some("AUTO"))
    }

    /// Full-text search across the given fields (all fields when empty).
    fn search_fields(&mut self, term: &str, fields: &[&str], fuzziness: Option<&str>) -> &mut Self {
        let clause = clauses::multi_match(term, &owned_fields(fields), fuzziness);
        self.bool_query_mut().push(Bucket::Must, clause);
        self
    }

    /// Adds a `match_phrase` clause to `must`.
    fn match_phrase(&mut self, field: &str, phrase: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::field_query("match_phrase", field, json!(phrase), options);
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Adds a `fuzzy` clause to `must`.
    fn fuzzy(&mut self, field: &str, value: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::field_query("fuzzy", field, json!(value), options);
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Adds a `regexp` clause to `must`.
    fn regexp(&mut self, field: &str, pattern: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::field_query("regexp", field, json!(pattern), options);
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Adds a `prefix` clause to `must`.
    fn prefix(&mut self, field: &str, value: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = clauses::field_query("prefix", field, json!(value), options);
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Adds a `combined_fields` clause to `must`.
    fn combined_fields(&mut self, query: &str, fields: &[&str], options: Value) -> &mut Self {
        let mut body = Map::new();
        body.insert("query".to_string(), json!(query));
        body.insert("fields".to_string(), json!(fields));
        clauses::merge_options(&mut body, options);
        self.bool_query_mut()
            .push(Bucket::Must, json!({ "combined_fields": body }));
        self
    }

    /// Adds a `more_like_this` clause to `must`.
    fn more_like_this(&mut self, fields: &[&str], like: Value, options: Value) -> &mut Self {
        let mut body = Map::new();
        body.insert("fields".to_string(), json!(fields));
        body.insert("like".to_string(), like);
        body.insert("min_term_freq".to_string(), json!(1));
        body.insert("max_query_terms".to_string(), json!(12));
        body.insert("min_doc_freq".to_string(), json!(1));
        clauses::merge_options(&mut body, options);
        self.bool_query_mut()
            .push(Bucket::Must, json!({ "more_like_this": body }));
        self
    }

    // ========================================================================
    // Scoring and specialized queries
    // ========================================================================

    /// Adds a `script` clause to `must`. The language defaults to painless.
    fn script(&mut self, source: &str, params: Value, lang: Option<&str>) -> &mut Self {
        let params = if params.is_null() { json!({}) } else { params };
        let clause = json!({
            "script": {
                "script": {
                    "lang": lang.unwrap_or("painless"),
                    "source": source,
                    "params": params
                }
            }
        });
        self.bool_query_mut().push(Bucket::Must, clause);
        self
    }

    /// Adds a `terms_set` clause to `must`.
    fn terms_set(
        &mut self,
        field: &str,
        terms: Vec<Value>,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut body = Map::new();
        body.insert("terms".to_string(), Value::Array(terms));
        clauses::merge_options(&mut body, options);
        self.bool_query_mut()
            .push(Bucket::Must, json!({ "terms_set": { field: body } }));
        Ok(self)
    }

    /// Adds a `rank_feature` clause to `must`.
    fn rank_feature(&mut self, field: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut body = Map::new();
        body.insert("field".to_string(), json!(field));
        clauses::merge_options(&mut body, options);
        self.bool_query_mut()
            .push(Bucket::Must, json!({ "rank_feature": body }));
        Ok(self)
    }

    /// Adds a `distance_feature` clause to `must`.
    fn distance_feature(
        &mut self,
        field: &str,
        origin: Value,
        pivot: &str,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({
            "distance_feature": { "field": field, "origin": origin, "pivot": pivot }
        });
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Adds a `percolate` clause to `must`.
    fn percolate(&mut self, field: &str, document: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({ "percolate": { "field": field, "document": document } });
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    // ========================================================================
    // Geo and shape filters
    // ========================================================================

    /// Filters to points within `distance` (e.g. `"10km"`) of a location.
    fn geo_distance(
        &mut self,
        field: &str,
        lat: f64,
        lon: f64,
        distance: &str,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({
            "geo_distance": { "distance": distance, field: { "lat": lat, "lon": lon } }
        });
        self.bool_query_mut().push(Bucket::Filter, clause);
        Ok(self)
    }

    /// Filters to points inside a bounding box.
    fn geo_bounding_box(
        &mut self,
        field: &str,
        top_left: Value,
        bottom_right: Value,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({
            "geo_bounding_box": { field: { "top_left": top_left, "bottom_right": bottom_right } }
        });
        self.bool_query_mut().push(Bucket::Filter, clause);
        Ok(self)
    }

    /// Filters to points inside a polygon.
    fn geo_polygon(&mut self, field: &str, points: Vec<Value>) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({ "geo_polygon": { field: { "points": points } } });
        self.bool_query_mut().push(Bucket::Filter, clause);
        Ok(self)
    }

    /// Filters by a GeoJSON shape relation (default `intersects`).
    fn geo_shape(
        &mut self,
        field: &str,
        shape: Value,
        relation: Option<&str>,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({
            "geo_shape": { field: { "shape": shape, "relation": relation.unwrap_or("intersects") } }
        });
        self.bool_query_mut().push(Bucket::Filter, clause);
        Ok(self)
    }

    /// Filters by a cartesian shape relation (default `intersects`).
    fn shape(&mut self, field: &str, shape: Value, relation: Option<&str>) -> OdmResult<&mut Self> {
        require_field(field)?;
        let clause = json!({
            "shape": { field: { "shape": shape, "relation": relation.unwrap_or("intersects") } }
        });
        self.bool_query_mut().push(Bucket::Filter, clause);
        Ok(self)
    }

    // ========================================================================
    // Joins
    // ========================================================================

    /// Adds a `nested` query over `path`, built by `build`.
    ///
    /// The score mode defaults to `avg`.
    fn nested<F>(&mut self, path: &str, build: F, score_mode: Option<&str>) -> OdmResult<&mut Self>
    where
        F: FnOnce(&mut ClauseBuilder) -> OdmResult<()>,
    {
        require_field(path)?;
        let inner = ClauseBuilder::build_with(build)?;
        let clause = json!({
            "nested": {
                "path": path,
                "query": inner,
                "score_mode": score_mode.unwrap_or("avg")
            }
        });
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Matches children whose parent of `parent_type` matches `build`.
    fn has_parent<F>(&mut self, parent_type: &str, build: F) -> OdmResult<&mut Self>
    where
        F: FnOnce(&mut ClauseBuilder) -> OdmResult<()>,
    {
        require_field(parent_type)?;
        let inner = ClauseBuilder::build_with(build)?;
        let clause = json!({ "has_parent": { "parent_type": parent_type, "query": inner } });
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }

    /// Matches parents with a child of `child_type` matching `build`.
    ///
    /// The score mode defaults to `none`.
    fn has_child<F>(
        &mut self,
        child_type: &str,
        build: F,
        score_mode: Option<&str>,
    ) -> OdmResult<&mut Self>
    where
        F: FnOnce(&mut ClauseBuilder) -> OdmResult<()>,
    {
        require_field(child_type)?;
        let inner = ClauseBuilder::build_with(build)?;
        let clause = json!({
            "has_child": {
                "type": child_type,
                "query": inner,
                "score_mode": score_mode.unwrap_or("none")
            }
        });
        self.bool_query_mut().push(Bucket::Must, clause);
        Ok(self)
    }
}

/// A standalone bool-query builder for nested and join queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseBuilder {
    bool_query: BoolQuery,
}

impl ClauseBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `build` on a fresh builder and returns the compiled bool query.
    fn build_with<F>(build: F) -> OdmResult<Value>
    where
        F: FnOnce(&mut ClauseBuilder) -> OdmResult<()>,
    {
        let mut builder = ClauseBuilder::new();
        build(&mut builder)?;
        Ok(builder.to_query())
    }

    /// Compiles to `{"bool": {...}}`.
    pub fn to_query(&self) -> Value {
        self.bool_query.to_value()
    }

    /// Consumes the builder, returning the bool query.
    pub fn into_bool_query(self) -> BoolQuery {
        self.bool_query
    }
}

impl Filterable for ClauseBuilder {
    fn bool_query(&self) -> &BoolQuery {
        &self.bool_query
    }

    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.bool_query
    }
}
