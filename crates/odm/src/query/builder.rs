//! The fluent query builder.
//!
//! A [`QueryBuilder`] is always bound to a model's index. Mutators take
//! `&mut self` and chain; terminal calls (`get`, `first`, `count`,
//! `paginate`, ...) take `&self`, compile a snapshot of the current state and
//! can be repeated.
//!
//! When soft deletes are enabled for the model, a new builder carries exactly
//! one `must_not exists(_deleted_at)` clause. [`QueryBuilder::with_trashed`],
//! [`QueryBuilder::only_trashed`] and [`QueryBuilder::without_trashed`]
//! switch between the three visibility states; the last call wins.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::context::OdmContext;
use crate::error::{OdmResult, QueryError};
use crate::gateway::DocumentGateway;
use crate::model::{DELETED_AT, Model};
use crate::types::{Cursor, Document, PageResolver, Paginator, ResultSet};

use super::clauses;
use super::compiler::{self, CompiledQuery};
use super::decoder;
use super::filters::{Filterable, require_field};
use super::request::{
    BoolQuery, Bucket, KnnClause, KnnPlacement, QueryMode, QueryRequest, QueryWrapper,
    SortDirection, SortField,
};
use super::vector::{self, HybridQuery};

/// Which documents a builder sees with respect to soft deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedMode {
    /// Soft-deleted documents are hidden.
    #[default]
    WithoutTrashed,
    /// Soft-deleted documents are included.
    WithTrashed,
    /// Only soft-deleted documents are returned.
    OnlyTrashed,
}

/// A chainable query bound to the index of model `M`.
pub struct QueryBuilder<M> {
    gateway: Arc<dyn DocumentGateway>,
    page_resolver: Arc<dyn PageResolver>,
    index: String,
    request: QueryRequest,
    trashed: TrashedMode,
    soft_deletes: bool,
    log_queries: bool,
    default_page_size: u64,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            page_resolver: Arc::clone(&self.page_resolver),
            index: self.index.clone(),
            request: self.request.clone(),
            trashed: self.trashed,
            soft_deletes: self.soft_deletes,
            log_queries: self.log_queries,
            default_page_size: self.default_page_size,
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("gateway", &self.gateway.name())
            .field("index", &self.index)
            .field("request", &self.request)
            .field("trashed", &self.trashed)
            .field("soft_deletes", &self.soft_deletes)
            .finish()
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Creates a builder for `M`'s (prefixed) index.
    ///
    /// The soft-delete clause is injected when both the configuration and the
    /// model's schema enable soft deletes.
    pub fn new(context: &OdmContext) -> Self {
        let config = context.config();
        let schema = M::schema();
        let mut builder = Self {
            gateway: Arc::clone(context.gateway()),
            page_resolver: Arc::clone(context.page_resolver()),
            index: config.prefixed_index(schema.index()),
            request: QueryRequest::new(),
            trashed: TrashedMode::WithoutTrashed,
            soft_deletes: config.soft_deletes && schema.soft_deletes(),
            log_queries: config.logging.log_queries,
            default_page_size: config.default_page_size,
            _model: PhantomData,
        };
        builder.apply_trashed(TrashedMode::WithoutTrashed);
        builder
    }
}

impl<M> QueryBuilder<M> {
    /// Returns the index the builder searches.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the accumulated request.
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Returns the current soft-delete visibility.
    pub fn trashed_mode(&self) -> TrashedMode {
        self.trashed
    }

    /// Compiles the current state. Pure and repeatable.
    pub fn compile(&self) -> CompiledQuery {
        compiler::compile(&self.request)
    }

    /// Returns the compiled `_search` body, or the ES|QL body in ES|QL mode.
    pub fn to_body(&self) -> Value {
        match self.compile() {
            CompiledQuery::Search(search) => search.body,
            CompiledQuery::Esql(esql) => esql.body(),
        }
    }

    // ========================================================================
    // Soft deletes
    // ========================================================================

    /// Includes soft-deleted documents.
    pub fn with_trashed(&mut self) -> &mut Self {
        self.apply_trashed(TrashedMode::WithTrashed);
        self
    }

    /// Returns only soft-deleted documents.
    pub fn only_trashed(&mut self) -> &mut Self {
        self.apply_trashed(TrashedMode::OnlyTrashed);
        self
    }

    /// Hides soft-deleted documents again.
    pub fn without_trashed(&mut self) -> &mut Self {
        self.apply_trashed(TrashedMode::WithoutTrashed);
        self
    }

    fn apply_trashed(&mut self, mode: TrashedMode) {
        let deleted = clauses::exists(DELETED_AT);
        let bool_query = &mut self.request.bool_query;
        bool_query.remove(Bucket::MustNot, &deleted);
        bool_query.remove(Bucket::Must, &deleted);

        match mode {
            TrashedMode::WithoutTrashed if self.soft_deletes => {
                bool_query.push(Bucket::MustNot, deleted);
            }
            TrashedMode::OnlyTrashed => bool_query.push(Bucket::Must, deleted),
            TrashedMode::WithoutTrashed | TrashedMode::WithTrashed => {}
        }
        self.trashed = mode;
    }

    // ========================================================================
    // Sorting, paging and source filtering
    // ========================================================================

    /// Appends a sort entry. The direction accepts `asc`, `ascending`,
    /// `desc` and `descending` in any case.
    pub fn order_by(&mut self, field: &str, direction: &str) -> OdmResult<&mut Self> {
        let direction: SortDirection = direction.parse()?;
        self.sort_by(field, direction)
    }

    /// Typed form of [`QueryBuilder::order_by`].
    pub fn sort_by(&mut self, field: &str, direction: SortDirection) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.request.sort.push(SortField {
            field: field.to_string(),
            direction,
        });
        Ok(self)
    }

    /// Appends a descending sort entry.
    pub fn order_by_desc(&mut self, field: &str) -> OdmResult<&mut Self> {
        self.sort_by(field, SortDirection::Desc)
    }

    /// Newest first on `field` (typically `created_at`).
    pub fn latest(&mut self, field: &str) -> OdmResult<&mut Self> {
        self.sort_by(field, SortDirection::Desc)
    }

    /// Oldest first on `field`.
    pub fn oldest(&mut self, field: &str) -> OdmResult<&mut Self> {
        self.sort_by(field, SortDirection::Asc)
    }

    /// Sets the maximum number of hits.
    pub fn limit(&mut self, size: u64) -> &mut Self {
        self.request.size = Some(size);
        self
    }

    /// Sets the number of hits to skip.
    pub fn offset(&mut self, from: u64) -> &mut Self {
        self.request.from = Some(from);
        self
    }

    /// Selects a 1-based page: `from = (page - 1) * per_page`, `size = per_page`.
    pub fn for_page(&mut self, page: u64, per_page: u64) -> OdmResult<&mut Self> {
        if page < 1 || per_page < 1 {
            return Err(QueryError::InvalidPage { page, per_page }.into());
        }
        self.request.from = Some((page - 1).saturating_mul(per_page));
        self.request.size = Some(per_page);
        Ok(self)
    }

    /// Continues after the given sort values.
    pub fn search_after(&mut self, values: Vec<Value>) -> &mut Self {
        self.request.search_after = Some(values);
        self
    }

    /// Continues after an opaque cursor taken from [`ResultSet::next_cursor`].
    pub fn after_cursor(&mut self, cursor: &str) -> OdmResult<&mut Self> {
        let cursor = Cursor::decode(cursor)?;
        self.request.search_after = Some(cursor.into_sort_values());
        Ok(self)
    }

    /// Restricts the returned source to `fields`.
    pub fn select(&mut self, fields: &[&str]) -> &mut Self {
        self.request.source.includes = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Drops `fields` from the returned source.
    pub fn exclude(&mut self, fields: &[&str]) -> &mut Self {
        self.request.source.excludes = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Overrides `track_total_hits`.
    pub fn track_total_hits(&mut self, track: bool) -> &mut Self {
        self.request.track_total_hits = Some(track);
        self
    }

    // ========================================================================
    // Aggregations
    // ========================================================================

    /// Adds or replaces a named aggregation.
    pub fn aggregate(&mut self, name: &str, spec: Value) -> OdmResult<&mut Self> {
        require_name("aggregation", name)?;
        self.request.aggregations.insert(name.to_string(), spec);
        Ok(self)
    }

    /// `{kind: {"field": field}}`, e.g. `avg`, `sum`, `cardinality`.
    pub fn metrics_aggregation(
        &mut self,
        name: &str,
        kind: &str,
        field: &str,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.aggregate(name, json!({ kind: { "field": field } }))
    }

    /// A `terms` bucket aggregation.
    pub fn terms_aggregation(
        &mut self,
        name: &str,
        field: &str,
        size: Option<u64>,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut terms = Map::new();
        terms.insert("field".to_string(), json!(field));
        if let Some(size) = size {
            terms.insert("size".to_string(), json!(size));
        }
        self.aggregate(name, json!({ "terms": terms }))
    }

    /// A `date_histogram` with a calendar interval (`day`, `1M`, ...).
    pub fn date_histogram(
        &mut self,
        name: &str,
        field: &str,
        interval: &str,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        self.aggregate(
            name,
            json!({ "date_histogram": { "field": field, "calendar_interval": interval } }),
        )
    }

    /// A bucket aggregation of any kind: `{kind: options}`.
    pub fn bucket_aggregation(
        &mut self,
        name: &str,
        kind: &str,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_name("aggregation kind", kind)?;
        let options = options.as_object().cloned().unwrap_or_default();
        self.aggregate(name, json!({ kind: options }))
    }

    /// A pipeline aggregation reading `buckets_path`, e.g. `avg_bucket`.
    pub fn pipeline_aggregation(
        &mut self,
        name: &str,
        kind: &str,
        buckets_path: &str,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_name("aggregation kind", kind)?;
        require_name("buckets path", buckets_path)?;
        let mut body = Map::new();
        body.insert("buckets_path".to_string(), json!(buckets_path));
        clauses::merge_options(&mut body, options);
        self.aggregate(name, json!({ kind: body }))
    }

    /// A `matrix_stats` aggregation over numeric `fields`.
    pub fn matrix_aggregation(&mut self, name: &str, fields: &[&str]) -> OdmResult<&mut Self> {
        for field in fields {
            require_field(field)?;
        }
        self.aggregate(name, json!({ "matrix_stats": { "fields": fields } }))
    }

    // ========================================================================
    // Vector and alternative queries
    // ========================================================================

    /// Pure approximate nearest-neighbour search.
    ///
    /// Only `knn` is sent; bool clauses (soft-delete clause included) become
    /// its pre-filter. A replaced query and any `function_score`/`pinned`
    /// wrapper are dropped.
    pub fn vector_search(
        &mut self,
        field: &str,
        vector: Vec<f32>,
        k: u64,
        similarity: Option<f64>,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut knn = KnnClause::new(field, vector, k);
        knn.similarity = similarity;
        self.request.knn = Some((knn, KnnPlacement::Pure));
        self.request.wrapper = None;
        if matches!(self.request.mode, QueryMode::Replaced(_)) {
            self.request.mode = QueryMode::Bool;
        }
        Ok(self)
    }

    /// kNN alongside the query; the store combines both scores.
    ///
    /// Bool clauses are also sent as the knn pre-filter, next to any
    /// `filter` given in `options`.
    ///
    /// `options` may override `num_candidates` or add `boost`, `similarity`,
    /// `filter`, ...
    pub fn knn(
        &mut self,
        field: &str,
        vector: Vec<f32>,
        k: u64,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut knn = KnnClause::new(field, vector, k);
        clauses::merge_options(&mut knn.options, options);
        self.request.knn = Some((knn, KnnPlacement::WithQuery));
        Ok(self)
    }

    /// Replaces the query with a should-boosted text + vector combination.
    pub fn hybrid_search(&mut self, query: HybridQuery) -> OdmResult<&mut Self> {
        require_field(&query.vector_field)?;
        self.replace_query(query.to_query());
        Ok(self)
    }

    /// Replaces the query with `match_sparse` over a sparse-vector field.
    pub fn sparse_vector_search(
        &mut self,
        field: &str,
        tokens: &Map<String, Value>,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let options = options.as_object().cloned().unwrap_or_default();
        self.replace_query(vector::sparse_vector_query(field, tokens, &options));
        Ok(self)
    }

    /// Replaces the query with a `neural` query against a deployed model.
    pub fn semantic_search(
        &mut self,
        query: &str,
        model_id: &str,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_name("model", model_id)?;
        let options = options.as_object().cloned().unwrap_or_default();
        self.replace_query(vector::semantic_query(query, model_id, &options));
        Ok(self)
    }

    /// Replaces the query with a `rank_features` query.
    pub fn rank_features(&mut self, features: Vec<Value>, options: Value) -> &mut Self {
        let options = options.as_object().cloned().unwrap_or_default();
        self.replace_query(vector::rank_features_query(&features, &options));
        self
    }

    /// Replaces the query with a `learning_to_rank` query for a trained model.
    pub fn learning_to_rank(
        &mut self,
        model_id: &str,
        features: Vec<Value>,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_name("model", model_id)?;
        let options = options.as_object().cloned().unwrap_or_default();
        self.replace_query(vector::learning_to_rank_query(model_id, &features, &options));
        Ok(self)
    }

    fn replace_query(&mut self, query: Value) {
        if self.request.is_esql() {
            return;
        }
        self.request.mode = QueryMode::Replaced(query);
        if matches!(self.request.knn, Some((_, KnnPlacement::Pure))) {
            self.request.knn = None;
        }
    }

    /// Wraps the query in `function_score`.
    pub fn function_score(&mut self, functions: Vec<Value>, options: Value) -> &mut Self {
        self.request.wrapper = Some(QueryWrapper::FunctionScore {
            functions,
            options: options.as_object().cloned().unwrap_or_default(),
        });
        self
    }

    /// Promotes `ids` above the organic results of the query.
    pub fn pinned<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.wrapper = Some(QueryWrapper::Pinned {
            ids: ids.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Switches to a raw ES|QL statement. All DSL state is ignored from now on.
    pub fn esql(&mut self, statement: impl Into<String>) -> &mut Self {
        self.request.mode = QueryMode::Esql(statement.into());
        self
    }

    // ========================================================================
    // Response shaping
    // ========================================================================

    /// Highlights `fields`, merging `options` (`pre_tags`, `fragment_size`, ...).
    pub fn highlight(&mut self, fields: &[&str], options: Value) -> &mut Self {
        let mut field_map = Map::new();
        for field in fields {
            field_map.insert((*field).to_string(), json!({}));
        }
        let mut body = Map::new();
        body.insert("fields".to_string(), Value::Object(field_map));
        clauses::merge_options(&mut body, options);
        self.request.highlight = Some(Value::Object(body));
        self
    }

    /// Adds or replaces a named suggester.
    pub fn suggest(&mut self, name: &str, spec: Value) -> OdmResult<&mut Self> {
        require_name("suggester", name)?;
        self.request.suggest.insert(name.to_string(), spec);
        Ok(self)
    }

    /// Re-scores the top `window_size` hits with `query`.
    ///
    /// `options` go next to `rescore_query` (`query_weight`,
    /// `rescore_query_weight`, `score_mode`). Rescorers run in call order.
    pub fn rescore(&mut self, window_size: u64, query: Value, options: Value) -> &mut Self {
        let mut rescore_query = Map::new();
        rescore_query.insert("rescore_query".to_string(), query);
        clauses::merge_options(&mut rescore_query, options);
        self.request.rescore.push(json!({
            "window_size": window_size,
            "query": rescore_query
        }));
        self
    }

    /// Searches a point in time opened earlier. The index is taken from the
    /// PIT, so the request is sent without one.
    pub fn point_in_time(
        &mut self,
        id: &str,
        keep_alive: Option<&str>,
    ) -> OdmResult<&mut Self> {
        require_name("point in time", id)?;
        let mut pit = Map::new();
        pit.insert("id".to_string(), json!(id));
        if let Some(keep_alive) = keep_alive {
            pit.insert("keep_alive".to_string(), json!(keep_alive));
        }
        self.request.pit = Some(Value::Object(pit));
        Ok(self)
    }

    /// Collapses hits on `field` and returns the top collapsed hits of each
    /// group as `inner_hits` named `collapsed` (5 per group unless overridden).
    pub fn collapse_with_inner_hits(
        &mut self,
        field: &str,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut body = Map::new();
        body.insert("field".to_string(), json!(field));
        body.insert(
            "inner_hits".to_string(),
            json!({ "name": "collapsed", "size": 5 }),
        );
        clauses::merge_options(&mut body, options);
        self.request.collapse = Some(Value::Object(body));
        Ok(self)
    }

    /// Collapses hits on `field`.
    pub fn collapse(&mut self, field: &str, options: Value) -> OdmResult<&mut Self> {
        require_field(field)?;
        let mut body = Map::new();
        body.insert("field".to_string(), json!(field));
        clauses::merge_options(&mut body, options);
        self.request.collapse = Some(Value::Object(body));
        Ok(self)
    }

    /// Requests scoring explanations.
    pub fn explain(&mut self, explain: bool) -> &mut Self {
        self.request.explain = Some(explain);
        self
    }

    /// Defines a runtime field computed by a painless script.
    pub fn runtime_field(
        &mut self,
        name: &str,
        field_type: &str,
        script: &str,
        options: Value,
    ) -> OdmResult<&mut Self> {
        require_field(name)?;
        let mut body = Map::new();
        body.insert("type".to_string(), json!(field_type));
        body.insert("script".to_string(), json!(script));
        clauses::merge_options(&mut body, options);
        self.request
            .runtime_mappings
            .insert(name.to_string(), Value::Object(body));
        Ok(self)
    }

    /// Drops hits scoring below `score`.
    pub fn min_score(&mut self, score: f64) -> &mut Self {
        self.request.min_score = Some(score);
        self
    }
}

impl<M> Filterable for QueryBuilder<M> {
    fn bool_query(&self) -> &BoolQuery {
        &self.request.bool_query
    }

    fn bool_query_mut(&mut self) -> &mut BoolQuery {
        &mut self.request.bool_query
    }
}

fn require_name(kind: &str, name: &str) -> OdmResult<()> {
    if name.trim().is_empty() {
        Err(QueryError::EmptyName {
            kind: kind.to_string(),
        }
        .into())
    } else {
        Ok(())
    }
}

// ============================================================================
// Execution
// ============================================================================

impl<M> QueryBuilder<M> {
    /// Executes the query and returns raw documents.
    ///
    /// A gateway failure does not surface as an error: it yields an empty,
    /// degraded result set carrying the error message.
    pub async fn get_documents(&self) -> OdmResult<ResultSet<Document>> {
        match self.compile() {
            CompiledQuery::Search(search) => {
                if self.log_queries {
                    tracing::debug!("Searching '{}': {}", self.index, search.body);
                }
                match self.gateway.search(&self.index, &search.body).await {
                    Ok(response) => decoder::decode_search_response(&response),
                    Err(e) => {
                        tracing::error!("Search on '{}' failed: {}", self.index, e);
                        return Ok(ResultSet::degraded(e.to_string()));
                    }
                }
            }
            CompiledQuery::Esql(esql) => {
                if self.log_queries {
                    tracing::debug!("Running ES|QL: {}", esql.query);
                }
                match self.gateway.esql(&esql).await {
                    Ok(response) => decoder::decode_esql_response(&response),
                    Err(e) => {
                        tracing::error!("ES|QL query failed: {}", e);
                        return Ok(ResultSet::degraded(e.to_string()));
                    }
                }
            }
        }
    }

    /// Executes the query and returns at most one raw document.
    pub async fn first_document(&self) -> OdmResult<Option<Document>> {
        let mut probe = self.clone();
        probe.request.size = Some(1);
        Ok(probe.get_documents().await?.into_items().into_iter().next())
    }

    /// Returns the number of matching documents.
    ///
    /// Sends a `size: 0` probe; the builder keeps its own `from`/`size`.
    /// A gateway failure counts as 0.
    pub async fn count(&self) -> OdmResult<u64> {
        if self.request.is_esql() {
            return Err(QueryError::EsqlMode {
                operation: "count".to_string(),
            }
            .into());
        }
        let CompiledQuery::Search(probe) = compiler::compile_count(&self.request) else {
            return Ok(0);
        };
        if self.log_queries {
            tracing::debug!("Counting '{}': {}", self.index, probe.body);
        }
        match self.gateway.search(&self.index, &probe.body).await {
            Ok(response) => Ok(decoder::extract_total(&response)),
            Err(e) => {
                tracing::warn!("Count on '{}' failed, reporting 0: {}", self.index, e);
                Ok(0)
            }
        }
    }

    /// Returns true if at least one document matches.
    pub async fn exists(&self) -> OdmResult<bool> {
        Ok(self.count().await? > 0)
    }

    /// Returns the values of `field` across the matching documents.
    ///
    /// Documents without the field are skipped. Dotted paths are supported.
    pub async fn pluck(&self, field: &str) -> OdmResult<Vec<Value>> {
        require_field(field)?;
        let mut probe = self.clone();
        if !probe.request.is_esql() {
            probe.select(&[field]);
        }
        let documents = probe.get_documents().await?;
        Ok(documents
            .iter()
            .filter_map(|doc| doc.field(field).cloned())
            .collect())
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Executes the query and decodes the hits into models.
    pub async fn get(&self) -> OdmResult<ResultSet<M>> {
        self.get_documents().await?.try_map(M::from_document)
    }

    /// Executes the query with `size: 1` and returns the first model.
    pub async fn first(&self) -> OdmResult<Option<M>> {
        self.first_document()
            .await?
            .map(M::from_document)
            .transpose()
    }

    /// Runs one bounded search and one count for a page of results.
    ///
    /// When `page` is `None` the page comes from the context's
    /// [`PageResolver`], defaulting to 1. The builder's own `from`/`size` are
    /// left untouched.
    pub async fn paginate(&self, per_page: u64, page: Option<u64>) -> OdmResult<Paginator<M>> {
        if self.request.is_esql() {
            return Err(QueryError::EsqlMode {
                operation: "paginate".to_string(),
            }
            .into());
        }
        let page = page
            .or_else(|| self.page_resolver.current_page())
            .unwrap_or(1);

        let mut probe = self.clone();
        probe.for_page(page, per_page)?;
        let items = probe.get().await?.into_items();
        let total = self.count().await?;

        Ok(Paginator::new(items, total, per_page, page))
    }

    /// [`paginate`](Self::paginate) with the configured `default_page_size`.
    pub async fn paginate_default(&self, page: Option<u64>) -> OdmResult<Paginator<M>> {
        self.paginate(self.default_page_size, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OdmConfig;
    use crate::error::OdmError;
    use crate::gateway::testing::ScriptedGateway;
    use crate::model::testing::Article;
    use crate::types::SharedPageResolver;

    fn context(gateway: Arc<ScriptedGateway>) -> OdmContext {
        OdmContext::new(gateway, OdmConfig::default())
    }

    fn builder() -> QueryBuilder<Article> {
        QueryBuilder::new(&context(Arc::new(ScriptedGateway::default())))
    }

    fn deleted_at() -> Value {
        clauses::exists(DELETED_AT)
    }

    #[test]
    fn test_new_builder_is_prefixed_and_hides_trashed() {
        let builder = builder();
        assert_eq!(builder.index(), "app_articles");
        assert_eq!(builder.trashed_mode(), TrashedMode::WithoutTrashed);
        assert_eq!(builder.bool_query().bucket(Bucket::MustNot), &[deleted_at()]);
    }

    #[test]
    fn test_soft_delete_states() {
        let mut builder = builder();

        builder.with_trashed();
        assert!(builder.bool_query().is_empty());

        builder.only_trashed().only_trashed();
        assert!(builder.bool_query().bucket(Bucket::MustNot).is_empty());
        assert_eq!(builder.bool_query().bucket(Bucket::Must), &[deleted_at()]);

        builder.without_trashed().without_trashed();
        assert!(builder.bool_query().bucket(Bucket::Must).is_empty());
        assert_eq!(builder.bool_query().bucket(Bucket::MustNot), &[deleted_at()]);
    }

    #[test]
    fn test_soft_deletes_disabled_by_config() {
        let config = OdmConfig {
            soft_deletes: false,
            ..OdmConfig::default()
        };
        let ctx = OdmContext::new(Arc::new(ScriptedGateway::default()), config);
        let builder = QueryBuilder::<Article>::new(&ctx);
        assert!(builder.bool_query().is_empty());
    }

    #[test]
    fn test_for_page() {
        let mut builder = builder();
        builder.for_page(2, 10).unwrap();
        assert_eq!((builder.request().from(), builder.request().size()), (Some(10), Some(10)));

        builder.for_page(1, 15).unwrap();
        assert_eq!((builder.request().from(), builder.request().size()), (Some(0), Some(15)));

        let err = builder.for_page(0, 15).unwrap_err();
        assert!(matches!(err, OdmError::Query(QueryError::InvalidPage { page: 0, .. })));
        assert_eq!(builder.request().from(), Some(0));
    }

    #[test]
    fn test_order_by_parses_direction() {
        let mut builder = builder();
        builder.order_by("views", "DESC").unwrap();
        builder.oldest("created_at").unwrap();
        assert!(builder.order_by("title", "up").is_err());

        let body = builder.to_body();
        assert_eq!(body["sort"], json!([{ "views": "desc" }, { "created_at": "asc" }]));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let mut builder = builder();
        builder.where_eq("status", "published").unwrap();
        builder.aggregate("tags", json!({ "terms": { "field": "tags" } })).unwrap();
        builder.select(&["title"]).limit(5);

        let first = builder.compile();
        let second = builder.compile();
        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_overwrites_in_place() {
        let mut builder = builder();
        builder.terms_aggregation("a", "tag", None).unwrap();
        builder.metrics_aggregation("b", "avg", "views").unwrap();
        builder.terms_aggregation("a", "tag", Some(5)).unwrap();

        let aggs = builder.to_body()["aggs"].clone();
        let names: Vec<_> = aggs.as_object().unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(aggs["a"]["terms"]["size"], 5);
        assert!(builder.aggregate("", json!({})).is_err());
    }

    #[test]
    fn test_vector_search_is_pure_knn_with_filter() {
        let mut builder = builder();
        builder.where_eq("lang", "en").unwrap();
        builder.vector_search("embedding", vec![0.1, 0.2], 5, Some(0.7)).unwrap();

        let body = builder.to_body();
        assert!(body.get("query").is_none());
        assert_eq!(body["knn"]["k"], 5);
        assert_eq!(body["knn"]["num_candidates"], 10);
        assert_eq!(body["knn"]["similarity"], 0.7);
        let filter = &body["knn"]["filter"]["bool"];
        assert_eq!(filter["must"][0]["term"]["lang"], "en");
        assert_eq!(filter["must_not"][0], deleted_at());
    }

    #[test]
    fn test_knn_with_query_keeps_query() {
        let mut builder = builder();
        builder
            .knn("embedding", vec![1.0], 3, json!({ "boost": 0.5 }))
            .unwrap();
        let body = builder.to_body();
        assert!(body.get("query").is_some());
        assert_eq!(body["knn"]["boost"], 0.5);
    }

    #[test]
    fn test_knn_with_query_is_prefiltered() {
        let mut builder = builder();
        builder.where_eq("lang", "en").unwrap();
        builder.knn("embedding", vec![1.0], 3, Value::Null).unwrap();

        let body = builder.to_body();
        assert_eq!(body["query"]["bool"]["must"][0]["term"]["lang"], "en");
        let filter = &body["knn"]["filter"]["bool"];
        assert_eq!(filter["must"][0]["term"]["lang"], "en");
        assert_eq!(filter["must_not"][0], deleted_at());
    }

    #[test]
    fn test_knn_keeps_caller_filter_next_to_bool_filter() {
        let mut builder = builder();
        builder
            .knn(
                "embedding",
                vec![1.0],
                3,
                json!({ "filter": { "term": { "status": "published" } } }),
            )
            .unwrap();

        let filter = builder.to_body()["knn"]["filter"].clone();
        assert_eq!(filter[0], json!({ "term": { "status": "published" } }));
        assert_eq!(filter[1]["bool"]["must_not"][0], deleted_at());
    }

    #[test]
    fn test_knn_without_clauses_has_no_filter() {
        let mut builder = builder();
        builder.with_trashed();
        builder.knn("embedding", vec![1.0], 3, Value::Null).unwrap();
        assert!(builder.to_body()["knn"].get("filter").is_none());
    }

    #[test]
    fn test_vector_search_drops_wrapper() {
        let mut builder = builder();
        builder.function_score(vec![json!({ "weight": 2 })], Value::Null);
        builder.vector_search("embedding", vec![1.0], 3, None).unwrap();
        assert!(builder.request().wrapper.is_none());

        builder.knn("embedding", vec![1.0], 3, Value::Null).unwrap();
        let body = builder.to_body();
        assert!(body["query"].get("function_score").is_none());
        assert!(body["query"].get("bool").is_some());
    }

    #[test]
    fn test_replacing_query_clears_pure_knn() {
        let mut builder = builder();
        builder.vector_search("embedding", vec![1.0], 3, None).unwrap();
        let tokens = json!({ "rust": 1.0 });
        builder
            .sparse_vector_search("tokens", tokens.as_object().unwrap(), Value::Null)
            .unwrap();

        let body = builder.to_body();
        assert!(body.get("knn").is_none());
        let query = &body["query"]["bool"];
        assert!(query["must"][0].get("match_sparse").is_some());
        assert_eq!(query["filter"][0]["bool"]["must_not"][0], deleted_at());
    }

    #[test]
    fn test_hybrid_search_uses_should_boost() {
        let mut builder = builder();
        builder.with_trashed();
        builder
            .hybrid_search(
                HybridQuery::new("rust", "embedding", vec![0.1], 4).with_weights(0.4, 0.6),
            )
            .unwrap();

        let body = builder.to_body();
        let should = &body["query"]["bool"]["should"];
        assert_eq!(should[0]["multi_match"]["boost"], 0.4);
        assert_eq!(should[1]["knn"]["boost"], 0.6);
    }

    #[test]
    fn test_last_wrapper_wins() {
        let mut builder = builder();
        builder.function_score(vec![json!({ "weight": 2 })], Value::Null);
        builder.pinned(["a", "b"]);

        let body = builder.to_body();
        assert!(body["query"].get("function_score").is_none());
        assert_eq!(body["query"]["pinned"]["ids"], json!(["a", "b"]));
        assert_eq!(body["query"]["pinned"]["organic"]["bool"]["must_not"][0], deleted_at());
    }

    #[test]
    fn test_esql_mode_is_sticky() {
        let mut builder = builder();
        builder.esql("FROM app_articles | LIMIT 3");
        builder.rank_features(vec![json!({ "field": "pagerank" })], Value::Null);
        assert_eq!(builder.to_body(), json!({ "query": "FROM app_articles | LIMIT 3" }));
    }

    #[test]
    fn test_response_shaping_sections() {
        let mut builder = builder();
        builder.highlight(&["title"], json!({ "pre_tags": ["<b>"] }));
        builder.collapse("author", Value::Null).unwrap();
        builder.suggest("fix", json!({ "text": "rsut", "term": { "field": "title" } })).unwrap();
        builder
            .runtime_field("day", "keyword", "emit('x')", Value::Null)
            .unwrap();
        builder.min_score(0.5).explain(true);

        let body = builder.to_body();
        assert_eq!(body["highlight"]["fields"]["title"], json!({}));
        assert_eq!(body["highlight"]["pre_tags"], json!(["<b>"]));
        assert_eq!(body["collapse"]["field"], "author");
        assert_eq!(body["suggest"]["fix"]["text"], "rsut");
        assert_eq!(body["runtime_mappings"]["day"]["type"], "keyword");
        assert_eq!(body["min_score"], 0.5);
        assert_eq!(body["explain"], true);
    }

    #[test]
    fn test_rescore_point_in_time_and_inner_hits() {
        let mut builder = builder();
        builder.rescore(
            50,
            json!({ "match_phrase": { "title": "rust odm" } }),
            json!({ "query_weight": 0.7 }),
        );
        builder
            .point_in_time("pit-1", Some("1m"))
            .unwrap()
            .collapse_with_inner_hits("author", json!({ "inner_hits": { "name": "top", "size": 2 } }))
            .unwrap();

        let body = builder.to_body();
        assert_eq!(body["rescore"][0]["window_size"], 50);
        assert_eq!(
            body["rescore"][0]["query"]["rescore_query"]["match_phrase"]["title"],
            "rust odm"
        );
        assert_eq!(body["rescore"][0]["query"]["query_weight"], 0.7);
        assert_eq!(body["pit"], json!({ "id": "pit-1", "keep_alive": "1m" }));
        assert_eq!(body["collapse"]["field"], "author");
        assert_eq!(body["collapse"]["inner_hits"], json!({ "name": "top", "size": 2 }));
        assert!(builder.point_in_time(" ", None).is_err());
    }

    #[test]
    fn test_collapse_with_default_inner_hits() {
        let mut builder = builder();
        builder.collapse_with_inner_hits("author", Value::Null).unwrap();
        assert_eq!(
            builder.to_body()["collapse"]["inner_hits"],
            json!({ "name": "collapsed", "size": 5 })
        );
    }

    #[test]
    fn test_learning_to_rank_keeps_filters() {
        let mut builder = builder();
        builder
            .learning_to_rank("ltr-v1", vec![json!({ "field": "views" })], json!({ "boost": 2 }))
            .unwrap();

        let query = &builder.to_body()["query"]["bool"];
        let ltr = &query["must"][0]["learning_to_rank"];
        assert_eq!(ltr["model_id"], "ltr-v1");
        assert_eq!(ltr["features"][0]["field"], "views");
        assert_eq!(ltr["boost"], 2);
        assert_eq!(query["filter"][0]["bool"]["must_not"][0], deleted_at());
        assert!(builder.learning_to_rank("", vec![], Value::Null).is_err());
    }

    #[test]
    fn test_bucket_pipeline_and_matrix_aggregations() {
        let mut builder = builder();
        builder
            .bucket_aggregation("by_range", "range", json!({ "field": "views", "ranges": [{ "to": 10 }] }))
            .unwrap()
            .pipeline_aggregation("avg_views", "avg_bucket", "by_month>views", Value::Null)
            .unwrap()
            .matrix_aggregation("stats", &["views", "likes"])
            .unwrap();

        let aggs = &builder.to_body()["aggs"];
        assert_eq!(aggs["by_range"]["range"]["field"], "views");
        assert_eq!(aggs["avg_views"], json!({ "avg_bucket": { "buckets_path": "by_month>views" } }));
        assert_eq!(aggs["stats"], json!({ "matrix_stats": { "fields": ["views", "likes"] } }));
        assert!(builder.pipeline_aggregation("x", "avg_bucket", "", Value::Null).is_err());
        assert!(builder.matrix_aggregation("m", &["views", ""]).is_err());
    }

    #[test]
    fn test_after_cursor() {
        let mut builder = builder();
        let cursor = Cursor::new(vec![json!(42), json!("id-9")]).encode();
        builder.after_cursor(&cursor).unwrap();
        assert_eq!(builder.to_body()["search_after"], json!([42, "id-9"]));
        assert!(builder.after_cursor("%%%").is_err());
    }

    #[tokio::test]
    async fn test_get_decodes_models() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.respond(Ok(json!({
            "took": 2,
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    { "_id": "1", "_score": 1.5, "_source": { "title": "One", "views": 3 } },
                    { "_id": "2", "_score": 1.0, "_source": { "title": "Two" } }
                ]
            }
        })));
        let builder = QueryBuilder::<Article>::new(&context(gateway.clone()));

        let results = builder.get().await.unwrap();
        assert_eq!(results.total(), 2);
        assert_eq!(results.items()[0].id.as_deref(), Some("1"));
        assert_eq!(results.items()[0].views, 3);
        assert_eq!(results.items()[1].title, "Two");

        let recorded = gateway.recorded();
        assert_eq!(recorded[0].0, "app_articles");
    }

    #[tokio::test]
    async fn test_get_degrades_on_gateway_error() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.respond(Err(crate::error::GatewayError::Unavailable {
            message: "no nodes".to_string(),
        }));
        let builder = QueryBuilder::<Article>::new(&context(gateway));

        let results = builder.get().await.unwrap();
        assert!(results.is_empty());
        assert!(results.is_degraded());
        assert!(results.error().unwrap().contains("no nodes"));
    }

    #[tokio::test]
    async fn test_count_leaves_builder_untouched() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.respond(Ok(json!({ "hits": { "total": { "value": 42 }, "hits": [] } })));
        let mut builder = QueryBuilder::<Article>::new(&context(gateway.clone()));
        builder.for_page(3, 10).unwrap();

        assert_eq!(builder.count().await.unwrap(), 42);
        assert_eq!(builder.request().from(), Some(20));
        assert_eq!(builder.request().size(), Some(10));

        let (_, body) = &gateway.recorded()[0];
        assert_eq!(body["size"], 0);
        assert_eq!(body["track_total_hits"], true);
        assert!(body.get("from").is_none());
    }

    #[tokio::test]
    async fn test_count_rejects_esql() {
        let mut builder = builder();
        builder.esql("FROM x");
        let err = builder.count().await.unwrap_err();
        assert!(matches!(err, OdmError::Query(QueryError::EsqlMode { .. })));
    }

    #[tokio::test]
    async fn test_first_sends_size_one() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut builder = QueryBuilder::<Article>::new(&context(gateway.clone()));
        builder.limit(50);

        assert!(builder.first().await.unwrap().is_none());
        assert_eq!(gateway.recorded()[0].1["size"], 1);
        assert_eq!(builder.request().size(), Some(50));
    }

    #[tokio::test]
    async fn test_paginate_uses_page_resolver() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.respond(Ok(json!({
            "hits": { "total": { "value": 31 }, "hits": [{ "_id": "21", "_source": { "title": "t" } }] }
        })));
        gateway.respond(Ok(json!({ "hits": { "total": { "value": 31 }, "hits": [] } })));

        let resolver = Arc::new(SharedPageResolver::new());
        resolver.set_page(Some(3));
        let ctx = context(gateway.clone()).with_page_resolver(resolver);
        let builder = QueryBuilder::<Article>::new(&ctx);

        let page = builder.paginate(10, None).await.unwrap();
        assert_eq!(page.current_page(), 3);
        assert_eq!(page.total(), 31);
        assert_eq!(page.last_page(), 4);
        assert_eq!(page.items().len(), 1);

        let recorded = gateway.recorded();
        assert_eq!(recorded[0].1["from"], 20);
        assert_eq!(recorded[0].1["size"], 10);
        assert!(builder.request().from().is_none());
    }

    #[tokio::test]
    async fn test_pluck_selects_field() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.respond(Ok(json!({
            "hits": { "hits": [
                { "_id": "1", "_source": { "title": "A" } },
                { "_id": "2", "_source": {} }
            ] }
        })));
        let builder = QueryBuilder::<Article>::new(&context(gateway.clone()));

        let titles = builder.pluck("title").await.unwrap();
        assert_eq!(titles, vec![json!("A")]);
        assert_eq!(gateway.recorded()[0].1["_source"]["includes"], json!(["title"]));
    }
}
