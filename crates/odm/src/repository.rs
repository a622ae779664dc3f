//! Persistence operations for one model type.
//!
//! A [`Repository`] owns the resolved index name of its model and carries
//! every write path: saving with generated ids and timestamps, soft and hard
//! deletes, find-or-create helpers, bulk indexing and index lifecycle.
//! Reads beyond lookups by id go through [`Repository::query`].

use std::fmt;
use std::marker::PhantomData;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::bulk;
use crate::context::OdmContext;
use crate::error::{ModelError, OdmResult};
use crate::gateway::DeleteOutcome;
use crate::model::{CREATED_AT, DELETED_AT, ID_FIELD, Model, UPDATED_AT};
use crate::query::{Filterable, QueryBuilder, decode_get_response};
use crate::types::{BulkDocument, BulkReport, Document, ResultSet};

/// Entry point for querying and persisting models of type `M`.
pub struct Repository<M> {
    context: OdmContext,
    index: String,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            index: self.index.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("index", &self.index)
            .field("model", &std::any::type_name::<M>())
            .finish()
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl<M: Model> Repository<M> {
    /// Creates a repository for `M`, resolving its prefixed index name.
    pub fn new(context: &OdmContext) -> Self {
        Self {
            index: context.config().prefixed_index(M::schema().index()),
            context: context.clone(),
            _model: PhantomData,
        }
    }

    /// Returns the prefixed index name.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Starts a new query. Soft-deleted documents are hidden by default.
    pub fn query(&self) -> QueryBuilder<M> {
        QueryBuilder::new(&self.context)
    }

    fn soft_deletes(&self) -> bool {
        self.context.config().soft_deletes && M::schema().soft_deletes()
    }

    fn model_id(&self, model: &M) -> OdmResult<String> {
        model.id().map(str::to_string).ok_or_else(|| {
            ModelError::NotPersisted {
                index: self.index.clone(),
            }
            .into()
        })
    }

    fn build(&self, source: Map<String, Value>) -> OdmResult<M> {
        M::from_source(source).map_err(|e| {
            ModelError::InvalidAttributes {
                index: self.index.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    async fn fetch(&self, id: &str) -> OdmResult<Option<Document>> {
        let response = self.context.gateway().get(&self.index, id).await?;
        Ok(response.as_ref().and_then(decode_get_response))
    }

    fn is_trashed(document: &Document) -> bool {
        document
            .source()
            .get(DELETED_AT)
            .is_some_and(|value| !value.is_null())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Fetches a model by id. Missing and soft-deleted documents yield `None`.
    pub async fn find(&self, id: &str) -> OdmResult<Option<M>> {
        match self.fetch(id).await? {
            Some(document) if self.soft_deletes() && Self::is_trashed(&document) => Ok(None),
            Some(document) => M::from_document(document).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`find`](Self::find), but a missing document is an error.
    pub async fn find_or_fail(&self, id: &str) -> OdmResult<M> {
        self.find(id).await?.ok_or_else(|| {
            ModelError::NotFound {
                index: self.index.clone(),
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Returns every visible model, up to the store's default page size.
    pub async fn all(&self) -> OdmResult<ResultSet<M>> {
        self.query().get().await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Builds a model from `attributes` and saves it.
    pub async fn create(&self, attributes: Map<String, Value>) -> OdmResult<M> {
        let model = self.build(attributes)?;
        self.save(model).await
    }

    /// Indexes the model and returns it as stored.
    ///
    /// A model without an id gets a UUID v4. With timestamps enabled,
    /// `updated_at` is always stamped and `created_at` only when absent.
    pub async fn save(&self, model: M) -> OdmResult<M> {
        let id = model
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut source = model.to_source()?;

        if M::schema().timestamps() {
            let now = now();
            if source.get(CREATED_AT).is_none_or(Value::is_null) {
                source.insert(CREATED_AT.to_string(), now.clone());
            }
            source.insert(UPDATED_AT.to_string(), now);
        }

        self.context.gateway().index(&self.index, &id, &source).await?;
        tracing::debug!("Saved document '{}' in '{}'", id, self.index);

        source.insert(ID_FIELD.to_string(), Value::String(id));
        self.build(source)
    }

    /// Merges `attributes` into a persisted model and saves it.
    pub async fn update(&self, model: M, attributes: &Map<String, Value>) -> OdmResult<M> {
        let id = self.model_id(&model)?;
        let mut source = model.to_source()?;
        for (key, value) in attributes {
            source.insert(key.clone(), value.clone());
        }
        source.insert(ID_FIELD.to_string(), Value::String(id));
        let model = self.build(source)?;
        self.save(model).await
    }

    /// Saves a persisted model unchanged, refreshing `updated_at`.
    pub async fn touch(&self, model: M) -> OdmResult<M> {
        self.model_id(&model)?;
        self.save(model).await
    }

    // ========================================================================
    // Deletes
    // ========================================================================

    /// Deletes a model: soft when soft deletes are enabled, hard otherwise.
    ///
    /// Returns false if the document did not exist.
    pub async fn delete(&self, model: &M) -> OdmResult<bool> {
        let id = self.model_id(model)?;
        self.delete_id(&id).await
    }

    async fn delete_id(&self, id: &str) -> OdmResult<bool> {
        if self.soft_deletes() {
            self.mark_deleted(id, Some(now())).await
        } else {
            self.remove(id).await
        }
    }

    /// Removes the document regardless of soft-delete settings.
    pub async fn force_delete(&self, model: &M) -> OdmResult<bool> {
        let id = self.model_id(model)?;
        self.remove(&id).await
    }

    /// Clears the soft-delete marker of a model.
    pub async fn restore(&self, model: &M) -> OdmResult<bool> {
        let id = self.model_id(model)?;
        self.mark_deleted(&id, None).await
    }

    /// Deletes the documents with the given ids, returning how many existed.
    pub async fn destroy<I, S>(&self, ids: I) -> OdmResult<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut deleted = 0;
        for id in ids {
            if self.delete_id(id.as_ref()).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn remove(&self, id: &str) -> OdmResult<bool> {
        match self.context.gateway().delete(&self.index, id).await? {
            DeleteOutcome::Deleted => {
                tracing::debug!("Deleted document '{}' from '{}'", id, self.index);
                Ok(true)
            }
            DeleteOutcome::NotFound => {
                tracing::debug!("Document '{}' not found in '{}'", id, self.index);
                Ok(false)
            }
        }
    }

    /// Sets (`Some`) or clears (`None`) the soft-delete marker by re-indexing
    /// the stored source.
    async fn mark_deleted(&self, id: &str, deleted_at: Option<Value>) -> OdmResult<bool> {
        let Some(document) = self.fetch(id).await? else {
            return Ok(false);
        };
        let (_, mut source) = document.into_parts();
        match deleted_at {
            Some(timestamp) => {
                source.insert(DELETED_AT.to_string(), timestamp);
            }
            None => {
                source.remove(DELETED_AT);
            }
        }
        self.context.gateway().index(&self.index, id, &source).await?;
        Ok(true)
    }

    // ========================================================================
    // Find or create
    // ========================================================================

    async fn first_matching(&self, attributes: &Map<String, Value>) -> OdmResult<Option<M>> {
        if attributes.is_empty() {
            return Err(ModelError::EmptyAttributes {
                index: self.index.clone(),
            }
            .into());
        }
        let mut query = self.query();
        for (field, value) in attributes {
            query.where_eq(field, value.clone())?;
        }
        query.first().await
    }

    /// Returns the first model matching `attributes`, or an unsaved model
    /// built from `attributes` merged with `values`.
    pub async fn first_or_new(
        &self,
        attributes: &Map<String, Value>,
        values: &Map<String, Value>,
    ) -> OdmResult<M> {
        match self.first_matching(attributes).await? {
            Some(model) => Ok(model),
            None => self.build(merged(attributes, values)),
        }
    }

    /// Returns the first model matching `attributes`, creating it if none does.
    pub async fn first_or_create(
        &self,
        attributes: &Map<String, Value>,
        values: &Map<String, Value>,
    ) -> OdmResult<M> {
        match self.first_matching(attributes).await? {
            Some(model) => Ok(model),
            None => self.create(merged(attributes, values)).await,
        }
    }

    /// Updates the first model matching `attributes` with `values`, or creates it.
    pub async fn update_or_create(
        &self,
        attributes: &Map<String, Value>,
        values: &Map<String, Value>,
    ) -> OdmResult<M> {
        match self.first_matching(attributes).await? {
            Some(model) => self.update(model, values).await,
            None => self.create(merged(attributes, values)).await,
        }
    }

    // ========================================================================
    // Bulk and index lifecycle
    // ========================================================================

    /// Indexes models in batches of the configured `bulk_size`.
    ///
    /// Models without an id get one assigned by the store.
    pub async fn bulk_index(&self, models: &[M]) -> OdmResult<BulkReport> {
        let documents = models
            .iter()
            .map(|model| {
                let source = model.to_source()?;
                Ok(match model.id() {
                    Some(id) => BulkDocument::new(id, source),
                    None => BulkDocument::without_id(source),
                })
            })
            .collect::<OdmResult<Vec<_>>>()?;

        Ok(bulk::bulk_index(
            self.context.gateway().as_ref(),
            &self.index,
            &documents,
            self.context.config().bulk_size,
        )
        .await)
    }

    /// Returns true if the model's index exists.
    pub async fn index_exists(&self) -> OdmResult<bool> {
        Ok(self.context.gateway().index_exists(&self.index).await?)
    }

    /// Creates the index from the schema. Returns false if it already existed.
    pub async fn create_index(&self) -> OdmResult<bool> {
        let config = self.context.config();
        let definition =
            M::schema().index_definition(&config.default_settings, config.soft_deletes);
        Ok(self
            .context
            .gateway()
            .create_index(&self.index, &definition)
            .await?)
    }

    /// Pushes the schema's current mappings to the existing index.
    pub async fn update_mapping(&self) -> OdmResult<bool> {
        let mappings = M::schema().mappings(self.context.config().soft_deletes);
        let acknowledged = self
            .context
            .gateway()
            .put_mapping(&self.index, &mappings)
            .await?;
        if !acknowledged {
            tracing::warn!("Mapping update on '{}' was not acknowledged", self.index);
        }
        Ok(acknowledged)
    }

    /// Deletes the index. Returns false if it did not exist.
    pub async fn drop_index(&self) -> OdmResult<bool> {
        Ok(self.context.gateway().delete_index(&self.index).await?)
    }

    /// Drops and creates the index.
    pub async fn recreate_index(&self) -> OdmResult<bool> {
        self.drop_index().await?;
        self.create_index().await
    }

    /// Deletes every document in the index, keeping the index itself.
    pub async fn truncate(&self) -> OdmResult<u64> {
        let deleted = self
            .context
            .gateway()
            .delete_by_query(&self.index, &json!({ "match_all": {} }))
            .await?;
        tracing::info!("Truncated '{}': {} documents deleted", self.index, deleted);
        Ok(deleted)
    }
}

fn merged(attributes: &Map<String, Value>, values: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = attributes.clone();
    for (key, value) in values {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
