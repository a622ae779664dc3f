//! Typed models bound to Elasticsearch indices.
//!
//! A model is any serde type that names its [`ModelSchema`] and exposes its
//! id. The default conversions go through `serde_json`, with the document id
//! carried in an `id` field that is never written into the stored source.
//!
//! ```rust
//! use std::sync::LazyLock;
//!
//! use elastic_odm::model::{FieldType, Model, ModelSchema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Post {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     title: String,
//! }
//!
//! static POST_SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
//!     ModelSchema::builder("posts")
//!         .field("title", FieldType::Text)
//!         .build()
//! });
//!
//! impl Model for Post {
//!     fn schema() -> &'static ModelSchema {
//!         &POST_SCHEMA
//!     }
//!
//!     fn id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//!
//!     fn set_id(&mut self, id: String) {
//!         self.id = Some(id);
//!     }
//! }
//! ```

mod attributes;
mod relation;
mod schema;

pub use attributes::Attributes;
pub use relation::{Relation, RelationConstraint};
pub use schema::{
    CREATED_AT, DELETED_AT, FieldDescriptor, FieldType, IndexDefinition, ModelSchema,
    ModelSchemaBuilder, UPDATED_AT,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{DecodeError, ModelError, OdmResult};
use crate::types::Document;

/// Key under which the document id travels through serde.
pub const ID_FIELD: &str = "id";

/// A type stored as documents in one index.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the schema describing the model's index.
    fn schema() -> &'static ModelSchema;

    /// Returns the document id, if the model has been persisted or assigned one.
    fn id(&self) -> Option<&str>;

    /// Assigns the document id.
    fn set_id(&mut self, id: String);

    /// Builds a model from stored attributes (the id included under `id`).
    fn from_source(source: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(source))
    }

    /// Builds a model from a decoded document.
    fn from_document(document: Document) -> OdmResult<Self> {
        let (id, mut source) = document.into_parts();
        source.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        Self::from_source(source).map_err(|e| {
            DecodeError::Model {
                id,
                model: std::any::type_name::<Self>().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Returns the attributes to store, without the id.
    fn to_source(&self) -> OdmResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(mut source) => {
                source.remove(ID_FIELD);
                Ok(source)
            }
            _ => Err(ModelError::NotAnObject {
                index: Self::schema().index().to_string(),
            }
            .into()),
        }
    }
}
