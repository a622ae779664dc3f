//! Elastic ODM
//!
//! An object-document mapper for Elasticsearch. Models are plain serde types
//! bound to an index through a [`ModelSchema`](model::ModelSchema); queries
//! are built with a fluent, model-bound [`QueryBuilder`] that compiles into
//! Query DSL (or passes ES|QL through) and decodes responses back into typed
//! models.
//!
//! # Features
//!
//! - **Fluent queries**: `where_`/`or_where` with an operator table, full-text,
//!   geo, nested and join clauses, sorting, paging and aggregations
//! - **Vector search**: kNN, hybrid kNN + BM25, sparse vectors, semantic search
//! - **Soft deletes**: a `_deleted_at` filter injected into every new builder
//! - **Persistence**: save with generated ids and timestamps, find-or-create,
//!   chunked bulk indexing, index lifecycle from the schema
//!
//! The `elasticsearch` feature (on by default) provides
//! [`ElasticsearchGateway`](gateway::ElasticsearchGateway). Without it the
//! crate only compiles queries; any [`DocumentGateway`](gateway::DocumentGateway)
//! can execute them.
//!
//! # Architecture
//!
//! - [`config`] - Connection, index and logging settings
//! - [`error`] - Error types for all operations
//! - [`types`] - Documents, result sets, pagination and bulk reports
//! - [`query`] - Request accumulation, compilation and decoding
//! - [`model`] - The `Model` trait, schemas, attributes and relations
//! - [`gateway`] - The store boundary and its Elasticsearch implementation
//! - [`repository`] - Per-model persistence operations
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::LazyLock;
//!
//! use elastic_odm::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Post {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     title: String,
//!     views: u64,
//! }
//!
//! static POST_SCHEMA: LazyLock<ModelSchema> = LazyLock::new(|| {
//!     ModelSchema::builder("posts")
//!         .text_with_keyword("title")
//!         .field("views", FieldType::Long)
//!         .timestamps(true)
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
//!
//! # async fn run() -> OdmResult<()> {
//! let context = OdmContext::connect(OdmConfig::from_env())?;
//! let posts = Repository::<Post>::new(&context);
//! posts.create_index().await?;
//!
//! let mut query = posts.query();
//! query
//!     .where_("views", ">=", 100)?
//!     .where_in("title.keyword", ["Rust", "Search"])?
//!     .order_by("views", "desc")?;
//! let page = query.paginate(15, None).await?;
//! println!("{} of {} posts", page.items().len(), page.total());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bulk;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod model;
pub mod query;
pub mod repository;
pub mod types;

// Re-export commonly used types at crate root
pub use config::OdmConfig;
pub use context::OdmContext;
pub use error::{OdmError, OdmResult};
pub use model::{Model, ModelSchema};
pub use query::{Filterable, QueryBuilder};
pub use repository::Repository;
pub use types::{Document, Paginator, ResultSet};

/// The types needed to declare models and run queries.
pub mod prelude {
    pub use crate::config::{OdmConfig, RefreshPolicy};
    pub use crate::context::OdmContext;
    pub use crate::error::{OdmError, OdmResult};
    pub use crate::gateway::DocumentGateway;
    pub use crate::model::{Attributes, FieldDescriptor, FieldType, Model, ModelSchema, Relation};
    pub use crate::query::{
        Filterable, HybridQuery, HybridWeights, Operator, QueryBuilder, SortDirection,
        TrashedMode,
    };
    pub use crate::repository::Repository;
    pub use crate::types::{BulkReport, Cursor, Document, Paginator, ResultSet};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
