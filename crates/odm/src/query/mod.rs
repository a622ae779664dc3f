//! Query construction, compilation and response decoding.
//!
//! - [`request`]: the accumulated [`QueryRequest`] value
//! - [`filters`]: the `where` family shared by all bool-query builders
//! - [`builder`]: the model-bound [`QueryBuilder`]
//! - [`compiler`]: [`QueryRequest`] to request body
//! - [`decoder`]: raw responses to [`ResultSet`](crate::types::ResultSet)

pub mod builder;
pub mod clauses;
pub mod compiler;
pub mod decoder;
pub mod filters;
pub mod operator;
pub mod request;
pub mod vector;

pub use builder::{QueryBuilder, TrashedMode};
pub use compiler::{CompiledQuery, EsqlRequest, SearchRequest, compile, compile_count};
pub use decoder::{decode_esql_response, decode_get_response, decode_search_response};
pub use filters::{ClauseBuilder, Filterable};
pub use operator::Operator;
pub use request::{
    BoolQuery, Bucket, KnnClause, KnnPlacement, QueryMode, QueryRequest, QueryWrapper,
    SortDirection, SortField, SourceFilter,
};
pub use vector::{HybridQuery, HybridWeights};
