//! Core value types shared by the query builder, decoder and gateway.

mod bulk;
mod document;
mod pagination;
mod result_set;

pub use bulk::{BulkBatchResult, BulkDocument, BulkItemError, BulkReport, MAX_BULK_ERRORS};
pub use document::Document;
pub use pagination::{Cursor, FirstPage, PageResolver, Paginator, SharedPageResolver};
pub use result_set::ResultSet;
