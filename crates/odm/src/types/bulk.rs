//! Bulk indexing payloads and reports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of item errors kept in a [`BulkReport`].
pub const MAX_BULK_ERRORS: usize = 100;

/// A document queued for bulk indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDocument {
    /// Document id; the store assigns one when absent.
    pub id: Option<String>,
    /// Document body.
    pub source: Map<String, Value>,
}

impl BulkDocument {
    /// Creates a document with an explicit id.
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            source,
        }
    }

    /// Creates a document whose id is assigned by the store.
    pub fn without_id(source: Map<String, Value>) -> Self {
        Self { id: None, source }
    }
}

/// Why a single bulk item (or a whole batch) failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// The failing document id, `None` when the whole batch failed.
    pub id: Option<String>,
    /// The reason reported by the store.
    pub reason: String,
}

/// The store's answer to one bulk request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkBatchResult {
    /// Items indexed successfully.
    pub success: u64,
    /// Items rejected by the store.
    pub failed: u64,
    /// Per-item failures.
    pub errors: Vec<BulkItemError>,
}

/// Aggregated outcome of a chunked bulk operation.
///
/// Partial failure is normal: the report counts every attempted document and
/// keeps at most [`MAX_BULK_ERRORS`] error descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    /// Documents attempted.
    pub total: u64,
    /// Documents indexed.
    pub success: u64,
    /// Documents that failed.
    pub failed: u64,
    /// Bulk requests issued.
    pub batches: u64,
    /// Failure descriptors, truncated to [`MAX_BULK_ERRORS`].
    pub errors: Vec<BulkItemError>,
}

impl BulkReport {
    /// Folds one batch result into the report.
    pub fn absorb(&mut self, attempted: usize, batch: BulkBatchResult) {
        self.total += attempted as u64;
        self.success += batch.success;
        self.failed += batch.failed;
        self.batches += 1;
        for error in batch.errors {
            self.push_error(error);
        }
    }

    /// Records a batch that failed as a whole.
    pub fn record_failed_batch(&mut self, attempted: usize, reason: impl Into<String>) {
        self.total += attempted as u64;
        self.failed += attempted as u64;
        self.batches += 1;
        self.push_error(BulkItemError {
            id: None,
            reason: reason.into(),
        });
    }

    /// Returns true if every document was indexed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn push_error(&mut self, error: BulkItemError) {
        if self.errors.len() < MAX_BULK_ERRORS {
            self.errors.push(error);
        }
    }
}
