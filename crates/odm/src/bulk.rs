//! Chunked bulk indexing.
//!
//! Documents are split into batches of at most `batch_size` and sent one
//! batch at a time. A failing batch is recorded and the remaining batches
//! still run.

use crate::gateway::DocumentGateway;
use crate::types::{BulkDocument, BulkReport};

/// Indexes `documents` into `index` in sequential batches.
///
/// A `batch_size` of 0 is treated as 1.
pub async fn bulk_index(
    gateway: &dyn DocumentGateway,
    index: &str,
    documents: &[BulkDocument],
    batch_size: usize,
) -> BulkReport {
    let mut report = BulkReport::default();
    if documents.is_empty() {
        return report;
    }

    for batch in documents.chunks(batch_size.max(1)) {
        match gateway.bulk(index, batch).await {
            Ok(result) => {
                if result.failed > 0 {
                    tracing::warn!(
                        "Bulk batch {} on '{}': {} of {} documents failed",
                        report.batches + 1,
                        index,
                        result.failed,
                        batch.len()
                    );
                }
                report.absorb(batch.len(), result);
            }
            Err(e) => {
                tracing::error!(
                    "Bulk batch {} on '{}' failed ({} documents): {}",
                    report.batches + 1,
                    index,
                    batch.len(),
                    e
                );
                report.record_failed_batch(batch.len(), e.to_string());
            }
        }
    }

    tracing::info!(
        "Bulk indexed into '{}': {} succeeded, {} failed in {} batches",
        index,
        report.success,
        report.failed,
        report.batches
    );
    report
}
