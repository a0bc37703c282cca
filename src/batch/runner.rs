//! Batch runner: drives every row through the processor with bounded
//! concurrency, reports progress as rows finish, and partitions the
//! results by terminal status.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::info;

use crate::batch::row_processor::RowProcessor;
use crate::domain::{BatchStatistics, RowOutcome, RowRecord, RowStatus};

/// Progress snapshot emitted after each row reaches a terminal state.
#[derive(Debug, Clone)]
pub struct RowProgress {
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub status: RowStatus,
    pub comment: String,
}

/// Observer for batch progress. Implementations must be cheap; they run on
/// the consumer side of the row stream.
pub trait ProgressReporter: Send + Sync {
    fn on_row(&self, progress: &RowProgress);

    fn on_complete(&self, stats: &BatchStatistics) {
        let _ = stats;
    }
}

/// Default reporter: one log line per row, a summary at the end.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn on_row(&self, progress: &RowProgress) {
        let status = match progress.status {
            RowStatus::Succeeded => "ok",
            RowStatus::Failed => "failed",
            RowStatus::Skipped => "skipped",
        };
        info!(
            "[{}/{}] {} — {}: {}",
            progress.index + 1,
            progress.total,
            progress.name,
            status,
            progress.comment
        );
    }

    fn on_complete(&self, stats: &BatchStatistics) {
        info!(
            total = stats.total,
            successful = stats.successful,
            failed = stats.failed,
            skipped = stats.skipped,
            "batch complete"
        );
    }
}

/// A record paired with its terminal outcome.
#[derive(Debug, Clone)]
pub struct ProcessedRow {
    pub record: RowRecord,
    pub outcome: RowOutcome,
}

/// Final batch result, partitioned by terminal status. Each partition
/// preserves input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub success: Vec<ProcessedRow>,
    pub failed: Vec<ProcessedRow>,
    pub skipped: Vec<ProcessedRow>,
    pub stats: BatchStatistics,
}

impl BatchReport {
    /// All processed rows merged back into input order.
    pub fn all_rows(&self) -> Vec<&ProcessedRow> {
        let mut rows: Vec<&ProcessedRow> = self
            .success
            .iter()
            .chain(self.failed.iter())
            .chain(self.skipped.iter())
            .collect();
        rows.sort_by_key(|row| row.record.index);
        rows
    }
}

pub struct BatchRunner {
    processor: Arc<RowProcessor>,
    reporter: Arc<dyn ProgressReporter>,
    max_concurrent_rows: usize,
}

impl BatchRunner {
    pub fn new(
        processor: Arc<RowProcessor>,
        reporter: Arc<dyn ProgressReporter>,
        max_concurrent_rows: usize,
    ) -> Self {
        Self {
            processor,
            reporter,
            max_concurrent_rows: max_concurrent_rows.max(1),
        }
    }

    /// Process every row and partition the outcomes. `buffered` keeps
    /// completion delivery in input order even when rows overlap, so
    /// statistics and progress always march through the sheet top to
    /// bottom.
    pub async fn run(&self, rows: Vec<RowRecord>) -> BatchReport {
        let total = rows.len();
        info!(total, "starting batch");

        let stats = Arc::new(Mutex::new(BatchStatistics {
            total,
            ..Default::default()
        }));

        let processor = Arc::clone(&self.processor);
        let mut processed = stream::iter(rows)
            .map(|record| {
                let processor = Arc::clone(&processor);
                async move {
                    let outcome = processor.process(&record).await;
                    ProcessedRow { record, outcome }
                }
            })
            .buffered(self.max_concurrent_rows);

        let mut report = BatchReport::default();

        while let Some(row) = processed.next().await {
            {
                let mut stats = stats.lock().await;
                stats.record(row.outcome.status);
            }

            self.reporter.on_row(&RowProgress {
                index: row.record.index,
                total,
                name: row.record.display_name(),
                status: row.outcome.status,
                comment: row.outcome.comment.clone(),
            });

            match row.outcome.status {
                RowStatus::Succeeded => report.success.push(row),
                RowStatus::Failed => report.failed.push(row),
                RowStatus::Skipped => report.skipped.push(row),
            }
        }

        report.stats = *stats.lock().await;
        self.reporter.on_complete(&report.stats);
        report
    }
}
