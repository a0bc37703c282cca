//! Batch processing: per-row retry state machine and the batch runner that
//! drives rows through it with bounded concurrency.

pub mod row_processor;
pub mod runner;

pub use row_processor::{RetryPolicy, RowProcessor};
pub use runner::{
    BatchReport, BatchRunner, LogProgress, ProcessedRow, ProgressReporter, RowProgress,
};
