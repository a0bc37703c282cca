//! Batch map-link coordinate extraction engine.
//!
//! Extracts geographic coordinates (longitude, latitude) from map-service
//! URLs embedded in tabular records. Five independent extraction strategies
//! race under a bounded-concurrency fan-out with per-strategy and per-row
//! time budgets, so a single slow or broken link can never stall a batch.

pub mod batch;
pub mod domain;
pub mod extraction;
pub mod infrastructure;
pub mod orchestrator;

pub use batch::{BatchReport, BatchRunner, RetryPolicy, RowProcessor};
pub use domain::{
    BatchStatistics, Coordinate, CoordinateRejection, RowOutcome, RowRecord, RowStatus,
    StrategyKind, StrategyOutcome,
};
pub use extraction::{ExtractionStrategy, StrategyError};
pub use orchestrator::{FanOutConfig, FanOutReport, StrategyOrchestrator};
