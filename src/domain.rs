//! Domain model: coordinate value objects, strategy outcomes, and the
//! per-row / per-batch result types shared by every layer.

pub mod coordinates;
pub mod outcome;

pub use coordinates::{validate_coordinates, Coordinate, CoordinateRejection};
pub use outcome::{
    BatchStatistics, RowOutcome, RowRecord, RowStatus, StrategyKind, StrategyOutcome,
};
