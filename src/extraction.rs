//! Extraction strategy boundary: the common trait every strategy
//! implements and the error type that never crosses the orchestrator.

pub mod browser;
pub mod content;
pub mod geocoding;
pub mod pattern;
pub mod redirect;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{Coordinate, CoordinateRejection, StrategyKind};

pub use browser::BrowserAutomationScraper;
pub use content::ContentScraper;
pub use geocoding::GeocodingLookup;
pub use pattern::PatternExtractor;
pub use redirect::RedirectResolver;

/// Strategy-local failure. Always caught at the orchestrator boundary and
/// recorded on the strategy's outcome; never propagated to sibling
/// strategies or to the row.
#[derive(Error, Debug, Clone)]
pub enum StrategyError {
    /// A syntactically extracted pair was outside valid coordinate ranges.
    /// Preferred over other errors when synthesizing row comments.
    #[error(transparent)]
    Validation(#[from] CoordinateRejection),

    #[error("network error: {0}")]
    Network(String),

    #[error("geocoding error: {0}")]
    Geocoding(String),

    #[error("browser automation error: {0}")]
    Browser(String),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("strategy task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

/// One independent algorithm for extracting coordinates from a map link.
///
/// `Ok(None)` means "ran cleanly, found nothing usable" — the pervasive
/// absent value, distinct from an error. The cancellation token is the
/// orchestrator's soft-cancel signal; strategies that suspend on I/O
/// should stop waiting when it fires, synchronous strategies may ignore it.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn extract(
        &self,
        map_link: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Coordinate>, StrategyError>;
}
