//! Strategy and row outcome types plus batch-level statistics.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::coordinates::Coordinate;
use crate::extraction::StrategyError;

/// The independent extraction strategies, in consensus priority order:
/// fast deterministic text matching first, then network strategies, then
/// browser automation. Declaration order drives best-result selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Pure-text pattern matching against the URL. No I/O.
    Pattern,
    /// Short-link redirect resolution followed by pattern matching.
    Redirect,
    /// Page-content fetch and scrape (links, embedded JSON, meta tags).
    Content,
    /// External geocoding API lookup from a place name in the URL.
    Geocoding,
    /// Headless-browser rendering of client-side redirects/content.
    Browser,
}

impl StrategyKind {
    /// All strategies in priority order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Pattern,
        StrategyKind::Redirect,
        StrategyKind::Content,
        StrategyKind::Geocoding,
        StrategyKind::Browser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Pattern => "pattern",
            StrategyKind::Redirect => "redirect",
            StrategyKind::Content => "content",
            StrategyKind::Geocoding => "geocoding",
            StrategyKind::Browser => "browser",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one strategy invocation within one row's fan-out.
/// Created when the strategy completes, errors, or times out; consumed by
/// the orchestrator's best-pick step and retained for comparison output.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub kind: StrategyKind,
    /// `Some` only when the strategy produced a validated pair.
    pub result: Option<Coordinate>,
    pub elapsed: Duration,
    /// Strategy-local failure, if any. Absent result with no error means
    /// the strategy ran cleanly and found nothing usable.
    pub error: Option<StrategyError>,
}

impl StrategyOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

/// One input record. Owned by the batch for the duration of processing;
/// the row processor only ever reads it and hands back a `RowOutcome`.
#[derive(Debug, Clone, Default)]
pub struct RowRecord {
    /// Zero-based input position. Output ordering is restored from this.
    pub index: usize,
    pub name: Option<String>,
    pub map_link: Option<String>,
    /// All original column values, aligned with the batch header.
    pub values: Vec<String>,
}

impl RowRecord {
    /// Trimmed map link, or `None` when the cell is missing or blank.
    pub fn trimmed_link(&self) -> Option<&str> {
        self.map_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Row {}", self.index + 1))
    }
}

/// Terminal classification of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Terminal per-row result. Created exactly once by the row processor and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub status: RowStatus,
    pub result: Option<Coordinate>,
    /// Strategy whose result was selected, when `status == Succeeded`.
    pub winner: Option<StrategyKind>,
    pub attempts: u32,
    pub elapsed: Duration,
    /// Human-readable summary written into the output's comment column.
    pub comment: String,
}

impl RowOutcome {
    pub fn skipped(comment: impl Into<String>) -> Self {
        Self {
            status: RowStatus::Skipped,
            result: None,
            winner: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            comment: comment.into(),
        }
    }
}

/// Aggregate counters, updated as each row outcome arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchStatistics {
    pub fn record(&mut self, status: RowStatus) {
        match status {
            RowStatus::Succeeded => self.successful += 1,
            RowStatus::Failed => self.failed += 1,
            RowStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.successful + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_declaration_order() {
        assert!(StrategyKind::Pattern < StrategyKind::Redirect);
        assert!(StrategyKind::Redirect < StrategyKind::Content);
        assert!(StrategyKind::Content < StrategyKind::Geocoding);
        assert!(StrategyKind::Geocoding < StrategyKind::Browser);
    }

    #[test]
    fn trimmed_link_filters_blank_cells() {
        let mut record = RowRecord::default();
        assert_eq!(record.trimmed_link(), None);

        record.map_link = Some("   ".to_string());
        assert_eq!(record.trimmed_link(), None);

        record.map_link = Some("  https://maps.example/@1.0,2.0 ".to_string());
        assert_eq!(record.trimmed_link(), Some("https://maps.example/@1.0,2.0"));
    }

    #[test]
    fn display_name_falls_back_to_row_number() {
        let record = RowRecord {
            index: 4,
            ..Default::default()
        };
        assert_eq!(record.display_name(), "Row 5");
    }

    #[test]
    fn statistics_record_each_status() {
        let mut stats = BatchStatistics {
            total: 3,
            ..Default::default()
        };
        stats.record(RowStatus::Succeeded);
        stats.record(RowStatus::Failed);
        stats.record(RowStatus::Skipped);
        assert_eq!(stats.completed(), 3);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
    }
}
