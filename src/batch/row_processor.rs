//! Per-row retry state machine.
//!
//! A row enters, exactly one of Succeeded / Failed / Skipped comes out.
//! Each attempt is one full strategy fan-out under its own wall-clock
//! budget; a hard ceiling bounds the row's cumulative time regardless of
//! how attempts land.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::domain::{RowOutcome, RowRecord, RowStatus, StrategyKind};
use crate::extraction::StrategyError;
use crate::infrastructure::config::{defaults, ExtractionConfig};
use crate::orchestrator::StrategyOrchestrator;

/// Retry and budget knobs for one row.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Wall-clock budget for a single attempt's fan-out.
    pub attempt_budget: Duration,
    /// Hard ceiling on the row's cumulative time across all attempts.
    pub row_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(defaults::RETRY_DELAY_SECS),
            attempt_budget: Duration::from_secs(defaults::ATTEMPT_BUDGET_SECS),
            row_ceiling: Duration::from_secs(defaults::ROW_CEILING_SECS),
        }
    }
}

impl From<&ExtractionConfig> for RetryPolicy {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            attempt_budget: Duration::from_secs(config.attempt_budget_secs),
            row_ceiling: Duration::from_secs(config.row_ceiling_secs),
        }
    }
}

pub struct RowProcessor {
    orchestrator: Arc<StrategyOrchestrator>,
    policy: RetryPolicy,
}

impl RowProcessor {
    pub fn new(orchestrator: Arc<StrategyOrchestrator>, policy: RetryPolicy) -> Self {
        Self {
            orchestrator,
            policy,
        }
    }

    /// Drive one row to a terminal outcome. Never returns an error; every
    /// failure mode folds into a Failed outcome with a comment.
    pub async fn process(&self, record: &RowRecord) -> RowOutcome {
        let Some(map_link) = record.trimmed_link() else {
            debug!(row = record.index + 1, "row has no map link, skipping");
            return RowOutcome::skipped("Skipped: No map link provided");
        };

        let started = Instant::now();
        let all_kinds = self.orchestrator.registered_kinds();
        // Geocoding bills per call and is deterministic for a given query,
        // so it only ever runs on the first attempt.
        let retry_kinds: Vec<StrategyKind> = all_kinds
            .iter()
            .copied()
            .filter(|kind| *kind != StrategyKind::Geocoding)
            .collect();

        let mut last_error: Option<StrategyError> = None;

        for attempt in 1..=self.policy.max_attempts {
            if started.elapsed() >= self.policy.row_ceiling {
                warn!(
                    row = record.index + 1,
                    attempt, "row time budget exhausted before attempt"
                );
                return RowOutcome {
                    status: RowStatus::Failed,
                    result: None,
                    winner: None,
                    attempts: attempt - 1,
                    elapsed: started.elapsed(),
                    comment: format!(
                        "Failed: row time budget exhausted after {} attempts",
                        attempt - 1
                    ),
                };
            }

            let kinds = if attempt == 1 { &all_kinds } else { &retry_kinds };

            debug!(
                row = record.index + 1,
                attempt,
                strategies = kinds.len(),
                "starting extraction attempt"
            );

            let fan_out = timeout(
                self.policy.attempt_budget,
                self.orchestrator.run_subset(map_link, kinds),
            )
            .await;

            match fan_out {
                Ok(report) => {
                    if let Some((winner, coord)) = report.best {
                        let successes = report.successes().len();
                        info!(
                            row = record.index + 1,
                            name = %record.display_name(),
                            %winner,
                            attempt,
                            "extracted coordinates"
                        );
                        return RowOutcome {
                            status: RowStatus::Succeeded,
                            result: Some(coord),
                            winner: Some(winner),
                            attempts: attempt,
                            elapsed: started.elapsed(),
                            comment: format!(
                                "Success: {winner} on attempt {attempt} ({successes}/{} strategies returned a result)",
                                kinds.len()
                            ),
                        };
                    }

                    if let Some(error) = report.most_specific_error() {
                        // Keep a validation rejection once seen; it names
                        // the offending value.
                        let keep_previous = matches!(
                            last_error,
                            Some(StrategyError::Validation(_))
                        ) && !matches!(error, StrategyError::Validation(_));
                        if !keep_previous {
                            last_error = Some(error.clone());
                        }
                    }
                }
                Err(_) => {
                    warn!(
                        row = record.index + 1,
                        attempt, "attempt exceeded its time budget"
                    );
                    last_error = Some(StrategyError::Timeout {
                        seconds: self.policy.attempt_budget.as_secs(),
                    });
                }
            }

            if attempt < self.policy.max_attempts {
                sleep(self.policy.retry_delay).await;
            }
        }

        let reason = last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "no strategy produced coordinates".to_string());

        warn!(
            row = record.index + 1,
            name = %record.display_name(),
            reason,
            "row failed after all attempts"
        );

        RowOutcome {
            status: RowStatus::Failed,
            result: None,
            winner: None,
            attempts: self.policy.max_attempts,
            elapsed: started.elapsed(),
            comment: format!(
                "Failed after {} attempts: {reason}",
                self.policy.max_attempts
            ),
        }
    }
}
