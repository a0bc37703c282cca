//! Concurrent strategy fan-out for a single map link.
//!
//! Every registered strategy runs as its own task under a bounded worker
//! pool, each with a per-strategy deadline, all under one overall deadline.
//! A strategy failing, timing out, or finding nothing never disturbs its
//! siblings; every strategy gets an outcome either way, and the best result
//! is picked by fixed priority once the fan-out settles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{Coordinate, StrategyKind, StrategyOutcome};
use crate::extraction::{ExtractionStrategy, StrategyError};
use crate::infrastructure::config::ExtractionConfig;

/// Timing and pool-size knobs for one fan-out.
#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub per_strategy_timeout: Duration,
    pub overall_timeout: Duration,
    pub worker_count: usize,
}

impl From<&ExtractionConfig> for FanOutConfig {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            per_strategy_timeout: Duration::from_secs(config.per_strategy_timeout_secs),
            overall_timeout: Duration::from_secs(config.overall_timeout_secs),
            worker_count: config.worker_count.max(1),
        }
    }
}

/// Everything one fan-out produced: the full per-strategy outcome map for
/// comparison output, plus the priority-selected best result.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub outcomes: HashMap<StrategyKind, StrategyOutcome>,
    pub best: Option<(StrategyKind, Coordinate)>,
}

impl FanOutReport {
    /// Strategies that produced a validated result, in priority order.
    pub fn successes(&self) -> Vec<StrategyKind> {
        StrategyKind::ALL
            .iter()
            .copied()
            .filter(|kind| {
                self.outcomes
                    .get(kind)
                    .is_some_and(StrategyOutcome::succeeded)
            })
            .collect()
    }

    /// The error most worth surfacing in a row comment. Validation
    /// rejections name the bad value, so they win over generic failures.
    pub fn most_specific_error(&self) -> Option<&StrategyError> {
        let mut fallback = None;
        for kind in StrategyKind::ALL {
            if let Some(error) = self.outcomes.get(&kind).and_then(|o| o.error.as_ref()) {
                if matches!(error, StrategyError::Validation(_)) {
                    return Some(error);
                }
                fallback.get_or_insert(error);
            }
        }
        fallback
    }
}

pub struct StrategyOrchestrator {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    semaphore: Arc<Semaphore>,
    config: FanOutConfig,
}

impl StrategyOrchestrator {
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>, config: FanOutConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.worker_count));
        Self {
            strategies,
            semaphore,
            config,
        }
    }

    pub fn registered_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Fan out every registered strategy against one map link.
    pub async fn run(&self, map_link: &str) -> FanOutReport {
        let kinds = self.registered_kinds();
        self.run_subset(map_link, &kinds).await
    }

    /// Fan out a subset of the registered strategies. Retry attempts use
    /// this to drop single-shot strategies from later passes.
    pub async fn run_subset(&self, map_link: &str, kinds: &[StrategyKind]) -> FanOutReport {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + self.config.overall_timeout;
        let per_strategy = self.config.per_strategy_timeout;

        let mut join_set = JoinSet::new();
        let mut expected = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !kinds.contains(&kind) {
                continue;
            }
            expected.push(kind);

            let strategy = Arc::clone(strategy);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = cancel.clone();
            let map_link = map_link.to_string();

            join_set.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return StrategyOutcome {
                            kind,
                            result: None,
                            elapsed: Duration::ZERO,
                            error: Some(StrategyError::Task(
                                "worker pool closed before the strategy could run".to_string(),
                            )),
                        };
                    }
                };

                let started = Instant::now();
                let outcome = timeout(per_strategy, strategy.extract(&map_link, cancel)).await;
                let elapsed = started.elapsed();
                drop(permit);

                match outcome {
                    Ok(Ok(result)) => StrategyOutcome {
                        kind,
                        result,
                        elapsed,
                        error: None,
                    },
                    Ok(Err(error)) => {
                        debug!(%kind, %error, "strategy failed");
                        StrategyOutcome {
                            kind,
                            result: None,
                            elapsed,
                            error: Some(error),
                        }
                    }
                    Err(_) => {
                        debug!(%kind, "strategy hit its deadline");
                        StrategyOutcome {
                            kind,
                            result: None,
                            elapsed,
                            error: Some(StrategyError::Timeout {
                                seconds: per_strategy.as_secs(),
                            }),
                        }
                    }
                }
            });
        }

        let mut report = FanOutReport::default();

        while !join_set.is_empty() {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    report.outcomes.insert(outcome.kind, outcome);
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "strategy task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(map_link, "fan-out deadline hit, cancelling remaining strategies");
                    cancel.cancel();
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Strategies that never reported (panicked, aborted, or still
        // running at the deadline) get an explicit failed outcome so the
        // report always covers everything that was asked to run.
        for kind in &expected {
            report.outcomes.entry(*kind).or_insert_with(|| StrategyOutcome {
                kind: *kind,
                result: None,
                elapsed: self.config.overall_timeout,
                error: Some(StrategyError::Task(
                    "did not complete (cancelled, panicked, or exceeded the fan-out deadline)"
                        .to_string(),
                )),
            });
        }

        // Idle strategies still awaiting I/O have nothing left to wait for.
        cancel.cancel();

        report.best = StrategyKind::ALL
            .iter()
            .filter(|kind| expected.contains(*kind))
            .find_map(|kind| {
                let coord = report.outcomes.get(kind)?.result?;
                Some((*kind, coord))
            });

        if let Some((kind, coord)) = &report.best {
            debug!(
                map_link,
                winner = %kind,
                latitude = coord.latitude,
                longitude = coord.longitude,
                successes = report.successes().len(),
                "fan-out selected a result"
            );
        }

        report
    }
}
