//! Probe module: per-run reachability probing against the target set.

mod ping;

pub use ping::ping;

use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("command failed: {0}")]
    Command(String),
}

/// Issues the configured number of probes against each target for one run.
#[derive(Debug, Clone)]
pub struct Prober {
    targets: Vec<String>,
    probes_per_target: u32,
    timeout: Duration,
}

impl Prober {
    pub fn new(targets: Vec<String>, probes_per_target: u32, timeout: Duration) -> Self {
        Self {
            targets,
            probes_per_target,
            timeout,
        }
    }

    /// Total probes per run, the fixed denominator for percentage math.
    pub fn total_probes(&self) -> u32 {
        self.targets.len() as u32 * self.probes_per_target
    }

    /// Execute one run: all probes fan out concurrently (they are independent
    /// and order-insensitive) and the run awaits every one before returning.
    /// Each outcome is `Some(latency_ms)` or `None` for timeout/unreachable.
    /// A failed probe never fails the run; it just counts toward loss.
    pub async fn run(&self) -> Vec<Option<f64>> {
        let mut set = JoinSet::new();

        for target in &self.targets {
            for _ in 0..self.probes_per_target {
                let target = target.clone();
                let timeout = self.timeout;
                set.spawn(async move {
                    match ping(&target, timeout).await {
                        Ok(latency_ms) => Some(latency_ms),
                        Err(ProbeError::Timeout(_)) => None,
                        Err(e) => {
                            tracing::debug!("probe to {} failed: {}", target, e);
                            None
                        }
                    }
                });
            }
        }

        let mut outcomes = Vec::with_capacity(self.total_probes() as usize);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // A panicked probe task counts as a lost probe.
                Err(e) => {
                    tracing::error!("probe task failed to join: {}", e);
                    outcomes.push(None);
                }
            }
        }

        outcomes
    }
}
