//! Failure state machine: counts consecutive full-failure runs and requests
//! remediation when the threshold is crossed.

use crate::db::TriggerKind;
use crate::remediation::{Outcome, RemediationController};
use crate::state::CounterFile;

/// Tracks consecutive zero-success runs across process restarts.
///
/// Two states per run: below threshold (accumulating) and threshold crossed
/// (trigger and reset). Only the crossing initiates a remediation attempt —
/// after it the counter returns to 0 whatever the attempt's outcome, so a
/// sustained outage re-triggers every `threshold` runs rather than every run.
pub struct FailureStateMachine {
    counter: CounterFile,
    threshold: u32,
}

impl FailureStateMachine {
    pub fn new(counter: CounterFile, threshold: u32) -> Self {
        Self { counter, threshold }
    }

    /// Evaluate one classified run. Returns the remediation outcome when this
    /// run crossed the threshold, `None` otherwise.
    pub async fn observe(
        &self,
        success_percentage: u8,
        controller: &RemediationController,
    ) -> Option<Outcome> {
        if success_percentage > 0 {
            // Any success clears accumulated failures; no partial credit.
            self.reset_if_nonzero();
            return None;
        }

        let failures = self.counter.load() + 1;
        if let Err(e) = self.counter.store(failures) {
            tracing::error!("failed to persist failure counter: {}", e);
        }

        if failures < self.threshold {
            tracing::warn!(
                "full connectivity failure ({} of {} before remediation)",
                failures,
                self.threshold
            );
            return None;
        }

        let reason = format!("auto: {} consecutive failures", failures);
        let outcome = controller.request(TriggerKind::Automatic, &reason).await;

        // Reset regardless of how the attempt went, so the steady-state floor
        // of a long outage does not re-trigger every run.
        if let Err(e) = self.counter.store(0) {
            tracing::error!("failed to reset failure counter: {}", e);
        }

        Some(outcome)
    }

    fn reset_if_nonzero(&self) {
        if self.counter.load() != 0 {
            if let Err(e) = self.counter.store(0) {
                tracing::error!("failed to reset failure counter: {}", e);
            }
        }
    }

    /// Current consecutive-failure count, for the status surface.
    pub fn failures(&self) -> u32 {
        self.counter.load()
    }
}
