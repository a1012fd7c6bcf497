//! Remediation controller: the single cooldown-gated entry point shared by
//! the automatic (threshold-crossing) and manual (dashboard) trigger paths.

use std::process::Stdio;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::db::{RemediationEvent, Store, TriggerKind};
use crate::state::CooldownFile;

/// Remediation error types.
#[derive(Error, Debug)]
pub enum RemediationError {
    #[error("no power-cycle capability configured")]
    Unconfigured,
    #[error("power-cycle command timed out after {0:?}")]
    Timeout(Duration),
    #[error("power-cycle command failed: {0}")]
    Command(String),
}

/// Result of a remediation request, reflected back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Fired,
    SkippedCooldown,
    Failed,
}

/// The device capability. The original deployment drove a smart plug through
/// an external script; here that is an arbitrary command bounded by a
/// timeout. `Unconfigured` short-circuits every request to `Failed` without
/// contacting any device.
pub enum PowerCycler {
    Command { program: String, timeout: Duration },
    Unconfigured,
    #[cfg(test)]
    Mock(std::sync::Arc<tests::MockDevice>),
}

impl PowerCycler {
    pub fn from_command(command: Option<String>, timeout: Duration) -> Self {
        match command {
            Some(program) => PowerCycler::Command { program, timeout },
            None => PowerCycler::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, PowerCycler::Unconfigured)
    }

    /// Power-cycle the device. Best effort, possibly slow, possibly failing;
    /// always bounded by the configured timeout.
    async fn power_cycle(&self) -> Result<(), RemediationError> {
        match self {
            PowerCycler::Unconfigured => Err(RemediationError::Unconfigured),
            PowerCycler::Command { program, timeout } => {
                let run = Command::new("sh")
                    .arg("-c")
                    .arg(program)
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output();

                let output = tokio::time::timeout(*timeout, run)
                    .await
                    .map_err(|_| RemediationError::Timeout(*timeout))?
                    .map_err(|e| RemediationError::Command(e.to_string()))?;

                if output.status.success() {
                    Ok(())
                } else {
                    Err(RemediationError::Command(format!(
                        "exit status {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )))
                }
            }
            #[cfg(test)]
            PowerCycler::Mock(mock) => mock.power_cycle(),
        }
    }
}

/// Enforces one remediation per cooldown window across both trigger kinds.
///
/// The cooldown read-decide-write happens under one async mutex, so a manual
/// trigger arriving while an automatic one is mid-flight (or vice versa)
/// cannot both fire.
pub struct RemediationController {
    device: PowerCycler,
    cooldown_window: Duration,
    cooldown: Mutex<CooldownFile>,
    store: Store,
}

impl RemediationController {
    pub fn new(
        device: PowerCycler,
        cooldown_window: Duration,
        cooldown: CooldownFile,
        store: Store,
    ) -> Self {
        Self {
            device,
            cooldown_window,
            cooldown: Mutex::new(cooldown),
            store,
        }
    }

    /// Request a remediation on behalf of either trigger path.
    ///
    /// Within the cooldown window: `SkippedCooldown`, no device action, no
    /// event write. On device failure: `Failed`, cooldown untouched so a
    /// near-term retry is not blocked. On success: one `RemediationEvent`
    /// and the cooldown timestamp advance to now.
    pub async fn request(&self, kind: TriggerKind, reason: &str) -> Outcome {
        if !self.device.is_configured() {
            tracing::warn!(
                "remediation requested ({:?}: {}) but no device is configured",
                kind,
                reason
            );
            return Outcome::Failed;
        }

        let cooldown = self.cooldown.lock().await;
        let now = Utc::now();

        if let Some(last) = cooldown.load() {
            let elapsed = now.signed_duration_since(last);
            let window = ChronoDuration::from_std(self.cooldown_window)
                .unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 1000));
            if elapsed < window {
                tracing::info!(
                    "remediation skipped ({:?}: {}), cooldown has {}s left",
                    kind,
                    reason,
                    (window - elapsed).num_seconds()
                );
                return Outcome::SkippedCooldown;
            }
        }

        tracing::info!("power-cycling device ({:?}: {})", kind, reason);

        if let Err(e) = self.device.power_cycle().await {
            // Cooldown stays untouched; the next threshold crossing or manual
            // retry may attempt again immediately.
            tracing::error!("power cycle failed ({:?}: {}): {}", kind, reason, e);
            return Outcome::Failed;
        }

        let event = RemediationEvent {
            timestamp: now,
            reason: reason.to_string(),
            trigger_kind: kind,
        };
        if let Err(e) = self.store.add_event(&event) {
            tracing::error!("failed to record remediation event: {}", e);
        }
        if let Err(e) = cooldown.store(now) {
            tracing::error!("failed to persist cooldown timestamp: {}", e);
        }

        tracing::info!("power cycle fired ({:?}: {})", kind, reason);
        Outcome::Fired
    }

    /// Whether a device capability is configured, for the status surface.
    pub fn is_configured(&self) -> bool {
        self.device.is_configured()
    }
}
