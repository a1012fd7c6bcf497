//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete connectivity status for one monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Up,
    Partial,
    Down,
}

impl Status {
    /// Human-readable label, reconstructible from the enum alone.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Up => "Up",
            Status::Partial => "Partially Up",
            Status::Down => "Down",
        }
    }

    /// Parse a stored label back into the enum.
    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "Up" => Some(Status::Up),
            "Partially Up" => Some(Status::Partial),
            "Down" => Some(Status::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One monitoring run's aggregate result. Immutable once written.
///
/// Invariants: `success_percentage + packet_loss_percentage == 100`;
/// latency fields are present iff `success_percentage > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub success_percentage: u8,
    pub avg_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub packet_loss_percentage: u8,
}

/// Origin of a remediation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Automatic,
    Manual,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Automatic => "automatic",
            TriggerKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<TriggerKind> {
        match s {
            "automatic" => Some(TriggerKind::Automatic),
            "manual" => Some(TriggerKind::Manual),
            _ => None,
        }
    }
}

/// A fired remediation, recorded once per firing. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationEvent {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub trigger_kind: TriggerKind,
}
