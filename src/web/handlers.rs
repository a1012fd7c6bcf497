//! HTTP request handlers.

use super::AppState;
use crate::cache::RangeBucket;
use crate::db::TriggerKind;
use crate::remediation::Outcome;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Liveness for the external supervisor; independent of monitoring health.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default = "default_range")]
    pub range: RangeBucket,
}

fn default_range() -> RangeBucket {
    RangeBucket::Last12Hours
}

/// Status samples for a date-range bucket, served through the cache layer.
/// A store failure degrades to 503 rather than crashing the query process.
pub async fn handle_get_samples(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    match state.cache.samples(query.range) {
        Ok(samples) => Json(samples.as_ref().clone()).into_response(),
        Err(e) => {
            tracing::error!("sample query failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "store unavailable" })),
            )
                .into_response()
        }
    }
}

/// Remediation events for a date-range bucket.
pub async fn handle_get_events(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    match state.cache.events(query.range) {
        Ok(events) => Json(events.as_ref().clone()).into_response(),
        Err(e) => {
            tracing::error!("event query failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "store unavailable" })),
            )
                .into_response()
        }
    }
}

/// Operational snapshot: database footprint and whether a remediation
/// command is wired up. Size failures degrade to null rather than 5xx.
pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let db_size_bytes = match state.store.size_bytes() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!("database size query failed: {}", e);
            None
        }
    };

    Json(json!({
        "db_size_bytes": db_size_bytes,
        "remediation_configured": state.controller.is_configured(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RemediateResponse {
    pub outcome: Outcome,
}

/// Manual remediation trigger. Contends with the automatic path for the same
/// cooldown; the outcome is reflected back for the UI to surface.
pub async fn handle_remediate(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state
        .controller
        .request(TriggerKind::Manual, "manually triggered")
        .await;

    let status = match outcome {
        Outcome::Fired | Outcome::SkippedCooldown => StatusCode::OK,
        Outcome::Failed => StatusCode::BAD_GATEWAY,
    };

    (status, Json(RemediateResponse { outcome }))
}
