//! `GET /metrics`: issuance and review counters as JSON.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;
use crate::telemetry::MetricsSnapshot;

pub async fn counters(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    let snapshot = state.metrics.snapshot();
    tracing::debug!(?snapshot, "serving counters");
    Json(snapshot)
}
