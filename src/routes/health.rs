use std::time::UNIX_EPOCH;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    started_at_epoch_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started_at_epoch_seconds = state
        .started_at_system()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        started_at_epoch_seconds,
    })
}
