//! Health check endpoints

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Pipeline status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub pending_plans: usize,
    pub dropped_utterances: u64,
    pub superseded_plans: u64,
    pub sensors: BTreeMap<String, f64>,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Queue depths, drop counters and the latest readings
async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        pending_plans: state.outbox.pending(),
        dropped_utterances: state.dropped_utterances.load(Ordering::Relaxed),
        superseded_plans: state.outbox.superseded(),
        sensors: state.state.snapshot().readings().clone(),
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build status router
pub fn status_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .with_state(state)
}
