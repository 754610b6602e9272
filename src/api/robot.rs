//! Robot-facing endpoints polled by the actuator

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::plan::{ActionStep, SensorSnapshot};

/// Build robot router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit_state", post(submit_state))
        .route("/get_command", get(get_command))
        .with_state(state)
}

/// Sensor report from the robot
#[derive(Debug, Deserialize)]
pub struct StateReport {
    pub distances: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct Received {
    status: &'static str,
}

async fn index() -> &'static str {
    "Rover gateway is running"
}

/// Replace the stored sensor readings
///
/// The body is parsed by hand so a malformed report gets the JSON error
/// shape below rather than axum's plain-text rejection.
async fn submit_state(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, RobotError> {
    let report: StateReport =
        serde_json::from_slice(&body).map_err(|e| RobotError::MalformedState(e.to_string()))?;

    tracing::debug!(distances = ?report.distances, "state received");
    state.state.replace(SensorSnapshot::new(report.distances));

    Ok(Json(Received { status: "received" }))
}

/// Hand out the next pending plan, or `[]`
async fn get_command(State(state): State<ApiState>) -> Json<Vec<ActionStep>> {
    match state.outbox.take() {
        Some(plan) => {
            tracing::info!(steps = plan.len(), "plan fetched");
            Json(plan.into_steps())
        }
        None => Json(Vec::new()),
    }
}

/// Robot endpoint errors
#[derive(Debug)]
pub enum RobotError {
    MalformedState(String),
}

impl IntoResponse for RobotError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let Self::MalformedState(error) = self;
        tracing::warn!(error = %error, "rejected state report");

        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error })).into_response()
    }
}
