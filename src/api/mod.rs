//! HTTP API server for the rover gateway

pub mod health;
pub mod robot;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::ApiServerConfig;
use crate::pipeline::{PlanOutbox, StateSync};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Latest sensor readings, written by `/submit_state`
    pub state: StateSync,
    /// Plans waiting for `/get_command`
    pub outbox: PlanOutbox,
    /// Utterances dropped by the command queue
    pub dropped_utterances: Arc<AtomicU64>,
}

impl ApiState {
    #[must_use]
    pub fn new(state: StateSync, outbox: PlanOutbox, dropped_utterances: Arc<AtomicU64>) -> Self {
        Self {
            state,
            outbox,
            dropped_utterances,
        }
    }
}

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    // CORS layer for cross-origin requests from dashboards
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(robot::router(state.clone()))
        .merge(health::router())
        .merge(health::status_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: ApiState,
    bind: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: ApiState, config: &ApiServerConfig) -> Self {
        Self {
            state,
            bind: config.bind.clone(),
            port: config.port,
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
