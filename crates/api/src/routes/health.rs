use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the executable is missing.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the configured executable path points to a file.
    pub executable_found: bool,
    /// Jobs that have not terminated yet.
    pub running_jobs: usize,
    /// Whether a global subscriber is connected.
    pub subscriber_attached: bool,
}

/// GET /health -- returns service health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let executable_found = tokio::fs::metadata(&state.relay.config().executable)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);

    let status = if executable_found { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        executable_found,
        running_jobs: state.relay.running_jobs(),
        subscriber_attached: state.relay.has_subscriber(),
    })
}

/// Mount health check routes (root level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
