pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /stream                  global push channel (SSE)
/// /execute                 start the executable (POST)
///
/// /jobs                    list jobs
/// /jobs/{id}               job status
/// /jobs/{id}/stream        per-job push channel with replay (SSE)
/// /jobs/{id}/cancel        kill a running job (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stream", get(handlers::stream::global_stream))
        .route("/execute", post(handlers::execute::execute))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/jobs/{id}/stream", get(handlers::stream::job_stream))
        .route("/jobs/{id}/cancel", post(handlers::jobs::cancel_job))
}
