//! Push-event endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use runcast_core::types::JobId;

use crate::error::AppResult;
use crate::sse::into_sse;
use crate::state::AppState;

/// GET /api/stream
///
/// Attach as the global subscriber. Replaces any previously attached
/// connection; the stream ends when a job finishes.
pub async fn global_stream(State(state): State<AppState>) -> Response {
    let subscription = state.relay.subscribe();
    into_sse(subscription, state.config.sse_keep_alive)
}

/// GET /api/jobs/{id}/stream
///
/// Replay the job's events so far, then follow it until it terminates.
pub async fn job_stream(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Response> {
    let subscription = state.relay.subscribe_job(id)?;
    Ok(into_sse(subscription, state.config.sse_keep_alive))
}
