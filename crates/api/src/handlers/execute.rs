//! Command gateway: turns an execution request into a process run.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use runcast_core::params::ExecutionRequest;

use crate::error::AppResult;
use crate::response::ExecuteAck;
use crate::state::AppState;

/// POST /api/execute
///
/// Validate the request, start the executable and acknowledge right away.
/// The spawn outcome is only observable through the event streams, so the
/// response is the same whether or not the executable exists. Malformed
/// bodies are rejected with 400 before anything is spawned.
pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> AppResult<Json<ExecuteAck>> {
    let Json(request) = payload?;
    request.validate()?;

    let args = request.build_args();
    let job_id = state.relay.start(args);

    Ok(Json(ExecuteAck::new(job_id)))
}
