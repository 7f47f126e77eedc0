//! Job inspection and cancellation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use runcast_core::error::CoreError;
use runcast_core::relay::JobSummary;
use runcast_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/jobs
///
/// List known jobs, most recent first. Terminated jobs disappear once the
/// retention window has passed.
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<Vec<JobSummary>>> {
    Json(DataResponse {
        data: state.relay.jobs(),
    })
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobSummary>>> {
    let job = find_job(&state, id)?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/jobs/{id}/cancel
///
/// Kill a running job. The relay reports the cancellation and the exit code
/// on the job's streams; the returned summary reflects the state at the time
/// of the request.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<(StatusCode, Json<DataResponse<JobSummary>>)> {
    state.relay.cancel(id)?;
    let job = find_job(&state, id)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

fn find_job(state: &AppState, id: JobId) -> AppResult<JobSummary> {
    state
        .relay
        .job(id)
        .ok_or(AppError::Core(CoreError::NotFound { entity: "job", id }))
}
