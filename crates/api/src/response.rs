//! Shared response envelope types for API handlers.
//!
//! Job inspection endpoints use the `{ "data": ... }` envelope. The execute
//! acknowledgement keeps its own flat shape.

use runcast_core::types::JobId;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Message returned by every accepted execute call.
pub const EXECUTE_ACK_MESSAGE: &str = "Process started";

/// Acknowledgement of an execute call.
///
/// Sent before the spawn outcome is known; results only arrive through the
/// event streams.
#[derive(Debug, Serialize)]
pub struct ExecuteAck {
    pub message: &'static str,
    /// Id of the job, usable with `/api/jobs/{id}` and its stream.
    pub job_id: JobId,
}

impl ExecuteAck {
    pub fn new(job_id: JobId) -> Self {
        Self {
            message: EXECUTE_ACK_MESSAGE,
            job_id,
        }
    }
}
