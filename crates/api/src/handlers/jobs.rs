//! Handlers for job submission, status polling and cancellation.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use primejobs_core::error::CoreError;
use primejobs_core::types::{JobId, WorkerRef};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /jobs` and query of `GET /find_primes`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[validate(
        required(message = "no_of_primes is required"),
        range(min = 1, message = "no_of_primes must be a positive integer")
    )]
    pub no_of_primes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub request_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub request_id: JobId,
    pub worker_ref: WorkerRef,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Malformed ids are reported like unknown ones.
fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse()
        .map_err(|_| AppError::Core(CoreError::job_not_found(raw)))
}

async fn admit(state: &AppState, input: SubmitJobRequest) -> AppResult<Json<SubmitJobResponse>> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let requested = input
        .no_of_primes
        .ok_or_else(|| AppError::BadRequest("no_of_primes is required".into()))?;

    let request_id = state.gateway.submit_request(requested).await?;
    Ok(Json(SubmitJobResponse { request_id }))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Accept a prime request and return its id without waiting for the
/// computation.
pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    admit(&state, input).await
}

/// GET /api/v1/find_primes?no_of_primes=n
///
/// Query-string form of [`submit_job`].
pub async fn find_primes(
    State(state): State<AppState>,
    params: Result<Query<SubmitJobRequest>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(input) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    admit(&state, input).await
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{request_id}
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&request_id)?;
    let view = state.status.query_status(job_id).await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{request_id}/cancel
///
/// Only jobs queued or running in this process can be cancelled. Returns
/// 202 once cancellation is requested; the job reaches FAILED shortly after.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&request_id)?;
    let job = state.store.get(job_id).await?;

    if job.status.is_terminal() {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is already {} and cannot be cancelled",
            job.status
        ))));
    }

    let worker_ref = state
        .scheduler
        .cancel(job_id)
        .map_err(|e| AppError::Core(CoreError::Conflict(e.to_string())))?;

    tracing::info!(job_id = %job_id, worker_ref = %worker_ref, "Job cancel requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CancelJobResponse {
                request_id: job_id,
                worker_ref,
            },
        }),
    ))
}
