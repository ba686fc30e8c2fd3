//! Operator view of the job table.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use primejobs_core::job::Job;
use primejobs_core::job_status::JobStatus;
use primejobs_core::types::{JobId, Timestamp};
use primejobs_db::models::job::JobListQuery;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// One row of the admin listing.
#[derive(Debug, Serialize)]
pub struct AdminJobView {
    pub request_id: JobId,
    pub no_of_primes: u32,
    pub status: JobStatus,
    pub result: Vec<u64>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub worker_ref: Option<String>,
}

impl From<Job> for AdminJobView {
    fn from(job: Job) -> Self {
        let result = job.primes().to_vec();
        Self {
            request_id: job.id,
            no_of_primes: job.requested_count,
            status: job.status,
            result,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            worker_ref: job.worker_ref,
        }
    }
}

/// GET /api/v1/admin/jobs
///
/// Newest first. Supports optional `status`, `limit`, and `offset` query
/// parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    params: Result<Query<JobListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let jobs = state.store.list(&params).await?;
    let data: Vec<AdminJobView> = jobs.into_iter().map(AdminJobView::from).collect();
    Ok(Json(DataResponse { data }))
}
