//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                        -> submit_job
/// GET    /{request_id}            -> get_job_status
/// POST   /{request_id}/cancel     -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::submit_job))
        .route("/{request_id}", get(jobs::get_job_status))
        .route("/{request_id}/cancel", post(jobs::cancel_job))
}
