pub mod admin;
pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /find_primes                     submit via query string (GET)
///
/// /jobs                            submit (POST)
/// /jobs/{request_id}               status (GET)
/// /jobs/{request_id}/cancel        cancel (POST)
///
/// /admin/jobs                      list (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/find_primes", get(handlers::jobs::find_primes))
        .nest("/jobs", jobs::router())
        .nest("/admin", admin::router())
}
