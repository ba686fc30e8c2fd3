//! Shared response envelope types for API handlers.
//!
//! Listing responses use a `{ "data": ... }` envelope. The submission and
//! status endpoints return their bare payloads because their field names
//! are a client contract.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
