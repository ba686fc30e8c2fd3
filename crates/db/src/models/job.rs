//! Row mapping for the `prime_jobs` table.

use primejobs_core::error::CoreError;
use primejobs_core::job::{Job, JobResult};
use primejobs_core::job_status::JobStatus;
use primejobs_core::types::{JobId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

/// A raw row from the `prime_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub requested_count: i32,
    pub status: String,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub worker_ref: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| CoreError::Internal(format!("Job {}: {e}", row.id)))?;
        let requested_count = u32::try_from(row.requested_count).map_err(|_| {
            CoreError::Internal(format!(
                "Job {} has invalid requested_count {}",
                row.id, row.requested_count
            ))
        })?;
        let result = row
            .result
            .map(serde_json::from_value::<JobResult>)
            .transpose()
            .map_err(|e| CoreError::Internal(format!("Job {} has a corrupt result: {e}", row.id)))?;

        Ok(Job {
            id: row.id,
            requested_count,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result,
            error_message: row.error_message,
            worker_ref: row.worker_ref,
        })
    }
}

/// Serialize a job result into its JSONB column value.
pub fn result_to_json(result: Option<&JobResult>) -> Result<Option<serde_json::Value>, CoreError> {
    result
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| CoreError::Internal(format!("Failed to serialize job result: {e}")))
}

/// Filters for listing jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Only jobs created strictly before this instant.
    #[serde(skip)]
    pub created_before: Option<Timestamp>,
    /// Only jobs claimed strictly before this instant.
    #[serde(skip)]
    pub started_before: Option<Timestamp>,
    /// Oldest first instead of newest first.
    #[serde(skip)]
    pub oldest_first: bool,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 50;

impl JobListQuery {
    /// Effective `(limit, offset)` after defaults and clamping.
    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }

    /// Whether `job` passes the filters (ignores paging).
    pub fn matches(&self, job: &Job) -> bool {
        if self.status.is_some_and(|s| s != job.status) {
            return false;
        }
        if self.created_before.is_some_and(|t| job.created_at >= t) {
            return false;
        }
        if let Some(cutoff) = self.started_before {
            match job.started_at {
                Some(started) if started < cutoff => {}
                _ => return false,
            }
        }
        true
    }
}
