//! The job store contract shared by every backend.

use async_trait::async_trait;
use primejobs_core::error::CoreError;
use primejobs_core::job::{Job, JobMutator};
use primejobs_core::types::JobId;

use crate::models::job::JobListQuery;

/// Errors surfaced by a [`JobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain error: unknown id, bad input or an illegal transition.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::Conflict(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::NotFound { .. }))
    }
}

/// Durable table of job records.
///
/// `update_locked` is the only mutation path after creation. Implementations
/// hold an exclusive per-row lock for the load, mutate and persist sequence,
/// so two updates of the same job are totally ordered while updates of
/// different jobs proceed independently. Reads return whole records only.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new `QUEUED` job. Rejects counts `<= 0` with `Validation`.
    async fn create(&self, requested_count: i64) -> StoreResult<Job>;

    /// Load a job, or `NotFound`.
    async fn get(&self, id: JobId) -> StoreResult<Job>;

    /// Apply `mutator` to the job under its row lock.
    ///
    /// The mutated record is checked with [`Job::check_update`]; an illegal
    /// transition returns `Conflict` and the stored row is left unchanged.
    async fn update_locked(&self, id: JobId, mutator: JobMutator) -> StoreResult<Job>;

    /// List jobs matching `query`.
    async fn list(&self, query: &JobListQuery) -> StoreResult<Vec<Job>>;

    /// Confirm the backend is reachable.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Run `mutator` against a copy of `current` and validate the result.
///
/// Shared by the backends so they agree on what a legal update is.
pub(crate) fn apply_mutator(current: &Job, mutator: JobMutator) -> Result<Job, CoreError> {
    let mut next = current.clone();
    mutator(&mut next)?;
    current.check_update(&next)?;
    Ok(next)
}
