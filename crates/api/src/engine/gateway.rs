use std::sync::Arc;

use primejobs_core::error::CoreError;
use primejobs_core::job::validate_requested_count;
use primejobs_core::types::JobId;
use primejobs_db::{JobStore, StoreResult};
use primejobs_worker::{JobScheduler, SchedulerError};

/// Admits prime requests: persist, enqueue, return the id.
#[derive(Clone)]
pub struct RequestGateway {
    store: Arc<dyn JobStore>,
    scheduler: Arc<JobScheduler>,
    max_requested_count: u32,
}

impl RequestGateway {
    pub fn new(
        store: Arc<dyn JobStore>,
        scheduler: Arc<JobScheduler>,
        max_requested_count: u32,
    ) -> Self {
        Self {
            store,
            scheduler,
            max_requested_count,
        }
    }

    /// Create a QUEUED job and submit it for execution.
    ///
    /// Returns as soon as the job is durably stored. A full or closing
    /// queue does not fail the request: the job stays QUEUED and the
    /// poller submits it later.
    pub async fn submit_request(&self, requested_count: i64) -> StoreResult<JobId> {
        let count = validate_requested_count(requested_count)?;
        if count > self.max_requested_count {
            return Err(CoreError::Validation(format!(
                "no_of_primes must not exceed {} (got {count})",
                self.max_requested_count
            ))
            .into());
        }

        let job = self.store.create(i64::from(count)).await?;

        match self.scheduler.submit(job.id, count) {
            Ok(worker_ref) => {
                tracing::info!(
                    job_id = %job.id,
                    requested_count = count,
                    worker_ref = %worker_ref,
                    "Job submitted",
                );
            }
            Err(e @ (SchedulerError::QueueFull | SchedulerError::ShuttingDown)) => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %e,
                    "Job accepted but not enqueued; left QUEUED for the poller",
                );
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Unexpected submission error");
            }
        }

        Ok(job.id)
    }
}
