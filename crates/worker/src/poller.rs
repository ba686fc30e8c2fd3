//! Re-dispatch of jobs that are QUEUED in the store but not in any queue.
//!
//! A job can be durably queued without a live submission: the process that
//! accepted it restarted, or its queue was full. The poller finds such jobs
//! and hands them to the local scheduler. Several processes may poll the
//! same store; the claim in the execution protocol makes sure only one of
//! them runs each job.

use std::sync::Arc;

use chrono::Utc;
use primejobs_core::job_status::JobStatus;
use primejobs_db::models::job::JobListQuery;
use primejobs_db::{JobStore, StoreResult};
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::scheduler::{JobScheduler, SchedulerError};

/// Periodically submits stale QUEUED jobs to a [`JobScheduler`].
pub struct QueuedJobPoller {
    store: Arc<dyn JobStore>,
    scheduler: Arc<JobScheduler>,
    config: PollerConfig,
}

impl QueuedJobPoller {
    pub fn new(store: Arc<dyn JobStore>, scheduler: Arc<JobScheduler>, config: PollerConfig) -> Self {
        Self {
            store,
            scheduler,
            config,
        }
    }

    /// One poll: submit every old-enough QUEUED job not already tracked here.
    ///
    /// Returns the number of jobs submitted.
    pub async fn poll_once(&self) -> StoreResult<usize> {
        let min_age = chrono::Duration::from_std(self.config.min_age).unwrap_or_default();
        let query = JobListQuery {
            status: Some(JobStatus::Queued),
            created_before: Some(Utc::now() - min_age),
            oldest_first: true,
            limit: Some(self.config.batch_size),
            ..Default::default()
        };

        let mut submitted = 0;
        for job in self.store.list(&query).await? {
            if self.scheduler.is_tracked(job.id) {
                continue;
            }
            match self.scheduler.submit(job.id, job.requested_count) {
                Ok(worker_ref) => {
                    tracing::info!(job_id = %job.id, worker_ref = %worker_ref, "Re-dispatched queued job");
                    submitted += 1;
                }
                Err(SchedulerError::AlreadyTracked(_)) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Stopping poll early");
                    break;
                }
            }
        }
        Ok(submitted)
    }

    /// Poll until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            min_age_secs = self.config.min_age.as_secs(),
            "Queued job poller started",
        );

        let mut ticker = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queued job poller stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(0) => tracing::debug!("No queued jobs to re-dispatch"),
                        Ok(submitted) => tracing::info!(submitted, "Queued jobs re-dispatched"),
                        Err(e) => tracing::error!(error = %e, "Queued job poll failed"),
                    }
                }
            }
        }
    }
}
