//! Reconciliation of jobs left RUNNING without a worker.
//!
//! A job claimed by a process that then died stays RUNNING forever. When
//! `STUCK_JOB_TIMEOUT_SECS` is set, this task fails RUNNING jobs whose
//! `started_at` is older than the timeout and that have no live execution
//! in this process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use primejobs_core::job::fail;
use primejobs_core::job_status::JobStatus;
use primejobs_db::models::job::{JobListQuery, MAX_LIMIT};
use primejobs_db::{JobStore, StoreResult};
use primejobs_worker::JobScheduler;
use tokio_util::sync::CancellationToken;

/// Upper bound on how often the sweep runs.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Fail every stuck job found in one pass. Returns how many were failed.
pub async fn sweep_once(
    store: &dyn JobStore,
    scheduler: &JobScheduler,
    timeout: Duration,
) -> StoreResult<usize> {
    // Nothing can have been running longer than an unrepresentable timeout.
    let Some(cutoff) = chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
    else {
        return Ok(0);
    };
    let query = JobListQuery {
        status: Some(JobStatus::Running),
        started_before: Some(cutoff),
        oldest_first: true,
        limit: Some(MAX_LIMIT),
        ..Default::default()
    };

    let mut failed = 0;
    for job in store.list(&query).await? {
        if scheduler.is_tracked(job.id) {
            continue;
        }
        let message = format!(
            "job exceeded the running timeout of {}s without a live worker",
            timeout.as_secs()
        );
        match store.update_locked(job.id, fail(message)).await {
            Ok(_) => {
                tracing::warn!(job_id = %job.id, worker_ref = ?job.worker_ref, "Failed stuck job");
                failed += 1;
            }
            // Finished or failed between the list and the lock.
            Err(e) if e.is_conflict() => {
                tracing::debug!(job_id = %job.id, error = %e, "Stuck job already settled");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(failed)
}

/// Run the stuck job sweep until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn JobStore>,
    scheduler: Arc<JobScheduler>,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let period = timeout.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);

    tracing::info!(
        timeout_secs = timeout.as_secs(),
        interval_secs = period.as_secs(),
        "Stuck job reconciler started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stuck job reconciler stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(store.as_ref(), &scheduler, timeout).await {
                    Ok(0) => tracing::debug!("Stuck job reconciler: nothing to fail"),
                    Ok(failed) => tracing::info!(failed, "Stuck job reconciler: failed stuck jobs"),
                    Err(e) => tracing::error!(error = %e, "Stuck job reconciler: sweep failed"),
                }
            }
        }
    }
}
