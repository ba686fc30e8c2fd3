use std::sync::Arc;

use primejobs_core::job::Job;
use primejobs_core::job_status::JobStatus;
use primejobs_core::types::JobId;
use primejobs_db::{JobStore, StoreResult};
use serde::Serialize;

/// What a client sees when polling a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub request_id: JobId,
    pub status: JobStatus,
    /// The primes, empty unless `status` is FINISHED.
    pub result: Vec<u64>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            request_id: job.id,
            status: job.status,
            result: job.primes().to_vec(),
        }
    }
}

/// Read-only view of job progress.
#[derive(Clone)]
pub struct StatusQuery {
    store: Arc<dyn JobStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Current status and result of a job. `NotFound` for unknown ids.
    pub async fn query_status(&self, job_id: JobId) -> StoreResult<JobStatusView> {
        let job = self.store.get(job_id).await?;
        Ok(JobStatusView::from(&job))
    }
}

#[cfg(test)]
mod tests {
    use primejobs_core::job::{claim, finish};
    use primejobs_core::types::WorkerRef;
    use primejobs_db::MemoryJobStore;

    use super::*;

    #[tokio::test]
    async fn queued_and_running_jobs_have_empty_result() {
        let store = Arc::new(MemoryJobStore::new());
        let query = StatusQuery::new(store.clone());
        let job = store.create(3).await.unwrap();

        let view = query.query_status(job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);
        assert!(view.result.is_empty());

        store
            .update_locked(job.id, claim(WorkerRef::new_v4()))
            .await
            .unwrap();
        let view = query.query_status(job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Running);
        assert!(view.result.is_empty());
    }

    #[tokio::test]
    async fn finished_job_exposes_primes() {
        let store = Arc::new(MemoryJobStore::new());
        let query = StatusQuery::new(store.clone());
        let job = store.create(3).await.unwrap();
        store
            .update_locked(job.id, claim(WorkerRef::new_v4()))
            .await
            .unwrap();
        store
            .update_locked(job.id, finish(vec![2, 3, 5]))
            .await
            .unwrap();

        let view = query.query_status(job.id).await.unwrap();
        assert_eq!(
            view,
            JobStatusView {
                request_id: job.id,
                status: JobStatus::Finished,
                result: vec![2, 3, 5],
            }
        );
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let query = StatusQuery::new(Arc::new(MemoryJobStore::new()));
        let err = query.query_status(JobId::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
