#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use primejobs_core::job::{Job, JobMutator};
use primejobs_core::primes::{ComputeError, PrimeComputer};
use primejobs_core::types::JobId;
use primejobs_db::models::job::JobListQuery;
use primejobs_db::{JobStore, MemoryJobStore, StoreError, StoreResult};
use primejobs_worker::{JobScheduler, SchedulerConfig};
use tokio_util::sync::CancellationToken;

/// Always fails.
pub struct FailingComputer;

impl PrimeComputer for FailingComputer {
    fn compute_primes(&self, _: u32, _: &CancellationToken) -> Result<Vec<u64>, ComputeError> {
        Err(ComputeError::Failed("boom".into()))
    }
}

/// Always panics.
pub struct PanickingComputer;

impl PrimeComputer for PanickingComputer {
    fn compute_primes(&self, _: u32, _: &CancellationToken) -> Result<Vec<u64>, ComputeError> {
        panic!("compute exploded")
    }
}

/// Spins until cancelled, counting how many computations started.
#[derive(Default)]
pub struct BlockingComputer {
    pub started: AtomicUsize,
}

impl PrimeComputer for BlockingComputer {
    fn compute_primes(&self, _: u32, cancel: &CancellationToken) -> Result<Vec<u64>, ComputeError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(2));
        }
        Err(ComputeError::Cancelled)
    }
}

/// Counts calls and delegates to trial division.
#[derive(Default)]
pub struct CountingComputer {
    pub calls: AtomicUsize,
}

impl PrimeComputer for CountingComputer {
    fn compute_primes(&self, count: u32, cancel: &CancellationToken) -> Result<Vec<u64>, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        primejobs_core::primes::TrialDivision.compute_primes(count, cancel)
    }
}

pub fn config(worker_count: usize, queue_capacity: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_count,
        queue_capacity,
        shutdown_grace: Duration::from_secs(5),
    }
}

pub fn start(
    store: &Arc<MemoryJobStore>,
    computer: Arc<dyn PrimeComputer>,
    worker_count: usize,
    queue_capacity: usize,
) -> Arc<JobScheduler> {
    let store: Arc<dyn JobStore> = Arc::clone(store) as Arc<dyn JobStore>;
    Arc::new(JobScheduler::start(store, computer, config(worker_count, queue_capacity)))
}

/// Poll the store until `done` holds for the job, or panic after 5 seconds.
pub async fn wait_for(store: &MemoryJobStore, id: JobId, done: impl Fn(&Job) -> bool) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = store.get(id).await.unwrap();
        if done(&job) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for job {id}, last seen {job:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for condition");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Memory store whose `update_locked` fails with a database error for the
/// calls numbered in `failing_calls` (1-based).
pub struct FlakyStore {
    pub inner: Arc<MemoryJobStore>,
    failing_calls: Vec<usize>,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryJobStore>, failing_calls: Vec<usize>) -> Self {
        Self {
            inner,
            failing_calls,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn update_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create(&self, requested_count: i64) -> StoreResult<Job> {
        self.inner.create(requested_count).await
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        self.inner.get(id).await
    }

    async fn update_locked(&self, id: JobId, mutator: JobMutator) -> StoreResult<Job> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&call) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update_locked(id, mutator).await
    }

    async fn list(&self, query: &JobListQuery) -> StoreResult<Vec<Job>> {
        self.inner.list(query).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}
