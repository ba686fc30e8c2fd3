//! In-process job scheduler.
//!
//! Submissions go onto a bounded queue that a fixed pool of worker tasks
//! drains. Each worker claims the job through the store (the claim is the
//! double-dispatch guard), computes on the blocking pool, and records the
//! terminal state through the same locked update path. The scheduler keeps
//! no durable state: the in-flight table only maps job ids to the
//! cancellation handle of their local execution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use primejobs_core::error::CoreError;
use primejobs_core::job::{claim, fail, finish, Job, JobMutator};
use primejobs_core::job_status::JobStatus;
use primejobs_core::primes::{ComputeError, PrimeComputer};
use primejobs_core::types::{JobId, WorkerRef};
use primejobs_db::{JobStore, StoreError, StoreResult};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::SchedulerConfig;

/// Attempts at writing a job's terminal state before it is left RUNNING.
const RECORD_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles after each failure.
const RECORD_BACKOFF: Duration = Duration::from_millis(100);

/// Errors returned by [`JobScheduler`] operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error("job queue is full")]
    QueueFull,

    #[error("job {0} is already scheduled on this node")]
    AlreadyTracked(JobId),

    #[error("job {0} has no live execution on this node")]
    NotTracked(JobId),
}

/// How a single execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Failed,
    /// The claim was refused (already claimed, missing, or store error).
    Skipped,
    /// Another writer recorded a terminal state first.
    AlreadySettled,
    /// The terminal state could not be written; the job is left RUNNING.
    Unrecorded,
}

/// One queued unit of work.
#[derive(Debug)]
struct QueuedJob {
    job_id: JobId,
    requested_count: u32,
    worker_ref: WorkerRef,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    worker_ref: WorkerRef,
    cancel: CancellationToken,
    /// Set by [`JobScheduler::cancel`], as opposed to a shutdown cancel.
    cancel_requested: bool,
}

type JobQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>;

type InFlightTable = Arc<Mutex<HashMap<JobId, InFlight>>>;

fn lock(table: &InFlightTable) -> std::sync::MutexGuard<'_, HashMap<JobId, InFlight>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything a worker task needs.
#[derive(Clone)]
struct WorkerContext {
    store: Arc<dyn JobStore>,
    computer: Arc<dyn PrimeComputer>,
    in_flight: InFlightTable,
    intake: CancellationToken,
    cancel_all: CancellationToken,
}

/// Dispatches prime jobs to a pool of worker tasks.
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    sender: mpsc::Sender<QueuedJob>,
    queue: JobQueue,
    in_flight: InFlightTable,
    /// Cancelled when workers must stop taking new jobs.
    intake: CancellationToken,
    /// Parent of every job's cancellation token.
    cancel_all: CancellationToken,
    tracker: TaskTracker,
}

impl JobScheduler {
    /// Spawn the worker pool on the current Tokio runtime.
    pub fn start(
        store: Arc<dyn JobStore>,
        computer: Arc<dyn PrimeComputer>,
        config: SchedulerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let queue: JobQueue = Arc::new(tokio::sync::Mutex::new(receiver));
        let in_flight: InFlightTable = Arc::default();
        let intake = CancellationToken::new();
        let cancel_all = CancellationToken::new();
        let tracker = TaskTracker::new();

        let ctx = WorkerContext {
            store: Arc::clone(&store),
            computer,
            in_flight: Arc::clone(&in_flight),
            intake: intake.clone(),
            cancel_all: cancel_all.clone(),
        };
        let worker_count = config.worker_count.max(1);
        for index in 0..worker_count {
            tracker.spawn(worker_loop(index, Arc::clone(&queue), ctx.clone()));
        }

        tracing::info!(
            worker_count,
            queue_capacity = config.queue_capacity,
            "Job scheduler started",
        );

        Self {
            store,
            sender,
            queue,
            in_flight,
            intake,
            cancel_all,
            tracker,
        }
    }

    /// Enqueue a job for asynchronous execution.
    ///
    /// Returns immediately with the reference the executing worker will
    /// record on the job. There is no guarantee the work has started.
    pub fn submit(&self, job_id: JobId, requested_count: u32) -> Result<WorkerRef, SchedulerError> {
        if self.intake.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let worker_ref = WorkerRef::new_v4();
        let cancel = self.cancel_all.child_token();
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.contains_key(&job_id) {
                return Err(SchedulerError::AlreadyTracked(job_id));
            }
            in_flight.insert(
                job_id,
                InFlight {
                    worker_ref,
                    cancel: cancel.clone(),
                    cancel_requested: false,
                },
            );
        }

        let queued = QueuedJob {
            job_id,
            requested_count,
            worker_ref,
            cancel,
        };
        match self.sender.try_send(queued) {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, worker_ref = %worker_ref, "Job enqueued");
                Ok(worker_ref)
            }
            Err(err) => {
                lock(&self.in_flight).remove(&job_id);
                Err(match err {
                    TrySendError::Full(_) => SchedulerError::QueueFull,
                    TrySendError::Closed(_) => SchedulerError::ShuttingDown,
                })
            }
        }
    }

    /// Request cancellation of a job scheduled on this node.
    ///
    /// A running computation stops at its next cancellation check and the
    /// job is recorded as FAILED. A job still waiting in the queue is
    /// claimed and failed as soon as a worker reaches it, or at shutdown
    /// if no worker does.
    pub fn cancel(&self, job_id: JobId) -> Result<WorkerRef, SchedulerError> {
        let mut in_flight = lock(&self.in_flight);
        let entry = in_flight
            .get_mut(&job_id)
            .ok_or(SchedulerError::NotTracked(job_id))?;
        entry.cancel_requested = true;
        entry.cancel.cancel();
        tracing::info!(job_id = %job_id, worker_ref = %entry.worker_ref, "Job cancellation requested");
        Ok(entry.worker_ref)
    }

    /// Whether a job is queued or running on this node.
    pub fn is_tracked(&self, job_id: JobId) -> bool {
        lock(&self.in_flight).contains_key(&job_id)
    }

    /// Number of jobs queued or running on this node.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.intake.is_cancelled()
    }

    /// Stop taking work and wait for running jobs.
    ///
    /// Running jobs get `grace` to finish on their own; after that they are
    /// cancelled and recorded as FAILED. Jobs still in the queue are never
    /// claimed and stay QUEUED in the store, except those whose cancellation
    /// was already requested: they are claimed and failed here.
    pub async fn shutdown(&self, grace: Duration) {
        self.intake.cancel();
        self.tracker.close();

        let mut stopped = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !stopped {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed, cancelling running jobs",
            );
            self.cancel_all.cancel();

            stopped = tokio::time::timeout(grace.max(Duration::from_secs(1)), self.tracker.wait())
                .await
                .is_ok();
            if !stopped {
                tracing::error!(
                    "Workers did not stop after cancellation; their jobs may be left RUNNING"
                );
            }
        }

        self.settle_cancelled_queued().await;

        if stopped {
            self.forget_unclaimed();
            tracing::info!("Job scheduler stopped");
        }
    }

    /// Close the queue and fail the jobs in it whose cancellation was
    /// requested, so an accepted cancel is never lost.
    async fn settle_cancelled_queued(&self) {
        let mut queue = self.queue.lock().await;
        queue.close();

        while let Ok(job) = queue.try_recv() {
            let requested = lock(&self.in_flight)
                .remove(&job.job_id)
                .is_some_and(|entry| entry.cancel_requested);
            if !requested {
                continue;
            }

            let job_id = job.job_id;
            let settled = async {
                record(self.store.as_ref(), &self.cancel_all, job_id, || {
                    claim(job.worker_ref)
                })
                .await?;
                record(self.store.as_ref(), &self.cancel_all, job_id, || {
                    fail(ComputeError::Cancelled.to_string())
                })
                .await
            };
            match settled.await {
                Ok(_) => tracing::info!(job_id = %job_id, "Cancelled queued job failed at shutdown"),
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to settle cancelled queued job")
                }
            }
        }
    }

    /// Drop in-flight entries for jobs that stayed in the queue.
    fn forget_unclaimed(&self) {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.is_empty() {
            tracing::info!(count = in_flight.len(), "Queued jobs left for a later poll");
            in_flight.clear();
        }
    }
}

async fn worker_loop(
    index: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    ctx: WorkerContext,
) {
    tracing::debug!(worker = index, "Worker started");

    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = ctx.intake.cancelled() => None,
                job = queue.recv() => job,
            }
        };
        let Some(job) = next else {
            break;
        };

        let job_id = job.job_id;
        let outcome = execute(&ctx, job).await;
        lock(&ctx.in_flight).remove(&job_id);
        tracing::debug!(worker = index, job_id = %job_id, ?outcome, "Worker finished job");
    }

    tracing::debug!(worker = index, "Worker stopped");
}

/// Run the claim -> compute -> record protocol for one job.
#[tracing::instrument(skip_all, fields(job_id = %job.job_id, worker_ref = %job.worker_ref))]
async fn execute(ctx: &WorkerContext, job: QueuedJob) -> JobOutcome {
    let QueuedJob {
        job_id,
        requested_count,
        worker_ref,
        cancel,
    } = job;

    match ctx.store.update_locked(job_id, claim(worker_ref)).await {
        Ok(_) => tracing::info!(requested_count, "Job claimed"),
        Err(e) if e.is_conflict() => {
            tracing::warn!(error = %e, "Job not claimable, skipping");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to claim job");
            return JobOutcome::Skipped;
        }
    }

    let started = Instant::now();
    let computer = Arc::clone(&ctx.computer);
    let computed =
        tokio::task::spawn_blocking(move || computer.compute_primes(requested_count, &cancel)).await;

    let outcome = match computed {
        Ok(Ok(primes)) => Terminal::Finish(primes),
        Ok(Err(e)) => Terminal::Fail(e.to_string()),
        Err(e) => Terminal::Fail(format!("prime computation panicked: {e}")),
    };

    let recorded = match record(ctx.store.as_ref(), &ctx.cancel_all, job_id, || outcome.mutator())
        .await
    {
        // The result itself was rejected; record the reason instead.
        Err(StoreError::Core(CoreError::Internal(msg))) => {
            record(ctx.store.as_ref(), &ctx.cancel_all, job_id, || fail(msg.clone())).await
        }
        other => other,
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match recorded {
        Ok(job) if job.status == JobStatus::Finished => {
            tracing::info!(elapsed_ms, "Job finished");
            JobOutcome::Finished
        }
        Ok(job) => {
            tracing::warn!(
                elapsed_ms,
                error = job.error_message.as_deref().unwrap_or_default(),
                "Job failed",
            );
            JobOutcome::Failed
        }
        Err(e) if e.is_conflict() => {
            tracing::warn!(elapsed_ms, error = %e, "Job already settled by another writer");
            JobOutcome::AlreadySettled
        }
        Err(e) => {
            tracing::error!(elapsed_ms, error = %e, "Failed to record job outcome, job left RUNNING");
            JobOutcome::Unrecorded
        }
    }
}

/// Terminal state computed for a job, kept so the write can be retried.
enum Terminal {
    Finish(Vec<u64>),
    Fail(String),
}

impl Terminal {
    fn mutator(&self) -> JobMutator {
        match self {
            Terminal::Finish(primes) => finish(primes.clone()),
            Terminal::Fail(message) => fail(message.clone()),
        }
    }
}

/// Apply a mutator built by `mutator`, retrying database errors.
///
/// Domain errors are returned at once. Database errors are retried up to
/// [`RECORD_ATTEMPTS`] times with doubling backoff; once `stop` is cancelled
/// the remaining attempts run without waiting.
async fn record(
    store: &dyn JobStore,
    stop: &CancellationToken,
    job_id: JobId,
    mutator: impl Fn() -> JobMutator,
) -> StoreResult<Job> {
    let mut backoff = RECORD_BACKOFF;
    let mut attempt = 1;
    loop {
        match store.update_locked(job_id, mutator()).await {
            Err(StoreError::Database(e)) if attempt < RECORD_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "Job update failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = stop.cancelled() => {}
                }
                backoff *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}
