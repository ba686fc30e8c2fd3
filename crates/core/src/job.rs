//! The prime job record and the mutators that advance it.
//!
//! Stores never write a job directly: every change goes through a
//! [`JobMutator`] applied to a copy of the locked row, and the before/after
//! pair is checked by [`Job::check_update`] before it is persisted.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job_status::{validate_transition, JobStatus};
use crate::types::{JobId, Timestamp, WorkerRef};

/// Largest count accepted at the storage layer (`INTEGER` column).
pub const MAX_REQUESTED_COUNT: i64 = i32::MAX as i64;

/// Persisted result payload: `{"primes": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub primes: Vec<u64>,
}

/// One prime-generation request and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub requested_count: u32,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub worker_ref: Option<String>,
}

/// A change applied to a job while its row lock is held.
pub type JobMutator = Box<dyn FnOnce(&mut Job) -> Result<(), CoreError> + Send>;

/// Reject non-positive counts before a job is admitted.
pub fn validate_requested_count(requested_count: i64) -> Result<u32, CoreError> {
    if requested_count <= 0 {
        return Err(CoreError::Validation(format!(
            "no_of_primes must be a positive integer (got {requested_count})"
        )));
    }
    if requested_count > MAX_REQUESTED_COUNT {
        return Err(CoreError::Validation(format!(
            "no_of_primes must not exceed {MAX_REQUESTED_COUNT} (got {requested_count})"
        )));
    }
    Ok(requested_count as u32)
}

impl Job {
    /// Build a fresh `QUEUED` record with a new id.
    pub fn new_queued(requested_count: u32, now: Timestamp) -> Self {
        Self {
            id: JobId::new_v4(),
            requested_count,
            status: JobStatus::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            worker_ref: None,
        }
    }

    /// The primes computed for this job, empty unless it finished.
    pub fn primes(&self) -> &[u64] {
        match (&self.status, &self.result) {
            (JobStatus::Finished, Some(result)) => &result.primes,
            _ => &[],
        }
    }

    /// Check that `next` is a legal successor of `self`.
    ///
    /// The status must move along one edge of the transition table, the
    /// identity fields must be untouched, and the per-status field
    /// invariants must hold on the new record.
    pub fn check_update(&self, next: &Job) -> Result<(), CoreError> {
        validate_transition(self.status, next.status)?;

        if next.id != self.id
            || next.requested_count != self.requested_count
            || next.created_at != self.created_at
        {
            return Err(CoreError::Conflict(format!(
                "Job {} identity fields are immutable",
                self.id
            )));
        }
        if self.started_at.is_some() && next.started_at != self.started_at {
            return Err(CoreError::Conflict(format!(
                "Job {} start time is already set",
                self.id
            )));
        }
        next.check_invariants()
    }

    /// Field invariants that must hold for a record in its current status.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let finished = self.status == JobStatus::Finished;
        if finished != self.result.is_some() {
            return Err(CoreError::Conflict(format!(
                "Job {} result must be present exactly when FINISHED (status {})",
                self.id, self.status
            )));
        }
        if self.status.is_terminal() != self.completed_at.is_some() {
            return Err(CoreError::Conflict(format!(
                "Job {} completion time must be set exactly when terminal (status {})",
                self.id, self.status
            )));
        }
        if (self.status != JobStatus::Queued) != self.started_at.is_some() {
            return Err(CoreError::Conflict(format!(
                "Job {} start time must be set once claimed (status {})",
                self.id, self.status
            )));
        }
        if self.error_message.is_some() && self.status != JobStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "Job {} carries an error but is {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

/// Claim a queued job for the worker identified by `worker_ref`.
pub fn claim(worker_ref: WorkerRef) -> JobMutator {
    Box::new(move |job: &mut Job| {
        job.status = JobStatus::Running;
        job.started_at = Some(chrono::Utc::now());
        job.worker_ref = Some(worker_ref.to_string());
        Ok(())
    })
}

/// Record a successful computation.
pub fn finish(primes: Vec<u64>) -> JobMutator {
    Box::new(move |job: &mut Job| {
        if primes.len() != job.requested_count as usize {
            return Err(CoreError::Internal(format!(
                "Job {} asked for {} primes but {} were computed",
                job.id,
                job.requested_count,
                primes.len()
            )));
        }
        job.status = JobStatus::Finished;
        job.result = Some(JobResult { primes });
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    })
}

/// Record a failed or cancelled computation.
pub fn fail(error_message: impl Into<String>) -> JobMutator {
    let error_message = error_message.into();
    Box::new(move |job: &mut Job| {
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message);
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn apply(job: &Job, mutator: JobMutator) -> Result<Job, CoreError> {
        let mut next = job.clone();
        mutator(&mut next)?;
        job.check_update(&next)?;
        Ok(next)
    }

    #[test]
    fn rejects_non_positive_counts() {
        assert_matches!(validate_requested_count(0), Err(CoreError::Validation(_)));
        assert_matches!(validate_requested_count(-3), Err(CoreError::Validation(_)));
        assert_matches!(
            validate_requested_count(MAX_REQUESTED_COUNT + 1),
            Err(CoreError::Validation(_))
        );
        assert_eq!(validate_requested_count(5).unwrap(), 5);
    }

    #[test]
    fn new_job_is_queued_and_empty() {
        let job = Job::new_queued(5, Utc::now());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.primes().is_empty());
        assert!(job.completed_at.is_none());
        job.check_invariants().unwrap();
    }

    #[test]
    fn full_lifecycle_passes_checks() {
        let queued = Job::new_queued(3, Utc::now());
        let running = apply(&queued, claim(WorkerRef::new_v4())).unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.worker_ref.is_some());

        let finished = apply(&running, finish(vec![2, 3, 5])).unwrap();
        assert_eq!(finished.primes(), &[2, 3, 5]);
        assert!(finished.completed_at.is_some());
    }

    #[test]
    fn second_claim_conflicts() {
        let queued = Job::new_queued(3, Utc::now());
        let running = apply(&queued, claim(WorkerRef::new_v4())).unwrap();
        assert_matches!(
            apply(&running, claim(WorkerRef::new_v4())),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn terminal_jobs_cannot_change() {
        let queued = Job::new_queued(1, Utc::now());
        let running = apply(&queued, claim(WorkerRef::new_v4())).unwrap();
        let failed = apply(&running, fail("boom")).unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(failed.primes().is_empty());
        assert_matches!(apply(&failed, finish(vec![2])), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn queued_cannot_skip_to_finished() {
        let queued = Job::new_queued(1, Utc::now());
        assert_matches!(apply(&queued, finish(vec![2])), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn finish_rejects_wrong_length() {
        let queued = Job::new_queued(2, Utc::now());
        let running = apply(&queued, claim(WorkerRef::new_v4())).unwrap();
        assert_matches!(apply(&running, finish(vec![2])), Err(CoreError::Internal(_)));
    }

    #[test]
    fn identity_fields_are_immutable() {
        let queued = Job::new_queued(2, Utc::now());
        let tamper: JobMutator = Box::new(|job: &mut Job| {
            job.requested_count = 10;
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            Ok(())
        });
        assert_matches!(apply(&queued, tamper), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn result_round_trips_through_json() {
        let result = JobResult {
            primes: vec![2, 3, 5, 7, 11],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({ "primes": [2, 3, 5, 7, 11] }));
        let back: JobResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
