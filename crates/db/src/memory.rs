//! In-process job store.
//!
//! Each job lives behind its own `tokio::sync::Mutex`, which plays the role
//! of the row lock. The outer map lock is only held long enough to find or
//! insert a row, never across a mutation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use primejobs_core::error::CoreError;
use primejobs_core::job::{validate_requested_count, Job, JobMutator};
use primejobs_core::types::JobId;
use tokio::sync::{Mutex, RwLock};

use crate::models::job::JobListQuery;
use crate::store::{apply_mutator, JobStore, StoreResult};

/// [`JobStore`] kept entirely in memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryJobStore {
    rows: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, id: JobId) -> StoreResult<Arc<Mutex<Job>>> {
        let rows = self.rows.read().await;
        let row = rows.get(&id).ok_or_else(|| CoreError::job_not_found(id))?;
        Ok(Arc::clone(row))
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    #[tracing::instrument(skip(self))]
    async fn create(&self, requested_count: i64) -> StoreResult<Job> {
        let requested_count = validate_requested_count(requested_count)?;
        let job = Job::new_queued(requested_count, Utc::now());

        self.rows
            .write()
            .await
            .insert(job.id, Arc::new(Mutex::new(job.clone())));
        Ok(job)
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        let row = self.row(id).await?;
        let job = row.lock().await.clone();
        Ok(job)
    }

    #[tracing::instrument(skip_all, fields(job_id = %id))]
    async fn update_locked(&self, id: JobId, mutator: JobMutator) -> StoreResult<Job> {
        let row = self.row(id).await?;
        let mut current = row.lock().await;

        let next = apply_mutator(&current, mutator)?;
        tracing::debug!(from = %current.status, to = %next.status, "Job updated");
        *current = next.clone();
        Ok(next)
    }

    async fn list(&self, query: &JobListQuery) -> StoreResult<Vec<Job>> {
        let rows: Vec<Arc<Mutex<Job>>> = self.rows.read().await.values().cloned().collect();

        let mut jobs = Vec::new();
        for row in rows {
            let job = row.lock().await.clone();
            if query.matches(&job) {
                jobs.push(job);
            }
        }

        if query.oldest_first {
            jobs.sort_by_key(|job| job.created_at);
        } else {
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        let (limit, offset) = query.page();
        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
