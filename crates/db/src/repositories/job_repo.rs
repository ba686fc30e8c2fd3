//! Repository for the `prime_jobs` table.
//!
//! Row locking uses `SELECT ... FOR UPDATE` inside a transaction, so every
//! `update_locked` call on one job is serialized by PostgreSQL itself.

use async_trait::async_trait;
use chrono::Utc;
use primejobs_core::error::CoreError;
use primejobs_core::job::{validate_requested_count, Job, JobMutator};
use primejobs_core::types::JobId;
use sqlx::PgPool;

use crate::models::job::{result_to_json, JobListQuery, JobRow};
use crate::store::{apply_mutator, JobStore, StoreResult};

/// Column list for `prime_jobs` queries.
const COLUMNS: &str = "\
    id, requested_count, status, created_at, started_at, completed_at, \
    result, error_message, worker_ref";

/// [`JobStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[tracing::instrument(skip(self))]
    async fn create(&self, requested_count: i64) -> StoreResult<Job> {
        let requested_count = validate_requested_count(requested_count)?;
        let job = Job::new_queued(requested_count, Utc::now());

        let query = format!(
            "INSERT INTO prime_jobs (id, requested_count, status, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job.id)
            .bind(requested_count as i32)
            .bind(job.status.as_str())
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(Job::try_from(row)?)
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        let query = format!("SELECT {COLUMNS} FROM prime_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;

        Ok(Job::try_from(row)?)
    }

    #[tracing::instrument(skip_all, fields(job_id = %id))]
    async fn update_locked(&self, id: JobId, mutator: JobMutator) -> StoreResult<Job> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM prime_jobs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;
        let current = Job::try_from(row)?;

        // Dropping `tx` on the error path rolls back and releases the lock.
        let next = apply_mutator(&current, mutator)?;
        let result = result_to_json(next.result.as_ref())?;

        let query = format!(
            "UPDATE prime_jobs \
             SET status = $2, started_at = $3, completed_at = $4, \
                 result = $5, error_message = $6, worker_ref = $7 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(next.status.as_str())
            .bind(next.started_at)
            .bind(next.completed_at)
            .bind(result)
            .bind(&next.error_message)
            .bind(&next.worker_ref)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(from = %current.status, to = %next.status, "Job updated");
        Ok(Job::try_from(row)?)
    }

    async fn list(&self, params: &JobListQuery) -> StoreResult<Vec<Job>> {
        let (limit, offset) = params.page();

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.created_before.is_some() {
            conditions.push(format!("created_at < ${bind_idx}"));
            bind_idx += 1;
        }
        if params.started_before.is_some() {
            conditions.push(format!("started_at < ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let order = if params.oldest_first { "ASC" } else { "DESC" };

        let query = format!(
            "SELECT {COLUMNS} FROM prime_jobs \
             {where_clause} \
             ORDER BY created_at {order} \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);

        if let Some(status) = params.status {
            q = q.bind(status.as_str());
        }
        if let Some(cutoff) = params.created_before {
            q = q.bind(cutoff);
        }
        if let Some(cutoff) = params.started_before {
            q = q.bind(cutoff);
        }

        q = q.bind(limit).bind(offset);

        let rows = q.fetch_all(&self.pool).await?;
        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
