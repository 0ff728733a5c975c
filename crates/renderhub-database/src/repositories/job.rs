//! Job repository: the durable render queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::result::AppResult;
use renderhub_core::types::id::JobId;
use renderhub_entity::job::{CreateJob, Job, JobStatus};

/// Per-status job counts for one queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    /// Queue name.
    pub queue: String,
    /// Count per status; statuses with no jobs are zero.
    pub counts: BTreeMap<String, i64>,
}

impl QueueStats {
    /// Count for a status.
    pub fn count(&self, status: JobStatus) -> i64 {
        self.counts.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Total jobs across all statuses.
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}

/// Outcome of a stale-job sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StaleRecovery {
    /// Jobs handed back to the queue.
    pub requeued: u64,
    /// Jobs that had spent their last attempt.
    pub failed: u64,
}

impl StaleRecovery {
    /// Total jobs recovered.
    pub fn total(&self) -> u64 {
        self.requeued + self.failed
    }
}

/// Repository for queue operations on `render_jobs`.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM render_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// List the most recent jobs of a queue, optionally filtered by status.
    pub async fn list_recent(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: i64,
    ) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM render_jobs \
             WHERE queue = $1 AND ($2::job_status IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(queue)
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    /// Add a job to the queue.
    pub async fn enqueue(&self, data: &CreateJob) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO render_jobs (id, queue, job_type, priority, payload, max_attempts, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW())) RETURNING *",
        )
        .bind(JobId::new())
        .bind(&data.queue)
        .bind(&data.job_type)
        .bind(data.priority)
        .bind(&data.payload)
        .bind(data.max_attempts)
        .bind(data.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue job", e))
    }

    /// Claim the next due job of a queue (SKIP LOCKED for concurrent workers).
    ///
    /// The claimed job is `running`, owned by `worker_id`, and has its
    /// attempt counter incremented.
    pub async fn dequeue(&self, queue: &str, worker_id: &str) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE render_jobs SET status = 'running', started_at = NOW(), worker_id = $2, \
             attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                SELECT id FROM render_jobs \
                WHERE queue = $1 AND status = 'pending' AND scheduled_at <= NOW() \
                  AND attempts < max_attempts \
                ORDER BY \
                    CASE priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 WHEN 'low' THEN 3 END, \
                    scheduled_at ASC, created_at ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(queue)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to dequeue job", e))
    }

    /// Mark a running job as completed.
    pub async fn complete(&self, id: JobId, result: Option<&serde_json::Value>) -> AppResult<()> {
        sqlx::query(
            "UPDATE render_jobs SET status = 'completed', result = $2, completed_at = NOW(), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))?;
        Ok(())
    }

    /// Mark a job as terminally failed.
    pub async fn fail(&self, id: JobId, kind: &str, message: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE render_jobs SET status = 'failed', last_error = $2, last_error_kind = $3, \
             completed_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .bind(kind)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark job as failed", e)
        })?;
        Ok(())
    }

    /// Put a failed attempt back in the queue, due at `run_at`.
    pub async fn reschedule(
        &self,
        id: JobId,
        kind: &str,
        message: &str,
        run_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE render_jobs SET status = 'pending', last_error = $2, last_error_kind = $3, \
             scheduled_at = $4, worker_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .bind(kind)
        .bind(run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reschedule job", e))?;
        Ok(())
    }

    /// Reset a failed or cancelled job to pending with a fresh attempt budget.
    ///
    /// Returns `false` when the job is not in a retryable state.
    pub async fn retry(&self, id: JobId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status = 'pending', attempts = 0, scheduled_at = NOW(), \
             started_at = NULL, completed_at = NULL, worker_id = NULL, updated_at = NOW() \
             WHERE id = $1 AND status IN ('failed', 'cancelled')",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to retry job", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Cancel a job that has not started yet.
    ///
    /// Returns `false` when the job is no longer pending.
    pub async fn cancel(&self, id: JobId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status = 'cancelled', completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cancel job", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Recover running jobs claimed before `started_before`.
    ///
    /// Their worker died without acknowledging them. Each one either goes
    /// back to the queue or, when it had no attempts left, fails with
    /// `worker_lost`.
    pub async fn requeue_stale(
        &self,
        queue: &str,
        started_before: DateTime<Utc>,
    ) -> AppResult<StaleRecovery> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let stale: Vec<(JobId, i32, i32)> = sqlx::query_as(
            "SELECT id, attempts, max_attempts FROM render_jobs \
             WHERE queue = $1 AND status = 'running' AND started_at < $2 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(queue)
        .bind(started_before)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find stale jobs", e))?;

        let mut recovery = StaleRecovery::default();
        for (id, attempts, max_attempts) in stale {
            let status = JobStatus::after_worker_lost(attempts, max_attempts);
            sqlx::query(
                "UPDATE render_jobs SET status = $2, worker_id = NULL, scheduled_at = NOW(), \
                 last_error = 'worker lost', last_error_kind = 'worker_lost', \
                 completed_at = CASE WHEN $2 = 'failed'::job_status THEN NOW() ELSE NULL END, \
                 updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to recover stale job", e)
            })?;

            if status == JobStatus::Failed {
                recovery.failed += 1;
            } else {
                recovery.requeued += 1;
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit stale recovery", e)
        })?;
        Ok(recovery)
    }

    /// Job counts by status for a queue.
    pub async fn stats(&self, queue: &str) -> AppResult<QueueStats> {
        let rows: Vec<(JobStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM render_jobs WHERE queue = $1 GROUP BY status",
        )
        .bind(queue)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))?;

        let mut counts: BTreeMap<String, i64> = JobStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in rows {
            counts.insert(status.as_str().to_string(), count);
        }

        Ok(QueueStats {
            queue: queue.to_string(),
            counts,
        })
    }

    /// Keep only the newest `keep` jobs of a terminal status; delete the rest.
    pub async fn prune_retained(&self, queue: &str, status: JobStatus, keep: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM render_jobs WHERE id IN ( \
                SELECT id FROM render_jobs WHERE queue = $1 AND status = $2 \
                ORDER BY completed_at DESC NULLS LAST, created_at DESC \
                OFFSET $3 \
             )",
        )
        .bind(queue)
        .bind(status)
        .bind(keep.max(0))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to prune jobs", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_stats_helpers() {
        let mut counts = BTreeMap::new();
        counts.insert("pending".to_string(), 3);
        counts.insert("failed".to_string(), 1);
        let stats = QueueStats {
            queue: "render-3d".to_string(),
            counts,
        };
        assert_eq!(stats.count(JobStatus::Pending), 3);
        assert_eq!(stats.count(JobStatus::Running), 0);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_stale_recovery_total() {
        let recovery = StaleRecovery {
            requeued: 2,
            failed: 1,
        };
        assert_eq!(recovery.total(), 3);
        assert_eq!(StaleRecovery::default().total(), 0);
    }
}
