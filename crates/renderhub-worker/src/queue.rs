//! Job queue abstraction for enqueuing and dequeuing background jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing;

use renderhub_core::error::AppError;
use renderhub_core::types::id::JobId;
use renderhub_database::repositories::{JobRepository, QueueStats, StaleRecovery};
use renderhub_entity::job::{CreateJob, Job, JobPriority, JobStatus};
use renderhub_entity::render::RenderJob;

/// Queue scheduled maintenance jobs are published to.
pub const MAINTENANCE_QUEUE: &str = "maintenance";

/// Job queue for enqueuing and dequeuing work
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Job repository for database persistence
    repo: Arc<JobRepository>,
    /// Worker identifier for claiming jobs
    worker_id: String,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(repo: Arc<JobRepository>, worker_id: impl Into<String>) -> Self {
        Self {
            repo,
            worker_id: worker_id.into(),
        }
    }

    /// Identifier jobs are claimed under.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Enqueue a new job
    pub async fn enqueue(&self, params: &CreateJob) -> Result<Job, AppError> {
        let job = self
            .repo
            .enqueue(params)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue job: {}", e)))?;

        tracing::debug!(
            "Enqueued job: id={}, type='{}', queue='{}', priority={:?}",
            job.id,
            job.job_type,
            job.queue,
            job.priority
        );

        Ok(job)
    }

    /// Enqueue a render job on `queue`.
    pub async fn enqueue_render(
        &self,
        queue: &str,
        render: &RenderJob,
        priority: JobPriority,
        max_attempts: i32,
    ) -> Result<Job, AppError> {
        let payload = render.to_payload()?;
        let mut params = CreateJob::render(queue, payload, max_attempts);
        params.priority = priority;
        self.enqueue(&params).await
    }

    /// Enqueue a single-attempt maintenance task.
    pub async fn enqueue_maintenance(&self, job_type: &str) -> Result<Job, AppError> {
        let params = CreateJob {
            queue: MAINTENANCE_QUEUE.to_string(),
            job_type: job_type.to_string(),
            priority: JobPriority::Low,
            payload: serde_json::json!({ "task": job_type }),
            max_attempts: 1,
            scheduled_at: None,
        };
        self.enqueue(&params).await
    }

    /// Dequeue the next available job from the given queues, in order
    pub async fn dequeue(&self, queues: &[&str]) -> Result<Option<Job>, AppError> {
        for queue in queues {
            let job = self
                .repo
                .dequeue(queue, &self.worker_id)
                .await
                .map_err(|e| AppError::internal(format!("Failed to dequeue job: {}", e)))?;

            if let Some(job) = job {
                tracing::debug!(
                    "Dequeued job: id={}, type='{}', queue='{}'",
                    job.id,
                    job.job_type,
                    job.queue
                );
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    /// Find a job by ID
    pub async fn find(&self, job_id: JobId) -> Result<Option<Job>, AppError> {
        self.repo.find_by_id(job_id).await
    }

    /// Most recent jobs of a queue
    pub async fn recent(
        &self,
        queue: &str,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<Job>, AppError> {
        self.repo.list_recent(queue, status, limit).await
    }

    /// Mark a job as completed successfully
    pub async fn complete(&self, job_id: JobId, result: Option<&Value>) -> Result<(), AppError> {
        self.repo
            .complete(job_id, result)
            .await
            .map_err(|e| AppError::internal(format!("Failed to complete job: {}", e)))?;

        tracing::debug!("Job completed: id={}", job_id);
        Ok(())
    }

    /// Mark a job as failed
    pub async fn fail(&self, job_id: JobId, kind: &str, error: &str) -> Result<(), AppError> {
        self.repo
            .fail(job_id, kind, error)
            .await
            .map_err(|e| AppError::internal(format!("Failed to mark job as failed: {}", e)))?;

        tracing::debug!("Job failed: id={}, kind={}, error='{}'", job_id, kind, error);
        Ok(())
    }

    /// Return a failed attempt to the queue, due at `run_at`
    pub async fn reschedule(
        &self,
        job_id: JobId,
        kind: &str,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.repo
            .reschedule(job_id, kind, error, run_at)
            .await
            .map_err(|e| AppError::internal(format!("Failed to reschedule job: {}", e)))?;

        tracing::debug!("Job rescheduled: id={}, run_at={}", job_id, run_at);
        Ok(())
    }

    /// Retry a failed or cancelled job. Returns `false` if it was in another state.
    pub async fn retry(&self, job_id: JobId) -> Result<bool, AppError> {
        let retried = self
            .repo
            .retry(job_id)
            .await
            .map_err(|e| AppError::internal(format!("Failed to retry job: {}", e)))?;

        tracing::debug!("Job retry requested: id={}, accepted={}", job_id, retried);
        Ok(retried)
    }

    /// Cancel a pending job. Returns `false` if it already started.
    pub async fn cancel(&self, job_id: JobId) -> Result<bool, AppError> {
        let cancelled = self
            .repo
            .cancel(job_id)
            .await
            .map_err(|e| AppError::internal(format!("Failed to cancel job: {}", e)))?;

        tracing::debug!("Job cancel requested: id={}, accepted={}", job_id, cancelled);
        Ok(cancelled)
    }

    /// Requeue jobs whose worker vanished, failing those out of attempts
    pub async fn requeue_stale(
        &self,
        queue: &str,
        started_before: DateTime<Utc>,
    ) -> Result<StaleRecovery, AppError> {
        self.repo
            .requeue_stale(queue, started_before)
            .await
            .map_err(|e| AppError::internal(format!("Failed to requeue stale jobs: {}", e)))
    }

    /// Keep the newest `keep` jobs of a terminal status
    pub async fn prune(&self, queue: &str, status: JobStatus, keep: i64) -> Result<u64, AppError> {
        self.repo
            .prune_retained(queue, status, keep)
            .await
            .map_err(|e| AppError::internal(format!("Failed to prune jobs: {}", e)))
    }

    /// Get queue statistics
    pub async fn stats(&self, queue: &str) -> Result<QueueStats, AppError> {
        self.repo.stats(queue).await
    }
}
