//! Queue retention and working-directory sweep job handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing;

use renderhub_core::config::{QueueConfig, RenderConfig};
use renderhub_entity::job::{Job, JobStatus};
use renderhub_render::sweep_orphans;

use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::JobQueue;

/// Job type for the queue retention pass.
pub const JOB_TYPE_RETENTION: &str = "job_retention";

/// Job type for the orphaned working directory sweep.
pub const JOB_TYPE_WORKDIR_SWEEP: &str = "workdir_sweep";

/// Age after which a running job counts as abandoned by its worker.
pub fn stale_after(render: &RenderConfig) -> Duration {
    render.longest_attempt()
}

/// Prunes finished jobs and requeues jobs abandoned by dead workers
#[derive(Debug)]
pub struct RetentionJobHandler {
    /// Job queue
    queue: Arc<JobQueue>,
    /// Render queue name
    queue_name: String,
    /// Completed jobs to keep
    keep_completed: i64,
    /// Failed jobs to keep
    keep_failed: i64,
    /// Running time after which a job is considered abandoned
    stale_after: Duration,
}

impl RetentionJobHandler {
    /// Create a new retention handler
    pub fn new(queue: Arc<JobQueue>, queue_config: &QueueConfig, render: &RenderConfig) -> Self {
        Self {
            queue,
            queue_name: queue_config.name.clone(),
            keep_completed: queue_config.keep_completed,
            keep_failed: queue_config.keep_failed,
            stale_after: stale_after(render),
        }
    }
}

#[async_trait]
impl JobHandler for RetentionJobHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE_RETENTION
    }

    async fn execute(&self, _job: &Job) -> Result<Option<Value>, JobExecutionError> {
        tracing::info!("Running job retention on queue '{}'", self.queue_name);

        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stale_after)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        let stale = self
            .queue
            .requeue_stale(&self.queue_name, cutoff)
            .await
            .map_err(|e| {
                JobExecutionError::transient("retention", format!("Stale requeue failed: {}", e))
            })?;
        if stale.total() > 0 {
            tracing::warn!(
                "Recovered abandoned jobs started before {}: {} requeued, {} failed out of attempts",
                cutoff,
                stale.requeued,
                stale.failed
            );
        }

        let completed = self
            .queue
            .prune(&self.queue_name, JobStatus::Completed, self.keep_completed)
            .await
            .map_err(|e| {
                JobExecutionError::transient("retention", format!("Pruning failed: {}", e))
            })?;
        let failed = self
            .queue
            .prune(&self.queue_name, JobStatus::Failed, self.keep_failed)
            .await
            .map_err(|e| {
                JobExecutionError::transient("retention", format!("Pruning failed: {}", e))
            })?;

        tracing::info!(
            "Job retention done: {} completed and {} failed jobs pruned",
            completed,
            failed
        );

        Ok(Some(serde_json::json!({
            "task": JOB_TYPE_RETENTION,
            "requeued_stale": stale.requeued,
            "failed_stale": stale.failed,
            "pruned_completed": completed,
            "pruned_failed": failed,
        })))
    }
}

/// Removes working directories left behind by crashed attempts
#[derive(Debug)]
pub struct WorkdirSweepJobHandler {
    /// Working directory root
    working_root: PathBuf,
    /// Minimum age of a directory before it is removed
    max_age: Duration,
}

impl WorkdirSweepJobHandler {
    /// Create a sweep handler from the render configuration
    pub fn new(render: &RenderConfig) -> Self {
        Self {
            working_root: render.working_root.clone(),
            max_age: Duration::from_secs(render.orphan_max_age_hours.saturating_mul(3600)),
        }
    }
}

#[async_trait]
impl JobHandler for WorkdirSweepJobHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE_WORKDIR_SWEEP
    }

    async fn execute(&self, _job: &Job) -> Result<Option<Value>, JobExecutionError> {
        tracing::info!(
            "Sweeping working directories under {}",
            self.working_root.display()
        );

        let removed = sweep_orphans(&self.working_root, self.max_age)
            .await
            .map_err(|e| {
                JobExecutionError::transient("workdir_sweep", format!("Sweep failed: {}", e))
            })?;

        tracing::info!("Removed {} orphaned working directories", removed);

        Ok(Some(serde_json::json!({
            "task": JOB_TYPE_WORKDIR_SWEEP,
            "directories_removed": removed,
        })))
    }
}
