//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use renderhub_core::config::WorkerConfig;
use renderhub_core::error::AppError;

use crate::jobs::maintenance::{JOB_TYPE_RETENTION, JOB_TYPE_WORKDIR_SWEEP};
use crate::queue::JobQueue;

/// Cron-based scheduler that enqueues maintenance jobs
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Job queue for enqueuing scheduled work
    queue: Arc<JobQueue>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(queue: Arc<JobQueue>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, queue })
    }

    /// Register the retention and working-directory sweep tasks
    pub async fn register_default_tasks(&self, config: &WorkerConfig) -> Result<(), AppError> {
        self.register(JOB_TYPE_RETENTION, &config.retention_cron)
            .await?;
        self.register(JOB_TYPE_WORKDIR_SWEEP, &config.workdir_sweep_cron)
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Enqueue a maintenance job of `job_type` on every tick of `cron`.
    async fn register(&self, job_type: &'static str, cron: &str) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async(cron, move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Scheduling {} job", job_type);
                if let Err(e) = queue.enqueue_maintenance(job_type).await {
                    tracing::error!("Failed to enqueue {}: {}", job_type, e);
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid cron '{}' for {}: {}", cron, job_type, e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add {} schedule: {}", job_type, e))
        })?;

        tracing::info!("Registered: {} ({})", job_type, cron);
        Ok(())
    }
}
