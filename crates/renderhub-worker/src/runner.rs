//! Worker runner: main loop that polls for jobs and executes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, watch};
use tokio::time;
use tracing;

use renderhub_core::config::{QueueConfig, WorkerConfig};
use renderhub_entity::job::Job;

use crate::executor::{JobExecutor, Settlement, settle};
use crate::queue::{JobQueue, MAINTENANCE_QUEUE};

/// Main worker runner that polls queues and executes jobs
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job queue for polling
    queue: Arc<JobQueue>,
    /// Job executor for dispatching
    executor: Arc<JobExecutor>,
    /// Worker configuration
    config: WorkerConfig,
    /// Retry policy
    queue_config: QueueConfig,
    /// Queues to poll (in priority order)
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner polling the render queue, then maintenance
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        queue_config: QueueConfig,
    ) -> Self {
        let queues = vec![queue_config.name.clone(), MAINTENANCE_QUEUE.to_string()];
        Self {
            queue,
            executor,
            config,
            queue_config,
            queues,
        }
    }

    /// Set the queues to poll
    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    /// Queues polled, in priority order
    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Worker '{}' started with concurrency={}, poll_interval={}s, queues={:?}",
            self.queue.worker_id(),
            self.config.concurrency,
            self.config.poll_interval_seconds,
            self.queues
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            if *cancel.borrow() {
                break;
            }

            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("Worker '{}' received shutdown signal", self.queue.worker_id());
                        break;
                    }
                }
                claimed = self.poll_and_execute(&semaphore) => {
                    if claimed {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                tracing::info!("Worker '{}' shutting down", self.queue.worker_id());
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(
            "Worker '{}' waiting up to {}s for in-flight jobs to complete...",
            self.queue.worker_id(),
            self.config.shutdown_grace_seconds
        );

        let max_permits = self.config.concurrency as u32;
        let drained = time::timeout(
            Duration::from_secs(self.config.shutdown_grace_seconds),
            semaphore.acquire_many(max_permits),
        )
        .await;

        match drained {
            Ok(_) => tracing::info!("Worker '{}' shut down complete", self.queue.worker_id()),
            Err(_) => tracing::warn!(
                "Worker '{}' shut down with jobs still running; they will be requeued as stale",
                self.queue.worker_id()
            ),
        }
    }

    /// Poll for a job and spawn it if a slot is free. Returns whether a job was claimed.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        let queue_refs: Vec<&str> = self.queues.iter().map(|s| s.as_str()).collect();

        match self.queue.dequeue(&queue_refs).await {
            Ok(Some(job)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);
                let queue_config = self.queue_config.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(&queue, &executor, &queue_config, job).await;
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No jobs available in queues");
                false
            }
            Err(e) => {
                tracing::error!("Failed to dequeue job: {}", e);
                false
            }
        }
    }
}

/// Execute one claimed job and record its settlement.
async fn run_job(queue: &JobQueue, executor: &JobExecutor, config: &QueueConfig, job: Job) {
    let job_id = job.id;
    tracing::info!(
        "Processing job: id={}, type='{}', attempt={}/{}",
        job_id,
        job.job_type,
        job.attempts,
        job.max_attempts
    );

    let outcome = executor.execute(&job).await;
    match settle(&job, outcome, config, Utc::now()) {
        Settlement::Complete(result) => {
            if let Err(e) = queue.complete(job_id, result.as_ref()).await {
                tracing::error!("Failed to mark job {} as completed: {}", job_id, e);
                return;
            }
            tracing::info!("Job {} completed successfully", job_id);
        }
        Settlement::Reschedule {
            kind,
            message,
            run_at,
        } => {
            tracing::warn!(
                "Job {} failed ({}), retrying at {}: {}",
                job_id,
                kind,
                run_at,
                message
            );
            if let Err(e) = queue.reschedule(job_id, &kind, &message, run_at).await {
                tracing::error!("Failed to reschedule job {}: {}", job_id, e);
            }
        }
        Settlement::Fail { kind, message } => {
            tracing::error!("Job {} failed permanently ({}): {}", job_id, kind, message);
            if let Err(e) = queue.fail(job_id, &kind, &message).await {
                tracing::error!("Failed to mark job {} as failed: {}", job_id, e);
            }
        }
    }
}
