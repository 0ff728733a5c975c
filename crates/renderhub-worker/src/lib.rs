//! Background job processing and scheduled maintenance for RenderHub.
//!
//! This crate provides:
//! - A worker runner that polls the job table and executes jobs with
//!   bounded concurrency
//! - A job executor that dispatches jobs to the handler for their type
//! - The render job handler, driving the render pipeline
//! - Retention and working-directory sweep handlers, enqueued by a cron
//!   scheduler

pub mod adapters;
pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use adapters::PgDesignStore;
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::JobQueue;
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
