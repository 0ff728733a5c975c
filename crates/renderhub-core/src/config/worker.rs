//! Background worker configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Render worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of render jobs processed in parallel.
    ///
    /// Each job drives a CPU/GPU-heavy subprocess, so this stays small.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 8))]
    pub concurrency: usize,
    /// Interval in seconds between job queue polls.
    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 1, max = 300))]
    pub poll_interval_seconds: u64,
    /// Maximum time to wait for in-flight jobs on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Cron expression for the job retention pass.
    #[serde(default = "default_retention_cron")]
    pub retention_cron: String,
    /// Cron expression for the orphaned working directory sweep.
    #[serde(default = "default_sweep_cron")]
    pub workdir_sweep_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            shutdown_grace_seconds: default_shutdown_grace(),
            retention_cron: default_retention_cron(),
            workdir_sweep_cron: default_sweep_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    2
}

fn default_shutdown_grace() -> u64 {
    360
}

fn default_retention_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_sweep_cron() -> String {
    "0 15 * * * *".to_string()
}
