//! Job queue configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Render job queue configuration.
///
/// The queue is a PostgreSQL table claimed with `FOR UPDATE SKIP LOCKED`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueueConfig {
    /// Connection target for the queue. Defaults to `database.url` when unset.
    #[serde(default)]
    pub broker_url: Option<String>,
    /// Queue name render jobs are published to.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum delivery attempts per job.
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: i32,
    /// Base delay before redelivering a transiently failed job.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,
    /// Upper bound for the exponential redelivery delay.
    #[serde(default = "default_retry_backoff_max")]
    pub retry_backoff_max_seconds: u64,
    /// Number of completed jobs retained in the table.
    #[serde(default = "default_keep_completed")]
    pub keep_completed: i64,
    /// Number of failed jobs retained in the table.
    #[serde(default = "default_keep_failed")]
    pub keep_failed: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            broker_url: None,
            name: default_name(),
            max_attempts: default_max_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            retry_backoff_max_seconds: default_retry_backoff_max(),
            keep_completed: default_keep_completed(),
            keep_failed: default_keep_failed(),
        }
    }
}

impl QueueConfig {
    /// Delay before the next delivery of a job that has been attempted
    /// `attempt` times (1-based).
    pub fn backoff_for_attempt(&self, attempt: i32) -> std::time::Duration {
        let exp = attempt.saturating_sub(1).clamp(0, 16) as u32;
        let secs = self
            .retry_backoff_seconds
            .saturating_mul(1u64 << exp)
            .min(self.retry_backoff_max_seconds);
        std::time::Duration::from_secs(secs)
    }
}

fn default_name() -> String {
    "render-3d".to_string()
}

fn default_max_attempts() -> i32 {
    3
}

fn default_retry_backoff() -> u64 {
    30
}

fn default_retry_backoff_max() -> u64 {
    600
}

fn default_keep_completed() -> i64 {
    50
}

fn default_keep_failed() -> i64 {
    25
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = QueueConfig::default();
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(30));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(60));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(120));
        assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(600));
    }

    #[test]
    fn test_backoff_first_attempt_for_zero() {
        let config = QueueConfig::default();
        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(30));
    }
}
