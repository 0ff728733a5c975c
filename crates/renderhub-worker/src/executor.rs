//! Job executor: dispatches jobs to registered handlers and decides what
//! the queue does with the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing;

use renderhub_core::config::QueueConfig;
use renderhub_core::error::AppError;
use renderhub_entity::job::Job;

/// Trait for job handler implementations.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Job type this handler processes.
    fn job_type(&self) -> &str;

    /// Execute the job.
    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Retrying cannot help.
    #[error("Permanent job failure ({kind}): {message}")]
    Permanent {
        /// Stable failure kind.
        kind: String,
        /// Human-readable message.
        message: String,
    },

    /// Another attempt may succeed.
    #[error("Transient job failure ({kind}): {message}")]
    Transient {
        /// Stable failure kind.
        kind: String,
        /// Human-readable message.
        message: String,
    },

    /// Infrastructure error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Permanent failure.
    pub fn permanent(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Transient failure.
    pub fn transient(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Stable kind stored on the job row.
    pub fn kind(&self) -> &str {
        match self {
            Self::Permanent { kind, .. } | Self::Transient { kind, .. } => kind,
            Self::Internal(_) => "internal",
        }
    }

    /// Message stored on the job row.
    pub fn message(&self) -> String {
        match self {
            Self::Permanent { message, .. } | Self::Transient { message, .. } => message.clone(),
            Self::Internal(err) => err.to_string(),
        }
    }

    /// Whether the failure may go away on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Permanent { .. } => false,
            Self::Transient { .. } => true,
            Self::Internal(err) => err.kind.is_transient(),
        }
    }
}

/// What the queue does with a finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Mark completed with an optional result.
    Complete(Option<Value>),
    /// Put back in the queue, due at `run_at`.
    Reschedule {
        /// Failure kind.
        kind: String,
        /// Failure message.
        message: String,
        /// Next attempt time.
        run_at: DateTime<Utc>,
    },
    /// Mark failed for good.
    Fail {
        /// Failure kind.
        kind: String,
        /// Failure message.
        message: String,
    },
}

/// Decide the fate of an attempt.
///
/// `job.attempts` already counts the attempt that just ran. Transient
/// failures back off exponentially while attempts remain.
pub fn settle(
    job: &Job,
    outcome: Result<Option<Value>, JobExecutionError>,
    config: &QueueConfig,
    now: DateTime<Utc>,
) -> Settlement {
    let err = match outcome {
        Ok(result) => return Settlement::Complete(result),
        Err(err) => err,
    };

    let kind = err.kind().to_string();
    let message = err.message();
    if err.is_transient() && job.has_attempts_left() {
        let backoff = config.backoff_for_attempt(job.attempts);
        let run_at = now
            + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());
        Settlement::Reschedule {
            kind,
            message,
            run_at,
        }
    } else {
        Settlement::Fail { kind, message }
    }
}

/// Dispatches jobs to the appropriate handler based on `job_type`.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!("Registered job handler for type '{}'", job_type);
        self.handlers.insert(job_type, handler);
    }

    /// Execute a job by dispatching to the correct handler.
    pub async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&job.job_type).ok_or_else(|| {
            JobExecutionError::permanent(
                "unknown_job_type",
                format!("No handler registered for job type '{}'", job.job_type),
            )
        })?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            "Executing job, attempt {}/{}",
            job.attempts,
            job.max_attempts
        );

        handler.execute(job).await
    }

    /// Whether a handler is registered for a job type.
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use renderhub_core::types::id::JobId;
    use renderhub_entity::job::{JobPriority, JobStatus};

    pub(crate) fn job(job_type: &str, attempts: i32, max_attempts: i32) -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            queue: "render-3d".to_string(),
            job_type: job_type.to_string(),
            priority: JobPriority::Normal,
            payload: serde_json::json!({}),
            result: None,
            status: JobStatus::Running,
            attempts,
            max_attempts,
            last_error: None,
            last_error_kind: None,
            scheduled_at: now,
            started_at: Some(now),
            completed_at: None,
            worker_id: Some("w1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        fn job_type(&self) -> &str {
            "echo"
        }

        async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
            Ok(Some(job.payload.clone()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_type() {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(Echo));
        assert!(executor.has_handler("echo"));
        assert_eq!(executor.registered_types(), vec!["echo".to_string()]);

        let out = executor.execute(&job("echo", 1, 3)).await.unwrap();
        assert_eq!(out, Some(serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_unknown_type_is_permanent() {
        let executor = JobExecutor::new();
        let err = executor.execute(&job("nope", 1, 3)).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.kind(), "unknown_job_type");
    }

    #[test]
    fn test_settle_success() {
        let s = settle(&job("echo", 1, 3), Ok(None), &QueueConfig::default(), Utc::now());
        assert_eq!(s, Settlement::Complete(None));
    }

    #[test]
    fn test_settle_transient_backs_off() {
        let now = Utc::now();
        let config = QueueConfig::default();
        let err = JobExecutionError::transient("render_timeout", "timed out");
        match settle(&job("echo", 2, 3), Err(err), &config, now) {
            Settlement::Reschedule { kind, run_at, .. } => {
                assert_eq!(kind, "render_timeout");
                assert_eq!(run_at - now, chrono::Duration::seconds(60));
            }
            other => panic!("unexpected settlement: {other:?}"),
        }
    }

    #[test]
    fn test_settle_exhausted_fails() {
        let err = JobExecutionError::transient("model_upload", "bucket down");
        let s = settle(&job("echo", 3, 3), Err(err), &QueueConfig::default(), Utc::now());
        assert!(matches!(s, Settlement::Fail { ref kind, .. } if kind == "model_upload"));
    }

    #[test]
    fn test_settle_permanent_fails_immediately() {
        let err = JobExecutionError::permanent("invalid_state", "design is PENDING");
        let s = settle(&job("echo", 1, 5), Err(err), &QueueConfig::default(), Utc::now());
        assert!(matches!(s, Settlement::Fail { .. }));
    }

    #[test]
    fn test_settle_internal_uses_error_kind() {
        let config = QueueConfig::default();
        let db = JobExecutionError::Internal(AppError::database("connection reset"));
        assert!(matches!(
            settle(&job("echo", 1, 3), Err(db), &config, Utc::now()),
            Settlement::Reschedule { .. }
        ));

        let cfg = JobExecutionError::Internal(AppError::configuration("bad"));
        assert!(matches!(
            settle(&job("echo", 1, 3), Err(cfg), &config, Utc::now()),
            Settlement::Fail { .. }
        ));
    }
}
