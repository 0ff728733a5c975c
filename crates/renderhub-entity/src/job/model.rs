//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use renderhub_core::types::id::JobId;

use super::status::{JobPriority, JobStatus};

/// Job type for design renders.
pub const JOB_TYPE_RENDER: &str = "render_3d";

/// A row in the durable job queue.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Queue name.
    pub queue: String,
    /// Job type identifier (e.g. `"render_3d"`).
    pub job_type: String,
    /// Job priority.
    pub priority: JobPriority,
    /// Job-specific payload.
    pub payload: serde_json::Value,
    /// Result data on completion.
    pub result: Option<serde_json::Value>,
    /// Current status.
    pub status: JobStatus,
    /// Number of times the job has been claimed.
    pub attempts: i32,
    /// Maximum allowed attempts.
    pub max_attempts: i32,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Stable kind of the most recent failure (e.g. `render_timeout`).
    pub last_error_kind: Option<String>,
    /// Earliest time a worker may claim the job.
    pub scheduled_at: DateTime<Utc>,
    /// When the current or last attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Worker that claimed the job.
    pub worker_id: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether another attempt is allowed after the current one.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Whether the previous attempt ended because the render tool timed out.
    pub fn previous_attempt_timed_out(&self) -> bool {
        self.last_error_kind.as_deref() == Some("render_timeout")
    }
}

/// Data required to enqueue a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Queue name.
    pub queue: String,
    /// Job type identifier.
    pub job_type: String,
    /// Priority.
    pub priority: JobPriority,
    /// Job-specific payload.
    pub payload: serde_json::Value,
    /// Maximum attempts.
    pub max_attempts: i32,
    /// Delayed start; `None` means immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreateJob {
    /// A normal-priority render job.
    pub fn render(queue: impl Into<String>, payload: serde_json::Value, max_attempts: i32) -> Self {
        Self {
            queue: queue.into(),
            job_type: JOB_TYPE_RENDER.to_string(),
            priority: JobPriority::Normal,
            payload,
            max_attempts,
            scheduled_at: None,
        }
    }
}
