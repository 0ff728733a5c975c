//! Render job handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use renderhub_entity::job::{JOB_TYPE_RENDER, Job};
use renderhub_entity::render::RenderJob;
use renderhub_render::{RenderContext, RenderError, RenderPipeline, RenderSuccess};

use crate::executor::{JobExecutionError, JobHandler};

/// Runs one render attempt.
#[async_trait]
pub trait RenderService: Send + Sync + std::fmt::Debug {
    /// Render a job.
    async fn render(&self, job: &RenderJob, ctx: RenderContext)
    -> Result<RenderSuccess, RenderError>;
}

#[async_trait]
impl RenderService for RenderPipeline {
    async fn render(
        &self,
        job: &RenderJob,
        ctx: RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        self.process_with(job, ctx).await
    }
}

/// Handles render jobs
#[derive(Debug)]
pub struct RenderJobHandler {
    /// Render service
    service: Arc<dyn RenderService>,
}

impl RenderJobHandler {
    /// Create a new render job handler
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        Self { service }
    }
}

/// Map a render failure to the queue's retry classes.
pub fn classify(err: &RenderError) -> JobExecutionError {
    let kind = err.kind().as_str();
    let message = err.to_string();
    if err.retry().is_retryable() {
        JobExecutionError::transient(kind, message)
    } else {
        JobExecutionError::permanent(kind, message)
    }
}

#[async_trait]
impl JobHandler for RenderJobHandler {
    fn job_type(&self) -> &str {
        JOB_TYPE_RENDER
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let render = RenderJob::from_payload(&job.payload).map_err(|e| {
            JobExecutionError::permanent("invalid_payload", format!("Invalid render payload: {}", e))
        })?;

        let ctx = RenderContext {
            attempt: u32::try_from(job.attempts).unwrap_or(0),
            extended_timeout: job.previous_attempt_timed_out(),
        };
        if ctx.extended_timeout {
            tracing::info!(
                job_id = %job.id,
                "Previous attempt timed out; using extended tool timeout"
            );
        }

        match self.service.render(&render, ctx).await {
            Ok(success) => {
                let result = serde_json::to_value(&success)
                    .map_err(|e| JobExecutionError::Internal(e.into()))?;
                Ok(Some(result))
            }
            Err(err) => Err(classify(&err)),
        }
    }
}
