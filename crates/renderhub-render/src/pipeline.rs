//! The render job orchestrator.
//!
//! [`RenderPipeline::process`] runs one attempt of a render job:
//!
//! 1. reject unsupported formats,
//! 2. load the design and check it is completed,
//! 3. take the per-design lease,
//! 4. create the working directory,
//! 5. stage, generate, invoke, post-process, publish, reconcile,
//! 6. remove the working directory and release the lease on every path,
//! 7. report the outcome to the observer and the metrics.
//!
//! Nothing before step 4 touches the filesystem, and the design record is
//! only written by the last stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use renderhub_core::config::RenderConfig;
use renderhub_core::traits::{ArtifactStorage, AssetFetcher, DesignLease};
use renderhub_core::types::id::DesignId;
use renderhub_entity::design::DesignRecord;
use renderhub_entity::render::{RenderJob, RenderType};

use crate::error::{RenderError, RenderErrorKind, RetryDisposition};
use crate::invoker::{ExternalRenderInvoker, RenderTool};
use crate::metrics::RenderMetrics;
use crate::observer::{RenderEvent, RenderObserver, TracingObserver};
use crate::postprocess::{ModelOptimizer, PostProcessor};
use crate::publisher::ArtifactPublisher;
use crate::reconciler::{Reconciliation, StateReconciler};
use crate::scripting::ScriptGenerator;
use crate::stager::AssetStager;
use crate::store::DesignStore;
use crate::workspace::WorkingDirectory;

/// Per-attempt inputs that come from the queue rather than the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// 1-based attempt number (0 when unknown).
    pub attempt: u32,
    /// Use the extended tool timeout (previous attempt timed out).
    pub extended_timeout: bool,
}

/// A completed render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSuccess {
    /// Rendered design.
    pub design_id: DesignId,
    /// Format.
    pub render_type: RenderType,
    /// Public model URL. Never empty.
    pub model_url: String,
    /// Public preview URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Published model size.
    pub size_bytes: u64,
    /// Wall-clock time of the attempt.
    pub processing_time_ms: u64,
}

/// A failed render, with retry guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFailure {
    /// Design of the job.
    pub design_id: DesignId,
    /// Format.
    pub render_type: RenderType,
    /// Failure kind.
    pub kind: RenderErrorKind,
    /// Failure message.
    pub message: String,
    /// What the queue should do next.
    pub retry: RetryDisposition,
}

/// Outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RenderResult {
    /// Published and reconciled.
    Success(RenderSuccess),
    /// Failed; the design record was not modified.
    Failure(RenderFailure),
}

impl RenderResult {
    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone)]
struct LeaseSettings {
    lease: Arc<dyn DesignLease>,
    ttl: Duration,
    key_prefix: String,
}

/// A held per-design lease.
#[derive(Debug)]
struct HeldLease {
    key: String,
    holder: String,
}

/// Orchestrates the render stages for one job at a time.
///
/// Cheap to share behind an `Arc`; concurrent calls use disjoint working
/// directories.
#[derive(Debug)]
pub struct RenderPipeline {
    config: RenderConfig,
    store: Arc<dyn DesignStore>,
    stager: AssetStager,
    invoker: ExternalRenderInvoker,
    post_processor: PostProcessor,
    publisher: ArtifactPublisher,
    reconciler: StateReconciler,
    lease: Option<LeaseSettings>,
    holder_id: String,
    observer: Arc<dyn RenderObserver>,
    metrics: Arc<RenderMetrics>,
}

impl RenderPipeline {
    /// Wire a pipeline from its collaborators.
    pub fn new(
        config: RenderConfig,
        store: Arc<dyn DesignStore>,
        storage: Arc<dyn ArtifactStorage>,
        fetcher: Arc<dyn AssetFetcher>,
        tool: Arc<dyn RenderTool>,
    ) -> Self {
        let invoker = ExternalRenderInvoker::new(tool, config.min_output_bytes);
        let post_processor = PostProcessor::new(
            invoker.clone(),
            config.preview_enabled,
            config.preview_timeout(),
        );
        Self {
            stager: AssetStager::new(fetcher, config.require_assets),
            invoker,
            post_processor,
            publisher: ArtifactPublisher::new(storage),
            reconciler: StateReconciler::new(store.clone()),
            store,
            lease: None,
            holder_id: "renderhub".to_string(),
            observer: Arc::new(TracingObserver),
            metrics: Arc::new(RenderMetrics::new()),
            config,
        }
    }

    /// Require a per-design lease for every attempt.
    ///
    /// Lease keys are `<key_prefix><designId>`.
    pub fn with_lease(
        mut self,
        lease: Arc<dyn DesignLease>,
        ttl: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        self.lease = Some(LeaseSettings {
            lease,
            ttl,
            key_prefix: key_prefix.into(),
        });
        self
    }

    /// Identify this process in lease holders.
    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    /// Replace the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the model optimizer.
    pub fn with_optimizer(mut self, optimizer: Arc<dyn ModelOptimizer>) -> Self {
        self.post_processor = self.post_processor.with_optimizer(optimizer);
        self
    }

    /// Share a metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Render configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Metrics collector.
    pub fn metrics(&self) -> &Arc<RenderMetrics> {
        &self.metrics
    }

    /// Run one attempt with default context and fold the outcome into a
    /// [`RenderResult`].
    pub async fn process(&self, job: &RenderJob) -> RenderResult {
        match self.process_with(job, RenderContext::default()).await {
            Ok(success) => RenderResult::Success(success),
            Err(e) => RenderResult::Failure(RenderFailure {
                design_id: job.design_id,
                render_type: job.render_type,
                kind: e.kind(),
                message: e.to_string(),
                retry: e.retry(),
            }),
        }
    }

    /// Run one attempt.
    #[instrument(
        skip(self, job),
        fields(design_id = %job.design_id, render_type = %job.render_type, attempt = ctx.attempt)
    )]
    pub async fn process_with(
        &self,
        job: &RenderJob,
        ctx: RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        let start = Instant::now();
        let result = self.run(job, ctx, start).await;

        match &result {
            Ok(success) => {
                self.metrics.record_success(start.elapsed(), success.size_bytes);
                self.metrics.record_preview(success.preview_url.is_some());
                self.observer.on_event(&RenderEvent::Completed {
                    design_id: job.design_id,
                    brand_id: job.brand_id,
                    user_id: job.user_id,
                    render_type: job.render_type,
                    model_url: success.model_url.clone(),
                    preview_url: success.preview_url.clone(),
                    processing_time_ms: success.processing_time_ms,
                });
            }
            Err(e) => {
                match e.kind() {
                    RenderErrorKind::NotFound
                    | RenderErrorKind::InvalidState
                    | RenderErrorKind::UnsupportedFormat
                    | RenderErrorKind::DesignBusy
                    | RenderErrorKind::LeaseUnavailable => self.metrics.record_rejected(),
                    RenderErrorKind::RenderTimeout => self.metrics.record_timeout(),
                    _ => self.metrics.record_failure(),
                }
                self.observer.on_event(&RenderEvent::Failed {
                    design_id: job.design_id,
                    brand_id: job.brand_id,
                    user_id: job.user_id,
                    render_type: job.render_type,
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn run(
        &self,
        job: &RenderJob,
        ctx: RenderContext,
        start: Instant,
    ) -> Result<RenderSuccess, RenderError> {
        if !job.render_type.is_supported() {
            return Err(RenderError::UnsupportedFormat {
                render_type: job.render_type,
            });
        }

        let design = self.load_design(job.design_id).await?;
        let lease = self.acquire_lease(job.design_id).await?;
        self.metrics.record_started();

        let result = match WorkingDirectory::create(&self.config.working_root, job.design_id).await {
            Ok(work_dir) => {
                let result = self.run_stages(job, ctx, &design, &work_dir, start).await;
                let path = work_dir.path().to_path_buf();
                if let Err(e) = work_dir.cleanup().await {
                    warn!(path = %path.display(), error = %e, "Failed to remove working directory");
                }
                result
            }
            Err(e) => Err(RenderError::Io(e)),
        };

        if let Some(held) = lease {
            self.release_lease(held).await;
        }
        result
    }

    async fn run_stages(
        &self,
        job: &RenderJob,
        ctx: RenderContext,
        design: &DesignRecord,
        work_dir: &WorkingDirectory,
        start: Instant,
    ) -> Result<RenderSuccess, RenderError> {
        let dir = work_dir.path();

        let assets = self.stager.stage(design, &job.options, dir).await?;

        let script =
            ScriptGenerator::generate(design, job.render_type, &job.options, &assets, dir).await?;

        let timeout = self.config.tool_timeout(ctx.extended_timeout);
        debug!(timeout_s = timeout.as_secs(), extended = ctx.extended_timeout, "Invoking render tool");
        let rendered = self
            .invoker
            .render(&script, dir, job.render_type, timeout)
            .await?;

        let processed = self
            .post_processor
            .post_process(rendered, dir, job.render_type, &job.options)
            .await;

        let published = self
            .publisher
            .publish(&processed, job.design_id, job.render_type)
            .await?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        self.reconciler
            .reconcile(
                job.design_id,
                &Reconciliation {
                    published: &published,
                    render_type: job.render_type,
                    options: &job.options,
                    processing_time_ms,
                },
            )
            .await?;

        info!(
            model_url = %published.model_url,
            has_preview = published.preview_url.is_some(),
            elapsed_ms = processing_time_ms,
            "Render job finished"
        );

        Ok(RenderSuccess {
            design_id: job.design_id,
            render_type: job.render_type,
            model_url: published.model_url,
            preview_url: published.preview_url,
            size_bytes: published.model_bytes,
            processing_time_ms,
        })
    }

    async fn load_design(&self, design_id: DesignId) -> Result<DesignRecord, RenderError> {
        let design = self
            .store
            .find_design(design_id)
            .await
            .map_err(RenderError::Repository)?
            .ok_or(RenderError::NotFound { design_id })?;

        if !design.status.is_renderable() {
            return Err(RenderError::InvalidState {
                design_id,
                status: design.status,
            });
        }
        Ok(design)
    }

    async fn acquire_lease(&self, design_id: DesignId) -> Result<Option<HeldLease>, RenderError> {
        let Some(settings) = &self.lease else {
            return Ok(None);
        };

        let held = HeldLease {
            key: lease_key(&settings.key_prefix, design_id),
            holder: format!("{}:{}", self.holder_id, Uuid::now_v7().simple()),
        };
        let acquired = settings
            .lease
            .try_acquire(&held.key, &held.holder, settings.ttl)
            .await
            .map_err(RenderError::Lease)?;

        if !acquired {
            return Err(RenderError::DesignBusy { design_id });
        }
        debug!(key = %held.key, backend = settings.lease.backend_name(), "Lease acquired");
        Ok(Some(held))
    }

    async fn release_lease(&self, held: HeldLease) {
        let Some(settings) = &self.lease else {
            return;
        };
        if let Err(e) = settings.lease.release(&held.key, &held.holder).await {
            warn!(key = %held.key, error = %e, "Failed to release lease");
        }
    }
}

/// Lease key for a design.
pub fn lease_key(prefix: &str, design_id: DesignId) -> String {
    format!("{prefix}{design_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_wire_shape() {
        let result = RenderResult::Failure(RenderFailure {
            design_id: DesignId::nil(),
            render_type: RenderType::Usdz,
            kind: RenderErrorKind::UnsupportedFormat,
            message: "Render type 'usdz' is not supported".to_string(),
            retry: RetryDisposition::Never,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "unsupported_format");
        assert_eq!(json["retry"], "never");
        assert!(!result.is_success());
    }

    #[test]
    fn test_lease_key() {
        assert_eq!(
            lease_key("renderhub:design-lease:", DesignId::nil()),
            "renderhub:design-lease:00000000-0000-0000-0000-000000000000"
        );
    }
}
