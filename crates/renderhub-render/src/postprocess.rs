//! Post-processing of an exported model: preview image and optimization.
//!
//! Both steps are best-effort. A failed preview yields no preview; a failed
//! optimization keeps the original model.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use renderhub_entity::render::{RenderOptions, RenderType};

use crate::error::RenderError;
use crate::invoker::{ExternalRenderInvoker, RenderedModel};
use crate::scripting::ScriptGenerator;

/// Hook for model optimization (mesh simplification, compression).
#[async_trait]
pub trait ModelOptimizer: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Return the model to publish. May be the input unchanged.
    async fn optimize(
        &self,
        model: RenderedModel,
        work_dir: &Path,
        options: &RenderOptions,
    ) -> Result<RenderedModel, RenderError>;
}

/// Optimizer that publishes the exported model as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughOptimizer;

#[async_trait]
impl ModelOptimizer for PassThroughOptimizer {
    fn name(&self) -> &str {
        "pass-through"
    }

    async fn optimize(
        &self,
        model: RenderedModel,
        _work_dir: &Path,
        _options: &RenderOptions,
    ) -> Result<RenderedModel, RenderError> {
        Ok(model)
    }
}

/// What the publisher receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedArtifacts {
    /// Model to publish.
    pub model: RenderedModel,
    /// Preview image, when one was generated.
    pub preview: Option<PathBuf>,
}

/// Runs the preview render and the optimizer hook.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    invoker: ExternalRenderInvoker,
    optimizer: Arc<dyn ModelOptimizer>,
    preview_enabled: bool,
    preview_timeout: Duration,
}

impl PostProcessor {
    /// Create a post-processor with the pass-through optimizer.
    pub fn new(invoker: ExternalRenderInvoker, preview_enabled: bool, preview_timeout: Duration) -> Self {
        Self {
            invoker,
            optimizer: Arc::new(PassThroughOptimizer),
            preview_enabled,
            preview_timeout,
        }
    }

    /// Replace the optimizer.
    pub fn with_optimizer(mut self, optimizer: Arc<dyn ModelOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Post-process a rendered model. Never fails.
    pub async fn post_process(
        &self,
        rendered: RenderedModel,
        work_dir: &Path,
        render_type: RenderType,
        options: &RenderOptions,
    ) -> ProcessedArtifacts {
        let preview = if self.preview_enabled {
            match self.generate_preview(&rendered.path, work_dir).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(
                        render_type = %render_type,
                        error = %e,
                        "Preview generation failed, continuing without preview"
                    );
                    None
                }
            }
        } else {
            None
        };

        let model = match self
            .optimizer
            .optimize(rendered.clone(), work_dir, options)
            .await
        {
            Ok(model) => model,
            Err(e) => {
                warn!(
                    optimizer = self.optimizer.name(),
                    error = %e,
                    "Model optimization failed, publishing original"
                );
                rendered
            }
        };

        debug!(
            model = %model.path.display(),
            has_preview = preview.is_some(),
            "Post-processing finished"
        );
        ProcessedArtifacts { model, preview }
    }

    async fn generate_preview(&self, model: &Path, work_dir: &Path) -> Result<PathBuf, RenderError> {
        let script = ScriptGenerator::write_preview_script(model, work_dir).await?;
        self.invoker
            .render_preview(&script, work_dir, self.preview_timeout)
            .await
    }
}
