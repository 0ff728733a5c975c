//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use renderhub_core::config::RenderConfig;
use renderhub_core::traits::{ArtifactStorage, ByteStream, DesignLease, StoredObject, UploadTarget};
use renderhub_core::types::id::{BrandId, DesignId, ProductId};
use renderhub_core::{AppError, AppResult};
use renderhub_entity::design::{DesignRecord, DesignRenderPatch};
use renderhub_entity::render::{RenderJob, RenderOptions, RenderQuality, RenderType};
use renderhub_render::{
    ChannelObserver, DesignStore, MemoryDesignStore, RenderError, RenderEvent, RenderPipeline,
    RenderTool, ToolInvocation, ToolOutput,
};
use renderhub_storage::HttpAssetFetcher;
use renderhub_storage::providers::LocalArtifactStorage;

/// Base URL of the test artifact storage.
pub const PUBLIC_BASE: &str = "https://cdn.test/assets";
/// Lease key prefix used by the tests.
pub const LEASE_PREFIX: &str = "test:lease:";

/// How the fake tool behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// Write the model and the preview.
    Ok,
    /// Exit cleanly without writing the model.
    NoOutput,
    /// Write a zero-byte model.
    EmptyOutput,
    /// Write the model but fail the preview run.
    FailPreview,
    /// Report a timeout.
    Timeout,
    /// Write a glTF whose buffer lives in a separate `.bin` file.
    SeparateGltf,
}

/// A render tool that writes artifacts instead of spawning Blender.
#[derive(Debug)]
pub struct FakeTool {
    mode: FakeMode,
    scripts: Mutex<Vec<String>>,
    work_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeTool {
    pub fn new(mode: FakeMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            scripts: Mutex::new(Vec::new()),
            work_dirs: Mutex::new(Vec::new()),
        })
    }

    /// Every script the tool was asked to run, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Every working directory the tool ran in.
    pub fn work_dirs(&self) -> Vec<PathBuf> {
        self.work_dirs.lock().unwrap().clone()
    }

    pub fn runs(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

fn output_format(script: &str) -> Option<String> {
    script
        .lines()
        .find_map(|l| l.strip_prefix("output_format = "))
        .map(|v| v.trim_matches('"').to_string())
}

#[async_trait]
impl RenderTool for FakeTool {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RenderError> {
        let script = tokio::fs::read_to_string(&invocation.script).await?;
        self.scripts.lock().unwrap().push(script.clone());
        self.work_dirs
            .lock()
            .unwrap()
            .push(invocation.work_dir.clone());

        if let Some(format) = output_format(&script) {
            let out = invocation.work_dir.join(format!("rendered_model.{format}"));
            return match self.mode {
                FakeMode::Timeout => Err(RenderError::RenderTimeout {
                    timeout: invocation.timeout,
                }),
                FakeMode::NoOutput => Ok(ToolOutput::default()),
                FakeMode::EmptyOutput => {
                    tokio::fs::write(&out, b"").await?;
                    Ok(ToolOutput::default())
                }
                FakeMode::SeparateGltf => {
                    tokio::fs::write(
                        &out,
                        r#"{"asset":{"version":"2.0"},"buffers":[{"uri":"rendered_model.bin","byteLength":4}]}"#,
                    )
                    .await?;
                    tokio::fs::write(invocation.work_dir.join("rendered_model.bin"), b"\0\0\0\0").await?;
                    Ok(ToolOutput::default())
                }
                FakeMode::Ok | FakeMode::FailPreview => {
                    tokio::fs::write(&out, format!("{{\"asset\":\"{format}\"}}")).await?;
                    Ok(ToolOutput::default())
                }
            };
        }

        // Preview script.
        if self.mode == FakeMode::FailPreview {
            return Err(RenderError::ToolFailed {
                code: 1,
                stderr: "EEVEE unavailable".to_string(),
            });
        }
        tokio::fs::write(invocation.work_dir.join("preview.png"), b"\x89PNG").await?;
        Ok(ToolOutput::default())
    }
}

/// Storage that rejects every upload.
#[derive(Debug)]
pub struct FailingStorage;

#[async_trait]
impl ArtifactStorage for FailingStorage {
    fn provider_type(&self) -> &str {
        "failing"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(false)
    }

    async fn upload_stream(&self, _target: &UploadTarget, _stream: ByteStream) -> AppResult<StoredObject> {
        Err(AppError::storage("bucket unavailable"))
    }
}

/// Store that serves designs but fails every update.
#[derive(Debug)]
pub struct RejectingUpdatesStore(pub MemoryDesignStore);

#[async_trait]
impl DesignStore for RejectingUpdatesStore {
    async fn find_design(&self, id: DesignId) -> AppResult<Option<DesignRecord>> {
        self.0.find_design(id).await
    }

    async fn update_design(&self, _id: DesignId, _patch: &DesignRenderPatch) -> AppResult<DesignRecord> {
        Err(AppError::database("connection reset during update"))
    }
}

/// Pipeline wired to in-process collaborators inside a temp directory.
pub struct TestPipeline {
    pub pipeline: RenderPipeline,
    pub store: MemoryDesignStore,
    pub tool: Arc<FakeTool>,
    pub events: tokio::sync::mpsc::Receiver<RenderEvent>,
    pub dir: TempDir,
}

impl TestPipeline {
    pub async fn new(mode: FakeMode) -> Self {
        Self::build(mode, None, false).await
    }

    pub async fn with_storage(mode: FakeMode, storage: Arc<dyn ArtifactStorage>) -> Self {
        Self::build(mode, Some(storage), false).await
    }

    /// Design updates fail; `store` still holds the seeded records.
    pub async fn with_failing_updates(mode: FakeMode) -> Self {
        Self::build(mode, None, true).await
    }

    async fn build(
        mode: FakeMode,
        storage: Option<Arc<dyn ArtifactStorage>>,
        reject_updates: bool,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig {
            working_root: dir.path().join("work"),
            ..RenderConfig::default()
        };

        let storage = match storage {
            Some(storage) => storage,
            None => Arc::new(
                LocalArtifactStorage::new(dir.path().join("storage"), PUBLIC_BASE)
                    .await
                    .unwrap(),
            ),
        };
        let fetcher = Arc::new(HttpAssetFetcher::new(Duration::from_secs(5)).unwrap());
        let store = MemoryDesignStore::new();
        let design_store: Arc<dyn DesignStore> = if reject_updates {
            Arc::new(RejectingUpdatesStore(store.clone()))
        } else {
            Arc::new(store.clone())
        };
        let tool = FakeTool::new(mode);
        let (observer, events) = ChannelObserver::channel(16);

        let pipeline = RenderPipeline::new(
            config,
            design_store,
            storage,
            fetcher,
            tool.clone(),
        )
        .with_observer(Arc::new(observer));

        Self {
            pipeline,
            store,
            tool,
            events,
            dir,
        }
    }

    /// Require the per-design lease.
    pub fn with_lease(mut self, lease: Arc<dyn DesignLease>, ttl: Duration) -> Self {
        self.pipeline = self.pipeline.with_lease(lease, ttl, LEASE_PREFIX);
        self
    }

    pub fn work_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn storage_root(&self) -> PathBuf {
        self.dir.path().join("storage")
    }

    /// Insert a completed design whose mesh and image are local files.
    pub async fn seed_design(&self, material: &str) -> DesignRecord {
        let assets = self.dir.path().join("assets");
        tokio::fs::create_dir_all(&assets).await.unwrap();
        let mesh = assets.join("base.glb");
        let image = assets.join("print.png");
        tokio::fs::write(&mesh, b"glTF-binary").await.unwrap();
        tokio::fs::write(&image, b"\x89PNG-design").await.unwrap();

        let mut design = DesignRecord::completed(DesignId::new());
        design.product_id = Some(ProductId::new());
        design.brand_id = Some(BrandId::new());
        design.product_model_url = Some(file_url(&mesh));
        design.high_res_url = Some(file_url(&image));
        design.options.material = Some(material.to_string());
        self.store.insert(design.clone()).await;
        design
    }

    /// Number of entries left under the working root.
    pub fn leftover_work_dirs(&self) -> usize {
        match std::fs::read_dir(self.work_root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

pub fn job(design: &DesignRecord, render_type: RenderType, quality: RenderQuality) -> RenderJob {
    RenderJob {
        design_id: design.id,
        product_id: design.product_id.unwrap_or_default(),
        brand_id: design.brand_id.unwrap_or_default(),
        user_id: None,
        render_type,
        options: RenderOptions::with_quality(quality),
    }
}
