//! # renderhub-render
//!
//! The render pipeline: turns a completed design into a published 3D model
//! by driving an external tool (Blender) through a generated scene script.
//!
//! Stages run strictly in order for one job:
//!
//! | Stage | Type |
//! |-------|------|
//! | stage inputs | [`AssetStager`] |
//! | generate script | [`ScriptGenerator`] |
//! | run tool | [`ExternalRenderInvoker`] over a [`RenderTool`] |
//! | preview + optimize | [`PostProcessor`] |
//! | upload | [`ArtifactPublisher`] |
//! | link to design | [`StateReconciler`] |
//!
//! [`RenderPipeline`] ties them together and owns the working directory and
//! per-design lease for the attempt.

pub mod error;
pub mod invoker;
pub mod materials;
pub mod metrics;
pub mod observer;
pub mod pipeline;
pub mod postprocess;
pub mod publisher;
pub mod reconciler;
pub mod scripting;
pub mod sidecar;
pub mod stager;
pub mod store;
pub mod workspace;

pub use error::{RenderError, RenderErrorKind, RetryDisposition};
pub use invoker::{BlenderTool, ExternalRenderInvoker, RenderTool, RenderedModel, ToolInvocation, ToolOutput};
pub use materials::MaterialSpec;
pub use metrics::{RenderMetrics, RenderMetricsSnapshot};
pub use observer::{ChannelObserver, CompositeObserver, RenderEvent, RenderObserver, TracingObserver};
pub use pipeline::{RenderContext, RenderFailure, RenderPipeline, RenderResult, RenderSuccess};
pub use postprocess::{ModelOptimizer, PassThroughOptimizer, PostProcessor, ProcessedArtifacts};
pub use publisher::{ArtifactPublisher, PublishedArtifacts};
pub use reconciler::StateReconciler;
pub use scripting::{SceneSpec, ScriptGenerator};
pub use sidecar::Sidecar;
pub use stager::{AssetStager, StagedAssets};
pub use store::{DesignStore, MemoryDesignStore};
pub use workspace::{WorkingDirectory, sweep_orphans};
