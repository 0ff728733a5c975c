//! Artifact upload to object storage.

use std::path::Path;
use std::sync::Arc;

use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use renderhub_core::AppResult;
use renderhub_core::traits::{ArtifactStorage, ByteStream, ResourceType, StoredObject, UploadTarget};
use renderhub_core::types::id::DesignId;
use renderhub_entity::render::RenderType;

use crate::error::RenderError;
use crate::postprocess::ProcessedArtifacts;

/// Object name of the preview image.
pub const PREVIEW_PUBLIC_ID: &str = "preview";

/// Storage folder for a design's artifacts.
pub fn design_folder(design_id: DesignId) -> String {
    format!("models/{design_id}")
}

/// Object name of the model for a format.
pub fn model_public_id(render_type: RenderType) -> String {
    format!("model.{}", render_type.extension())
}

/// Public URLs of the published artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    /// Model URL. Never empty.
    pub model_url: String,
    /// Preview URL, when a preview was uploaded.
    pub preview_url: Option<String>,
    /// Uploaded model size.
    pub model_bytes: u64,
}

/// Streams artifacts to the storage collaborator.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    storage: Arc<dyn ArtifactStorage>,
}

impl ArtifactPublisher {
    /// Create a publisher.
    pub fn new(storage: Arc<dyn ArtifactStorage>) -> Self {
        Self { storage }
    }

    /// Upload the model (required) and the preview (best-effort).
    pub async fn publish(
        &self,
        processed: &ProcessedArtifacts,
        design_id: DesignId,
        render_type: RenderType,
    ) -> Result<PublishedArtifacts, RenderError> {
        let folder = design_folder(design_id);

        // Sidecars go first so the model URL never resolves to a model whose
        // references are not there yet.
        for sidecar in &processed.model.sidecars {
            let target = UploadTarget::new(&folder, &sidecar.name, ResourceType::Raw)
                .with_content_type(sidecar.content_type());
            let stored = self
                .upload_file(&sidecar.path, &target)
                .await
                .map_err(RenderError::ModelUpload)?;
            debug!(design_id = %design_id, key = %stored.key, "Published model sidecar");
        }

        let model_target = UploadTarget::new(&folder, model_public_id(render_type), ResourceType::Raw)
            .with_content_type(render_type.mime_type());
        let model = self
            .upload_file(&processed.model.path, &model_target)
            .await
            .map_err(RenderError::ModelUpload)?;
        if model.secure_url.is_empty() {
            return Err(RenderError::ModelUpload(renderhub_core::AppError::storage(
                "storage returned an empty URL for the model",
            )));
        }

        info!(
            design_id = %design_id,
            render_type = %render_type,
            key = %model.key,
            size_bytes = model.size_bytes,
            sidecars = processed.model.sidecars.len(),
            "Published model"
        );

        let preview_url = match processed.preview.as_deref() {
            Some(path) => {
                let target = UploadTarget::new(&folder, PREVIEW_PUBLIC_ID, ResourceType::Image)
                    .with_content_type("image/png");
                match self.upload_file(path, &target).await {
                    Ok(stored) => Some(stored.secure_url),
                    Err(e) => {
                        warn!(
                            design_id = %design_id,
                            error = %e,
                            "Preview upload failed, continuing without preview"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Ok(PublishedArtifacts {
            model_url: model.secure_url,
            preview_url,
            model_bytes: model.size_bytes,
        })
    }

    async fn upload_file(&self, path: &Path, target: &UploadTarget) -> AppResult<StoredObject> {
        let file = tokio::fs::File::open(path).await?;
        let stream: ByteStream = Box::pin(ReaderStream::new(file));
        self.storage.upload_stream(target, stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming() {
        let id = DesignId::nil();
        assert_eq!(
            design_folder(id),
            "models/00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(model_public_id(RenderType::Gltf), "model.gltf");
        assert_eq!(model_public_id(RenderType::Stl), "model.stl");
    }

    #[tokio::test]
    async fn test_sidecars_published_beside_model() {
        use renderhub_storage::providers::LocalArtifactStorage;

        use crate::invoker::RenderedModel;
        use crate::sidecar::Sidecar;

        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let model_path = work.path().join("rendered_model.gltf");
        tokio::fs::write(&model_path, br#"{"buffers":[{"uri":"rendered_model.bin"}]}"#)
            .await
            .unwrap();
        let bin = work.path().join("rendered_model.bin");
        tokio::fs::write(&bin, b"\0\0\0\0").await.unwrap();

        let storage = LocalArtifactStorage::new(root.path(), "https://cdn.test")
            .await
            .unwrap();
        let publisher = ArtifactPublisher::new(Arc::new(storage));
        let processed = ProcessedArtifacts {
            model: RenderedModel {
                path: model_path,
                size_bytes: 42,
                render_type: RenderType::Gltf,
                sidecars: vec![Sidecar {
                    path: bin,
                    name: "rendered_model.bin".to_string(),
                }],
            },
            preview: None,
        };

        let id = DesignId::new();
        let published = publisher
            .publish(&processed, id, RenderType::Gltf)
            .await
            .unwrap();

        let folder = root.path().join(design_folder(id));
        assert!(folder.join("model.gltf").is_file());
        assert_eq!(std::fs::read(folder.join("rendered_model.bin")).unwrap(), b"\0\0\0\0");
        assert_eq!(
            published.model_url,
            format!("https://cdn.test/models/{id}/model.gltf")
        );
    }

    #[tokio::test]
    async fn test_missing_sidecar_fails_before_model_upload() {
        use renderhub_storage::providers::LocalArtifactStorage;

        use crate::invoker::RenderedModel;
        use crate::sidecar::Sidecar;

        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let model_path = work.path().join("rendered_model.obj");
        tokio::fs::write(&model_path, b"mtllib rendered_model.mtl\n").await.unwrap();

        let storage = LocalArtifactStorage::new(root.path(), "https://cdn.test")
            .await
            .unwrap();
        let publisher = ArtifactPublisher::new(Arc::new(storage));
        let processed = ProcessedArtifacts {
            model: RenderedModel {
                path: model_path,
                size_bytes: 25,
                render_type: RenderType::Obj,
                sidecars: vec![Sidecar {
                    path: work.path().join("rendered_model.mtl"),
                    name: "rendered_model.mtl".to_string(),
                }],
            },
            preview: None,
        };

        let id = DesignId::new();
        let err = publisher
            .publish(&processed, id, RenderType::Obj)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ModelUpload(_)));
        assert!(!root.path().join(design_folder(id)).join("model.obj").exists());
    }
}
