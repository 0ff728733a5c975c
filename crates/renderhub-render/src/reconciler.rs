//! Links published artifacts back into the design record.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use renderhub_core::types::id::DesignId;
use renderhub_entity::design::{DesignRecord, DesignRenderPatch, RenderMetadata};
use renderhub_entity::render::{RenderOptions, RenderType};

use crate::error::RenderError;
use crate::publisher::PublishedArtifacts;
use crate::store::DesignStore;

/// Everything the reconciliation write records.
#[derive(Debug, Clone)]
pub struct Reconciliation<'a> {
    /// Published URLs.
    pub published: &'a PublishedArtifacts,
    /// Rendered format.
    pub render_type: RenderType,
    /// Options the job ran with.
    pub options: &'a RenderOptions,
    /// Time spent on the attempt so far.
    pub processing_time_ms: u64,
}

/// Writes the render patch; always the last pipeline stage.
#[derive(Debug, Clone)]
pub struct StateReconciler {
    store: Arc<dyn DesignStore>,
}

impl StateReconciler {
    /// Create a reconciler.
    pub fn new(store: Arc<dyn DesignStore>) -> Self {
        Self { store }
    }

    /// Build the patch for a render.
    pub fn patch(rec: &Reconciliation<'_>) -> DesignRenderPatch {
        let metadata = RenderMetadata {
            render_type: rec.render_type,
            model_url: rec.published.model_url.clone(),
            preview_url: rec.published.preview_url.clone(),
            timestamp: Utc::now(),
            format: rec.render_type.extension().to_string(),
            size_bytes: rec.published.model_bytes,
            quality: rec.options.quality,
            processing_time_ms: rec.processing_time_ms,
            include_physics: rec.options.include_physics,
        };
        DesignRenderPatch::new(rec.render_type, metadata)
    }

    /// Overwrite the format URL and render metadata on the design.
    pub async fn reconcile(
        &self,
        design_id: DesignId,
        rec: &Reconciliation<'_>,
    ) -> Result<DesignRecord, RenderError> {
        let patch = Self::patch(rec);
        let updated = self
            .store
            .update_design(design_id, &patch)
            .await
            .map_err(RenderError::Reconciliation)?;

        info!(
            design_id = %design_id,
            field = patch.field.column(),
            url = %patch.url,
            "Design record updated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDesignStore;
    use renderhub_entity::render::RenderQuality;

    fn published() -> PublishedArtifacts {
        PublishedArtifacts {
            model_url: "https://cdn/models/x/model.stl".to_string(),
            preview_url: None,
            model_bytes: 42,
        }
    }

    #[tokio::test]
    async fn test_reconcile_sets_url_and_metadata() {
        let store = Arc::new(MemoryDesignStore::new());
        let mut design = DesignRecord::completed(DesignId::new());
        design.metadata = serde_json::json!({"source": "ai"});
        let id = design.id;
        store.insert(design).await;

        let published = published();
        let options = RenderOptions::with_quality(RenderQuality::High);
        let rec = Reconciliation {
            published: &published,
            render_type: RenderType::Stl,
            options: &options,
            processing_time_ms: 1234,
        };
        let updated = StateReconciler::new(store.clone())
            .reconcile(id, &rec)
            .await
            .unwrap();

        assert_eq!(updated.stl_url.as_deref(), Some("https://cdn/models/x/model.stl"));
        assert!(updated.gltf_url.is_none());
        assert_eq!(updated.metadata["source"], "ai");
        assert_eq!(updated.metadata["render"]["type"], "stl");
        assert_eq!(updated.metadata["render"]["quality"], "high");
        assert_eq!(updated.metadata["render"]["sizeBytes"], 42);
        assert_eq!(updated.metadata["render"]["processingTimeMs"], 1234);
        assert!(updated.metadata["render"].get("previewUrl").is_none());
    }

    #[tokio::test]
    async fn test_missing_design_is_reconciliation_error() {
        let store = Arc::new(MemoryDesignStore::new());
        let published = published();
        let options = RenderOptions::default();
        let rec = Reconciliation {
            published: &published,
            render_type: RenderType::Gltf,
            options: &options,
            processing_time_ms: 1,
        };
        let err = StateReconciler::new(store)
            .reconcile(DesignId::new(), &rec)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Reconciliation(_)));
    }
}
