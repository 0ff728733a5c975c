//! Design record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renderhub_core::types::id::{BrandId, DesignId, ProductId};

use super::patch::{DesignRenderPatch, RenderUrlField};
use super::status::DesignStatus;
use crate::render::RenderType;

/// Customization options stored on a design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignOptions {
    /// Material type used for the material lookup (`gold`, `silver`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// Other customization keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DesignOptions {
    /// Decode options from the stored JSON, tolerating non-object values.
    pub fn from_json(value: Option<serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

/// A completed customer design, as read by the render pipeline.
///
/// The record is owned by the persistence layer. The pipeline only reads it,
/// except for the final render patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    /// Design identifier.
    pub id: DesignId,
    /// Product the design customizes.
    pub product_id: Option<ProductId>,
    /// Owning brand.
    pub brand_id: Option<BrandId>,
    /// Lifecycle status.
    pub status: DesignStatus,
    /// URL of the product's base 3D mesh.
    pub product_model_url: Option<String>,
    /// URL of the generated high-resolution 2D image.
    pub high_res_url: Option<String>,
    /// Customization options.
    pub options: DesignOptions,
    /// Published glTF URL.
    pub gltf_url: Option<String>,
    /// Published STL URL.
    pub stl_url: Option<String>,
    /// Published OBJ URL.
    pub obj_url: Option<String>,
    /// Published USDZ URL.
    pub usdz_url: Option<String>,
    /// Free-form metadata; the pipeline owns the `render` key.
    pub metadata: serde_json::Value,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DesignRecord {
    /// A completed design with no assets, for tests and tooling.
    pub fn completed(id: DesignId) -> Self {
        Self {
            id,
            product_id: None,
            brand_id: None,
            status: DesignStatus::Completed,
            product_model_url: None,
            high_res_url: None,
            options: DesignOptions::default(),
            gltf_url: None,
            stl_url: None,
            obj_url: None,
            usdz_url: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            updated_at: None,
        }
    }

    /// Material type string, or `"default"` when unset or blank.
    pub fn material_type(&self) -> &str {
        self.options
            .material
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("default")
    }

    /// Published URL for a format, if any.
    pub fn url_for(&self, render_type: RenderType) -> Option<&str> {
        match RenderUrlField::for_render_type(render_type) {
            RenderUrlField::GltfUrl => self.gltf_url.as_deref(),
            RenderUrlField::StlUrl => self.stl_url.as_deref(),
            RenderUrlField::ObjUrl => self.obj_url.as_deref(),
            RenderUrlField::UsdzUrl => self.usdz_url.as_deref(),
        }
    }

    /// Apply a render patch in place with overwrite semantics.
    ///
    /// Sets the format URL and replaces `metadata.render`, keeping every
    /// other metadata key.
    pub fn apply_render_patch(&mut self, patch: &DesignRenderPatch) -> Result<(), serde_json::Error> {
        let url = Some(patch.url.clone());
        match patch.field {
            RenderUrlField::GltfUrl => self.gltf_url = url,
            RenderUrlField::StlUrl => self.stl_url = url,
            RenderUrlField::ObjUrl => self.obj_url = url,
            RenderUrlField::UsdzUrl => self.usdz_url = url,
        }

        let render = serde_json::to_value(&patch.metadata)?;
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert("render".to_string(), render);
        }
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::patch::RenderMetadata;
    use crate::render::RenderQuality;

    fn patch(render_type: RenderType, url: &str) -> DesignRenderPatch {
        DesignRenderPatch::new(
            render_type,
            RenderMetadata {
                render_type,
                model_url: url.to_string(),
                preview_url: None,
                timestamp: Utc::now(),
                format: render_type.extension().to_string(),
                size_bytes: 10,
                quality: RenderQuality::Medium,
                processing_time_ms: 5,
                include_physics: None,
            },
        )
    }

    #[test]
    fn test_material_type_default() {
        let mut design = DesignRecord::completed(DesignId::new());
        assert_eq!(design.material_type(), "default");
        design.options.material = Some("  ".to_string());
        assert_eq!(design.material_type(), "default");
        design.options.material = Some("gold".to_string());
        assert_eq!(design.material_type(), "gold");
    }

    #[test]
    fn test_apply_patch_overwrites_and_keeps_other_metadata() {
        let mut design = DesignRecord::completed(DesignId::new());
        design.metadata = serde_json::json!({ "source": "ai", "render": { "stale": true } });

        design
            .apply_render_patch(&patch(RenderType::Gltf, "https://cdn/a.gltf"))
            .expect("apply");
        design
            .apply_render_patch(&patch(RenderType::Gltf, "https://cdn/b.gltf"))
            .expect("apply");

        assert_eq!(design.url_for(RenderType::Gltf), Some("https://cdn/b.gltf"));
        assert_eq!(design.metadata["source"], "ai");
        assert_eq!(design.metadata["render"]["modelUrl"], "https://cdn/b.gltf");
        assert!(design.metadata["render"].get("stale").is_none());
        assert!(design.stl_url.is_none());
    }

    #[test]
    fn test_options_tolerate_garbage() {
        let opts = DesignOptions::from_json(Some(serde_json::json!("not an object")));
        assert_eq!(opts, DesignOptions::default());

        let opts = DesignOptions::from_json(Some(serde_json::json!({
            "material": "steel",
            "engraving": "hello"
        })));
        assert_eq!(opts.material.as_deref(), Some("steel"));
        assert_eq!(opts.extra["engraving"], "hello");
    }
}
