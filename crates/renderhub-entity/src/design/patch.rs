//! The reconciliation patch written to a design after a render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::{RenderQuality, RenderType};

/// One of the four format-specific URL fields on a design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderUrlField {
    /// `gltf_url`.
    GltfUrl,
    /// `stl_url`.
    StlUrl,
    /// `obj_url`.
    ObjUrl,
    /// `usdz_url`.
    UsdzUrl,
}

impl RenderUrlField {
    /// The field a render type writes to.
    pub fn for_render_type(render_type: RenderType) -> Self {
        match render_type {
            RenderType::Gltf => Self::GltfUrl,
            RenderType::Stl => Self::StlUrl,
            RenderType::Obj => Self::ObjUrl,
            RenderType::Usdz => Self::UsdzUrl,
        }
    }

    /// Database column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::GltfUrl => "gltf_url",
            Self::StlUrl => "stl_url",
            Self::ObjUrl => "obj_url",
            Self::UsdzUrl => "usdz_url",
        }
    }
}

/// The `metadata.render` blob stored on a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    /// Render type that produced this entry.
    #[serde(rename = "type")]
    pub render_type: RenderType,
    /// Public model URL.
    pub model_url: String,
    /// Public preview URL, when a preview was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// When reconciliation happened.
    pub timestamp: DateTime<Utc>,
    /// Artifact file extension.
    pub format: String,
    /// Artifact size.
    pub size_bytes: u64,
    /// Quality tier used.
    pub quality: RenderQuality,
    /// End-to-end processing time up to reconciliation.
    pub processing_time_ms: u64,
    /// Physics hint from the job options, when one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_physics: Option<bool>,
}

/// Patch applied to a design by the state reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRenderPatch {
    /// Which URL field to set.
    pub field: RenderUrlField,
    /// Value for the URL field.
    pub url: String,
    /// Replacement for `metadata.render`.
    pub metadata: RenderMetadata,
}

impl DesignRenderPatch {
    /// Build the patch for a render type from its metadata.
    pub fn new(render_type: RenderType, metadata: RenderMetadata) -> Self {
        Self {
            field: RenderUrlField::for_render_type(render_type),
            url: metadata.model_url.clone(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mapping_is_total() {
        let columns: Vec<_> = RenderType::ALL
            .iter()
            .map(|t| RenderUrlField::for_render_type(*t).column())
            .collect();
        assert_eq!(columns, vec!["gltf_url", "stl_url", "obj_url", "usdz_url"]);
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = RenderMetadata {
            render_type: RenderType::Obj,
            model_url: "https://cdn/m.obj".to_string(),
            preview_url: None,
            timestamp: Utc::now(),
            format: "obj".to_string(),
            size_bytes: 2048,
            quality: RenderQuality::Low,
            processing_time_ms: 1500,
            include_physics: None,
        };
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(json["type"], "obj");
        assert_eq!(json["modelUrl"], "https://cdn/m.obj");
        assert_eq!(json["sizeBytes"], 2048);
        assert!(json.get("previewUrl").is_none());
        assert!(json.get("includePhysics").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
