//! The render job payload.

use serde::{Deserialize, Serialize};

use renderhub_core::types::id::{BrandId, DesignId, ProductId, UserId};

use super::{RenderOptions, RenderType};

/// A queued request to render a design into one 3D format.
///
/// Immutable once dequeued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    /// Design to render.
    pub design_id: DesignId,
    /// Product the design customizes.
    pub product_id: ProductId,
    /// Owning brand.
    pub brand_id: BrandId,
    /// User who requested the render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Output format.
    pub render_type: RenderType,
    /// Render options.
    #[serde(default)]
    pub options: RenderOptions,
}

impl RenderJob {
    /// Decode a job from its queue payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }

    /// Encode the job as a queue payload.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderQuality;

    #[test]
    fn test_payload_shape() {
        let job = RenderJob {
            design_id: DesignId::new(),
            product_id: ProductId::new(),
            brand_id: BrandId::new(),
            user_id: None,
            render_type: RenderType::Stl,
            options: RenderOptions::with_quality(RenderQuality::Low),
        };
        let payload = job.to_payload().expect("encode");
        assert_eq!(payload["renderType"], "stl");
        assert_eq!(payload["options"]["quality"], "low");
        assert!(payload.get("userId").is_none());

        let decoded = RenderJob::from_payload(&payload).expect("decode");
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_unknown_render_type_rejected() {
        let payload = serde_json::json!({
            "designId": DesignId::new(),
            "productId": ProductId::new(),
            "brandId": BrandId::new(),
            "renderType": "fbx",
        });
        assert!(RenderJob::from_payload(&payload).is_err());
    }
}
