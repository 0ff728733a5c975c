//! Input asset staging.
//!
//! Copies the product base mesh and the design image into the job working
//! directory. A missing or unreachable asset is not fatal on its own: the
//! scene falls back to a placeholder mesh and the plain material.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use renderhub_core::traits::AssetFetcher;
use renderhub_entity::design::DesignRecord;
use renderhub_entity::render::RenderOptions;

use crate::error::RenderError;
use crate::materials::MaterialSpec;

/// Staged name of the product base mesh (binary glTF).
pub const PRODUCT_MODEL_NAME: &str = "product_model.glb";
/// Staged name of the design image.
pub const DESIGN_IMAGE_NAME: &str = "design_image.png";

/// Local copies of a design's inputs plus the resolved material.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedAssets {
    /// Staged base mesh, if it could be fetched.
    pub product_model: Option<PathBuf>,
    /// Staged design image, if it could be fetched.
    pub design_image: Option<PathBuf>,
    /// Material for the product.
    pub material: MaterialSpec,
}

impl StagedAssets {
    /// Whether at least one input asset was staged.
    pub fn has_any(&self) -> bool {
        self.product_model.is_some() || self.design_image.is_some()
    }
}

/// Fetches design inputs into a working directory.
#[derive(Debug, Clone)]
pub struct AssetStager {
    fetcher: Arc<dyn AssetFetcher>,
    require_assets: bool,
}

impl AssetStager {
    /// Create a stager.
    ///
    /// With `require_assets`, staging fails when neither asset is available.
    pub fn new(fetcher: Arc<dyn AssetFetcher>, require_assets: bool) -> Self {
        Self {
            fetcher,
            require_assets,
        }
    }

    /// Stage the design's inputs into `work_dir`.
    pub async fn stage(
        &self,
        design: &DesignRecord,
        options: &RenderOptions,
        work_dir: &Path,
    ) -> Result<StagedAssets, RenderError> {
        let product_model = match design.product_model_url.as_deref() {
            Some(url) => {
                let dest = work_dir.join(model_file_name(url));
                self.fetch_optional("product model", url, &dest).await
            }
            None => None,
        };

        let design_image = match design.high_res_url.as_deref() {
            Some(url) => {
                let dest = work_dir.join(DESIGN_IMAGE_NAME);
                self.fetch_optional("design image", url, &dest).await
            }
            None => None,
        };

        let material =
            MaterialSpec::resolve(design.material_type(), options.custom_materials.as_ref());

        let staged = StagedAssets {
            product_model,
            design_image,
            material,
        };

        if self.require_assets && !staged.has_any() {
            return Err(RenderError::AssetStaging {
                message: format!("no input assets could be staged for design {}", design.id),
            });
        }

        debug!(
            design_id = %design.id,
            has_model = staged.product_model.is_some(),
            has_image = staged.design_image.is_some(),
            material = design.material_type(),
            "Staged render inputs"
        );
        Ok(staged)
    }

    async fn fetch_optional(&self, what: &str, url: &str, dest: &Path) -> Option<PathBuf> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        match self.fetcher.fetch_to_file(url, dest).await {
            Ok(bytes) if bytes > 0 => Some(dest.to_path_buf()),
            Ok(_) => {
                warn!(asset = what, url = %url, "Staged asset is empty, ignoring");
                let _ = tokio::fs::remove_file(dest).await;
                None
            }
            Err(e) => {
                warn!(asset = what, url = %url, error = %e, "Failed to stage asset");
                None
            }
        }
    }
}

/// Keep a `.gltf` extension when the source is text glTF; everything else
/// is staged as binary glTF.
fn model_file_name(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".gltf") {
        "product_model.gltf"
    } else {
        PRODUCT_MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use renderhub_core::types::id::DesignId;
    use renderhub_core::{AppError, AppResult};
    use renderhub_entity::render::CustomMaterial;

    use crate::materials::{DEFAULT, GOLD};

    /// Serves URLs starting with `ok:` and fails everything else.
    #[derive(Debug)]
    struct StubFetcher;

    #[async_trait]
    impl AssetFetcher for StubFetcher {
        async fn fetch_to_file(&self, url: &str, dest: &Path) -> AppResult<u64> {
            match url.strip_prefix("ok:") {
                Some(body) => {
                    tokio::fs::write(dest, body).await?;
                    Ok(body.len() as u64)
                }
                None => Err(AppError::external_service(format!("unreachable: {url}"))),
            }
        }
    }

    fn design() -> DesignRecord {
        let mut design = DesignRecord::completed(DesignId::new());
        design.options.material = Some("gold".to_string());
        design
    }

    #[tokio::test]
    async fn test_stages_both_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut design = design();
        design.product_model_url = Some("ok:mesh".to_string());
        design.high_res_url = Some("ok:png".to_string());

        let stager = AssetStager::new(Arc::new(StubFetcher), false);
        let staged = stager
            .stage(&design, &RenderOptions::default(), dir.path())
            .await
            .unwrap();

        assert_eq!(staged.product_model, Some(dir.path().join(PRODUCT_MODEL_NAME)));
        assert_eq!(staged.design_image, Some(dir.path().join(DESIGN_IMAGE_NAME)));
        assert_eq!(staged.material, GOLD);
    }

    #[tokio::test]
    async fn test_unreachable_asset_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut design = design();
        design.product_model_url = Some("http://down/mesh.glb".to_string());
        design.high_res_url = Some("ok:png".to_string());

        let stager = AssetStager::new(Arc::new(StubFetcher), true);
        let staged = stager
            .stage(&design, &RenderOptions::default(), dir.path())
            .await
            .unwrap();
        assert!(staged.product_model.is_none());
        assert!(staged.design_image.is_some());
    }

    #[tokio::test]
    async fn test_require_assets_fails_when_nothing_staged() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AssetStager::new(Arc::new(StubFetcher), true);
        let err = stager
            .stage(&design(), &RenderOptions::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::AssetStaging { .. }));

        let lenient = AssetStager::new(Arc::new(StubFetcher), false);
        let staged = lenient
            .stage(&design(), &RenderOptions::default(), dir.path())
            .await
            .unwrap();
        assert!(!staged.has_any());
    }

    #[tokio::test]
    async fn test_custom_material_overrides_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut design = design();
        design.options.material = Some("unobtanium".to_string());
        let options = RenderOptions {
            custom_materials: Some(CustomMaterial {
                roughness: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        };

        let stager = AssetStager::new(Arc::new(StubFetcher), false);
        let staged = stager.stage(&design, &options, dir.path()).await.unwrap();
        assert_eq!(staged.material.base_color, DEFAULT.base_color);
        assert_eq!(staged.material.roughness, 0.9);
    }

    #[test]
    fn test_model_file_name() {
        assert_eq!(model_file_name("https://cdn/x/base.glb"), "product_model.glb");
        assert_eq!(model_file_name("https://cdn/x/base.GLTF?v=2"), "product_model.gltf");
        assert_eq!(model_file_name("https://cdn/x/base"), "product_model.glb");
    }
}
