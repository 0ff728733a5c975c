//! Storage construction from configuration.

use std::sync::Arc;

use tracing::info;

use renderhub_core::config::{StorageBackend, StorageConfig};
use renderhub_core::result::AppResult;
use renderhub_core::traits::storage::ArtifactStorage;

use crate::providers::LocalArtifactStorage;

/// Build the configured artifact storage backend.
pub async fn build_artifact_storage(config: &StorageConfig) -> AppResult<Arc<dyn ArtifactStorage>> {
    let storage: Arc<dyn ArtifactStorage> = match config.backend {
        StorageBackend::Local => Arc::new(
            LocalArtifactStorage::new(&config.local.root_path, &config.local.public_base_url)
                .await?,
        ),
        StorageBackend::S3 => build_s3(config).await?,
    };
    info!(provider = storage.provider_type(), "Artifact storage ready");
    Ok(storage)
}

#[cfg(feature = "s3")]
async fn build_s3(config: &StorageConfig) -> AppResult<Arc<dyn ArtifactStorage>> {
    Ok(Arc::new(
        crate::providers::S3ArtifactStorage::new(&config.s3).await?,
    ))
}

#[cfg(not(feature = "s3"))]
async fn build_s3(_config: &StorageConfig) -> AppResult<Arc<dyn ArtifactStorage>> {
    Err(renderhub_core::error::AppError::configuration(
        "storage.backend = \"s3\" requires building with the `s3` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderhub_core::config::LocalStorageConfig;

    #[tokio::test]
    async fn test_builds_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Local,
            local: LocalStorageConfig {
                root_path: dir.path().join("artifacts").display().to_string(),
                public_base_url: "http://localhost/artifacts".to_string(),
            },
            ..StorageConfig::default()
        };

        let storage = build_artifact_storage(&config).await.unwrap();
        assert_eq!(storage.provider_type(), "local");
        assert!(storage.health_check().await.unwrap());
    }
}
