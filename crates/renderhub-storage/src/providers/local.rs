//! Local filesystem artifact storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::result::AppResult;
use renderhub_core::traits::storage::{ArtifactStorage, ByteStream, StoredObject, UploadTarget};

/// Publishes artifacts under a local root, served at a public base URL.
#[derive(Debug, Clone)]
pub struct LocalArtifactStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalArtifactStorage {
    /// Create a storage rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: impl AsRef<Path>, public_base_url: &str) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object key to a path within the root.
    ///
    /// Rejects keys that would escape the root.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let clean = key.trim_start_matches('/');
        if clean.is_empty() || clean.split('/').any(|part| part == "..") {
            return Err(AppError::validation(format!("Invalid object key: {key}")));
        }
        Ok(self.root.join(clean))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ArtifactStorage for LocalArtifactStorage {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.is_dir())
    }

    async fn upload_stream(
        &self,
        target: &UploadTarget,
        mut stream: ByteStream,
    ) -> AppResult<StoredObject> {
        let key = target.key();
        let full_path = self.resolve(&key)?;
        self.ensure_parent(&full_path).await?;

        // Write to a sibling temp file so readers never see a partial object.
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = full_path.with_file_name(format!(".{file_name}.partial"));
        let mut file = fs::File::create(&partial).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {key}"),
                e,
            )
        })?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&partial).await;
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        "Stream read error",
                        e,
                    ));
                }
            };
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))?;
        drop(file);

        fs::rename(&partial, &full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to finalize file: {key}"),
                e,
            )
        })?;

        debug!(key = %key, bytes = total_bytes, "Stored artifact");
        Ok(StoredObject {
            secure_url: self.public_url(&key),
            key,
            size_bytes: total_bytes,
        })
    }
}
