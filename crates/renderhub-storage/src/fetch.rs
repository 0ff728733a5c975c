//! Asset downloads over HTTP(S), with `file://` for locally mounted assets.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::result::AppResult;
use renderhub_core::traits::fetch::AssetFetcher;

/// Streams remote assets to disk with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("renderhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to create HTTP client", e)
            })?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str, dest: &Path) -> AppResult<u64> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Request to {url} failed"),
                e,
            )
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!("Asset not found: {url}")));
        }
        let response = response.error_for_status().map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Asset download returned {status}: {url}"),
                e,
            )
        })?;

        let mut file = fs::File::create(dest).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create {}", dest.display()),
                e,
            )
        })?;

        let mut stream = response.bytes_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Download of {url} interrupted"),
                    e,
                )
            })?;
            total += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write asset chunk", e)
            })?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush asset", e))?;

        Ok(total)
    }

    async fn fetch_file(&self, path: &str, dest: &Path) -> AppResult<u64> {
        fs::copy(path, dest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Asset not found: {path}"))
            } else {
                AppError::with_source(ErrorKind::Storage, format!("Failed to copy {path}"), e)
            }
        })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> AppResult<u64> {
        let result = if let Some(path) = url.strip_prefix("file://") {
            self.fetch_file(path, dest).await
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url, dest).await
        } else {
            return Err(AppError::validation(format!("Unsupported asset URL: {url}")));
        };

        match result {
            Ok(bytes) => {
                debug!(url, dest = %dest.display(), bytes, "Fetched asset");
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_url_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("mesh.glb");
        std::fs::write(&src, b"glTF-binary").unwrap();
        let dest = dir.path().join("product_model.glb");

        let fetcher = HttpAssetFetcher::new(Duration::from_secs(5)).unwrap();
        let url = format!("file://{}", src.display());
        let bytes = fetcher.fetch_to_file(&url, &dest).await.unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"glTF-binary");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpAssetFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch_to_file("file:///definitely/not/here.glb", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpAssetFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch_to_file("ftp://example.com/a.png", &dir.path().join("a.png"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
