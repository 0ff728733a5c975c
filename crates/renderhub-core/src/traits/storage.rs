//! Artifact storage trait for pluggable object storage backends.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for uploading artifact contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Kind of resource being uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Opaque binary (model files).
    Raw,
    /// Raster image (previews).
    Image,
}

impl ResourceType {
    /// Default content type for this resource.
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Self::Raw => "application/octet-stream",
            Self::Image => "image/png",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Where an upload lands: a folder scope plus an object name within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Folder scope, e.g. `models/<designId>`.
    pub folder: String,
    /// Object name within the folder, e.g. `model.gltf`.
    pub public_id: String,
    /// Resource type.
    pub resource_type: ResourceType,
    /// Content type override.
    pub content_type: Option<String>,
}

impl UploadTarget {
    /// Create an upload target.
    pub fn new(
        folder: impl Into<String>,
        public_id: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            folder: folder.into(),
            public_id: public_id.into(),
            resource_type,
            content_type: None,
        }
    }

    /// Set an explicit content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Object key (`folder/public_id`) with redundant slashes removed.
    pub fn key(&self) -> String {
        let folder = self.folder.trim_matches('/');
        let id = self.public_id.trim_start_matches('/');
        if folder.is_empty() {
            id.to_string()
        } else {
            format!("{folder}/{id}")
        }
    }

    /// Effective content type.
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or_else(|| self.resource_type.default_content_type())
    }
}

/// A stored object returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredObject {
    /// Object key within the backend.
    pub key: String,
    /// Public URL of the object.
    pub secure_url: String,
    /// Number of bytes stored.
    pub size_bytes: u64,
}

/// Trait for artifact storage backends.
#[async_trait]
pub trait ArtifactStorage: Send + Sync + fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Stream bytes into the backend, overwriting any object at the same key.
    async fn upload_stream(&self, target: &UploadTarget, stream: ByteStream)
    -> AppResult<StoredObject>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_joins_folder_and_id() {
        let target = UploadTarget::new("models/abc/", "/model.gltf", ResourceType::Raw);
        assert_eq!(target.key(), "models/abc/model.gltf");
    }

    #[test]
    fn test_key_without_folder() {
        let target = UploadTarget::new("", "preview", ResourceType::Image);
        assert_eq!(target.key(), "preview");
    }

    #[test]
    fn test_content_type_defaults() {
        let raw = UploadTarget::new("f", "m", ResourceType::Raw);
        assert_eq!(raw.content_type(), "application/octet-stream");
        let img = UploadTarget::new("f", "p", ResourceType::Image).with_content_type("image/webp");
        assert_eq!(img.content_type(), "image/webp");
    }
}
