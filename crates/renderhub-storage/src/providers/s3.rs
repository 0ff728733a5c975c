//! S3-compatible artifact storage (requires the `s3` feature).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use bytes::BytesMut;
use futures::stream::StreamExt;
use tracing::{debug, info};

use renderhub_core::config::S3StorageConfig;
use renderhub_core::error::{AppError, ErrorKind};
use renderhub_core::result::AppResult;
use renderhub_core::traits::storage::{ArtifactStorage, ByteStream, StoredObject, UploadTarget};

/// S3-compatible artifact storage.
#[derive(Debug, Clone)]
pub struct S3ArtifactStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ArtifactStorage {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when an access key is configured;
    /// otherwise the default AWS credential chain applies.
    pub async fn new(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 artifact storage"
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint);
        }
        if !config.access_key.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "renderhub-config",
            ));
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: public_base_url(config),
        })
    }
}

/// Base URL objects are reachable under.
fn public_base_url(config: &S3StorageConfig) -> String {
    if !config.public_base_url.is_empty() {
        return config.public_base_url.trim_end_matches('/').to_string();
    }
    if !config.endpoint.is_empty() {
        return format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket
        );
    }
    format!("https://{}.s3.{}.amazonaws.com", config.bucket, config.region)
}

#[async_trait]
impl ArtifactStorage for S3ArtifactStorage {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(bucket = %self.bucket, error = %DisplayErrorContext(&e), "S3 health check failed");
                Ok(false)
            }
        }
    }

    async fn upload_stream(
        &self,
        target: &UploadTarget,
        mut stream: ByteStream,
    ) -> AppResult<StoredObject> {
        let key = target.key();

        // PutObject needs a known length; artifacts are bounded in size.
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buffer.extend_from_slice(&chunk);
        }
        let size_bytes = buffer.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(target.content_type())
            .body(S3Body::from(buffer.freeze()))
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Failed to upload {key} to bucket {}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(key = %key, bytes = size_bytes, "Uploaded artifact to S3");
        Ok(StoredObject {
            secure_url: format!("{}/{}", self.public_base_url, key),
            key,
            size_bytes,
        })
    }
}
