//! Artifact storage provider implementations.

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalArtifactStorage;
#[cfg(feature = "s3")]
pub use s3::S3ArtifactStorage;
