//! # renderhub-storage
//!
//! Artifact storage providers for RenderHub (local filesystem and
//! S3-compatible object stores) and the HTTP asset fetcher used to stage
//! render inputs.

pub mod fetch;
pub mod manager;
pub mod providers;

pub use fetch::HttpAssetFetcher;
pub use manager::build_artifact_storage;
