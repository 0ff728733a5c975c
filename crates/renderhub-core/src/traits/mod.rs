//! Collaborator traits implemented by infrastructure crates.

pub mod fetch;
pub mod lease;
pub mod storage;

pub use fetch::AssetFetcher;
pub use lease::DesignLease;
pub use storage::{ArtifactStorage, ByteStream, ResourceType, StoredObject, UploadTarget};
