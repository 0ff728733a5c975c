//! Design record entities.

pub mod model;
pub mod patch;
pub mod status;

pub use model::{DesignOptions, DesignRecord};
pub use patch::{DesignRenderPatch, RenderMetadata, RenderUrlField};
pub use status::DesignStatus;
