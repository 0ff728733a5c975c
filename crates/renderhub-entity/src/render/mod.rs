//! Render job payload and its option types.

pub mod job;
pub mod options;
pub mod render_type;

pub use job::RenderJob;
pub use options::{CustomMaterial, QualitySettings, RenderOptions, RenderQuality};
pub use render_type::RenderType;
