//! Job handler implementations.

pub mod maintenance;
pub mod render;

pub use maintenance::{RetentionJobHandler, WorkdirSweepJobHandler};
pub use render::{RenderJobHandler, RenderService};
