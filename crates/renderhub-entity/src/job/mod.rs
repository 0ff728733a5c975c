//! Queue job entities.

pub mod model;
pub mod status;

pub use model::{CreateJob, Job, JOB_TYPE_RENDER};
pub use status::{JobPriority, JobStatus};
