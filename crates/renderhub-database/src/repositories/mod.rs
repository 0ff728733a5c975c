//! Repository implementations.

pub mod design;
pub mod job;

pub use design::DesignRepository;
pub use job::{JobRepository, QueueStats, StaleRecovery};
