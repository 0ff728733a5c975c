//! # renderhub-database
//!
//! PostgreSQL connection management, embedded migrations, and the
//! repositories for the render job queue and design records.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{DesignRepository, JobRepository, QueueStats, StaleRecovery};
