//! Shared domain types.

pub mod id;

pub use id::{BrandId, DesignId, JobId, ProductId, UserId};
