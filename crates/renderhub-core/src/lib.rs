//! # renderhub-core
//!
//! Core crate for RenderHub. Contains the configuration schema, typed
//! identifiers, the collaborator traits the render pipeline talks to
//! (artifact storage, asset fetching, per-design leases), and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other RenderHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
