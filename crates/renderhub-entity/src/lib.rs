//! # renderhub-entity
//!
//! Domain entity models for RenderHub: the externally owned design record
//! and the patch the render pipeline writes back to it, the render job
//! payload, and the persisted queue job row.

pub mod design;
pub mod job;
pub mod render;
