//! Per-design lease configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Backend holding per-design exclusivity leases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaseBackend {
    /// In-process map. Single node only.
    #[default]
    Memory,
    /// Redis `SET NX PX`. Safe across nodes.
    Redis,
    /// No exclusivity.
    None,
}

/// Per-design lease configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LeaseConfig {
    /// Lease backend.
    #[serde(default)]
    pub backend: LeaseBackend,
    /// Redis URL for the `redis` backend.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Lease time-to-live. Bounds how long a crashed holder blocks a design.
    #[serde(default = "default_ttl")]
    #[validate(range(min = 30, max = 86400))]
    pub ttl_seconds: u64,
    /// Key prefix for lease entries.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            backend: LeaseBackend::default(),
            redis_url: default_redis_url(),
            ttl_seconds: default_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_ttl() -> u64 {
    1800
}

fn default_key_prefix() -> String {
    "renderhub:design-lease:".to_string()
}
