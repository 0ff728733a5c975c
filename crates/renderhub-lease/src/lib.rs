//! # renderhub-lease
//!
//! Time-bounded per-design exclusivity leases. The render pipeline takes a
//! lease on the design before touching the filesystem and releases it on
//! every exit path; the TTL bounds how long a crashed holder blocks a design.

pub mod memory;
pub mod noop;
pub mod redis;

use std::sync::Arc;

use tracing::info;

use renderhub_core::config::{LeaseBackend, LeaseConfig};
use renderhub_core::result::AppResult;
use renderhub_core::traits::lease::DesignLease;

pub use memory::MemoryDesignLease;
pub use noop::NoopDesignLease;
#[cfg(feature = "redis-lease")]
pub use self::redis::RedisDesignLease;

/// Build the configured lease backend.
pub async fn build_design_lease(config: &LeaseConfig) -> AppResult<Arc<dyn DesignLease>> {
    let lease: Arc<dyn DesignLease> = match config.backend {
        LeaseBackend::Memory => Arc::new(MemoryDesignLease::new()),
        LeaseBackend::None => Arc::new(NoopDesignLease),
        LeaseBackend::Redis => build_redis(config).await?,
    };
    info!(backend = lease.backend_name(), ttl_seconds = config.ttl_seconds, "Design lease ready");
    Ok(lease)
}

#[cfg(feature = "redis-lease")]
async fn build_redis(config: &LeaseConfig) -> AppResult<Arc<dyn DesignLease>> {
    Ok(Arc::new(RedisDesignLease::new(&config.redis_url).await?))
}

#[cfg(not(feature = "redis-lease"))]
async fn build_redis(_config: &LeaseConfig) -> AppResult<Arc<dyn DesignLease>> {
    Err(renderhub_core::error::AppError::configuration(
        "lease.backend = \"redis\" requires building with the `redis-lease` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_memory_and_none() {
        let mut config = LeaseConfig::default();
        let lease = build_design_lease(&config).await.unwrap();
        assert_eq!(lease.backend_name(), "memory");

        config.backend = LeaseBackend::None;
        let lease = build_design_lease(&config).await.unwrap();
        assert_eq!(lease.backend_name(), "none");
    }
}
