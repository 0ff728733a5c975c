//! Lease backend that grants everything.

use std::time::Duration;

use async_trait::async_trait;

use renderhub_core::result::AppResult;
use renderhub_core::traits::lease::DesignLease;

/// Grants every lease; used when `lease.backend = "none"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDesignLease;

#[async_trait]
impl DesignLease for NoopDesignLease {
    fn backend_name(&self) -> &str {
        "none"
    }

    async fn try_acquire(&self, _key: &str, _holder: &str, _ttl: Duration) -> AppResult<bool> {
        Ok(true)
    }

    async fn release(&self, _key: &str, _holder: &str) -> AppResult<()> {
        Ok(())
    }
}
