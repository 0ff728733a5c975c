//! Per-design exclusivity lease trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// A time-bounded exclusivity token keyed by an arbitrary string.
///
/// Implementations must make `try_acquire` atomic and `release` a no-op
/// unless the caller is the current holder.
#[async_trait]
pub trait DesignLease: Send + Sync + std::fmt::Debug + 'static {
    /// Backend name, for logging.
    fn backend_name(&self) -> &str;

    /// Try to take the lease for `key` on behalf of `holder`.
    ///
    /// Returns `false` if another holder has an unexpired lease. Re-acquiring
    /// by the same holder refreshes the TTL.
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool>;

    /// Release the lease for `key` if `holder` still owns it.
    async fn release(&self, key: &str, holder: &str) -> AppResult<()>;
}
