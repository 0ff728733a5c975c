//! In-memory lease table for single-node deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;
use tracing::debug;

use renderhub_core::result::AppResult;
use renderhub_core::traits::lease::DesignLease;

#[derive(Debug)]
struct Entry {
    holder: String,
    expires_at: Instant,
}

/// In-memory design lease. Suitable for single-node deployments only.
#[derive(Debug, Clone, Default)]
pub struct MemoryDesignLease {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryDesignLease {
    /// Create an empty lease table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired leases.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.value().expires_at > now)
            .count()
    }
}

#[async_trait]
impl DesignLease for MemoryDesignLease {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let fresh = Entry {
            holder: holder.to_string(),
            expires_at: now + ttl,
        };

        // The shard lock is held for the whole check-and-insert.
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.expires_at > now && current.holder != holder {
                    debug!(key, holder = %current.holder, "Lease held elsewhere");
                    return Ok(false);
                }
                occupied.insert(fresh);
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }
        Ok(true)
    }

    async fn release(&self, key: &str, holder: &str) -> AppResult<()> {
        self.entries.remove_if(key, |_, e| e.holder == holder);
        Ok(())
    }
}
