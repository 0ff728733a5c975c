//! Redis-backed design lease using Lua scripts for atomicity.
//!
//! Suitable for multi-node deployments.

#[cfg(feature = "redis-lease")]
mod implementation {
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::{debug, info};

    use renderhub_core::error::AppError;
    use renderhub_core::result::AppResult;
    use renderhub_core::traits::lease::DesignLease;

    /// Acquire or refresh.
    ///
    /// KEYS[1] = lease key
    /// ARGV[1] = holder
    /// ARGV[2] = ttl in milliseconds
    ///
    /// Returns 1 when the caller holds the lease afterwards, 0 otherwise.
    const ACQUIRE_SCRIPT: &str = r#"
        local current = redis.call('GET', KEYS[1])
        if current == ARGV[1] then
            redis.call('PEXPIRE', KEYS[1], ARGV[2])
            return 1
        end
        if current then
            return 0
        end
        redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2])
        return 1
    "#;

    /// Compare-and-delete.
    const RELEASE_SCRIPT: &str = r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
    "#;

    /// Redis design lease for multi-node deployments.
    #[derive(Clone)]
    pub struct RedisDesignLease {
        conn: redis::aio::ConnectionManager,
    }

    impl std::fmt::Debug for RedisDesignLease {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisDesignLease").finish_non_exhaustive()
        }
    }

    impl RedisDesignLease {
        /// Connect to Redis.
        pub async fn new(redis_url: &str) -> AppResult<Self> {
            let client = redis::Client::open(redis_url)
                .map_err(|e| AppError::lease(format!("Redis connection failed: {e}")))?;
            let conn = client
                .get_connection_manager()
                .await
                .map_err(|e| AppError::lease(format!("Redis connection manager failed: {e}")))?;
            info!("Redis design lease initialized");
            Ok(Self { conn })
        }
    }

    #[async_trait]
    impl DesignLease for RedisDesignLease {
        fn backend_name(&self) -> &str {
            "redis"
        }

        async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool> {
            let mut conn = self.conn.clone();
            let ttl_ms = ttl.as_millis().max(1) as u64;
            let acquired: i64 = redis::Script::new(ACQUIRE_SCRIPT)
                .key(key)
                .arg(holder)
                .arg(ttl_ms)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| AppError::lease(format!("Lease acquire failed: {e}")))?;
            debug!(key, holder, acquired = acquired == 1, "Lease acquire");
            Ok(acquired == 1)
        }

        async fn release(&self, key: &str, holder: &str) -> AppResult<()> {
            let mut conn = self.conn.clone();
            let _: i64 = redis::Script::new(RELEASE_SCRIPT)
                .key(key)
                .arg(holder)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| AppError::lease(format!("Lease release failed: {e}")))?;
            Ok(())
        }
    }
}

#[cfg(feature = "redis-lease")]
pub use implementation::RedisDesignLease;
