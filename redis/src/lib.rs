//! # Stockpile Redis
//!
//! Redis-backed [`CacheStore`] implementation. Strictly fail-open: every
//! backend failure is logged and swallowed, a failed read is a miss and a
//! failed write is a no-op, so a Redis outage degrades latency but never
//! correctness. The database remains the only source of truth.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use stockpile_core::{CacheNamespace, CacheStore, InventoryError, Result};

/// Batch size for DEL during namespace eviction, bounding command size.
const EVICT_BATCH: usize = 128;

/// Fail-open cache over a shared Redis connection.
///
/// Cheap to clone; every clone shares the same multiplexed
/// [`ConnectionManager`], which reconnects automatically after a dropped
/// connection.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis.
    ///
    /// This is the only fallible entry point; once constructed, all cache
    /// operations are fail-open.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Cache`] when the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| InventoryError::Cache(format!("Failed to create Redis client: {e}")))?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            InventoryError::Cache(format!("Failed to create Redis connection manager: {e}"))
        })?;
        Ok(Self { conn_manager })
    }

    /// Collect every key matching the namespace prefix via cursor scans.
    async fn scan_keys(&self, pattern: &str) -> redis::RedisResult<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<_, String>(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn_manager.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) {
        let mut conn = self.conn_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await {
            tracing::warn!(key, error = %e, "Cache write failed, skipping");
        }
    }

    async fn evict(&self, key: &str) {
        let mut conn = self.conn_manager.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!(key, error = %e, "Cache eviction failed, entry expires by TTL");
        }
    }

    async fn evict_namespace(&self, namespace: CacheNamespace) {
        let pattern = format!("{}*", namespace.prefix());
        let keys = match self.scan_keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(
                    namespace = namespace.as_str(),
                    error = %e,
                    "Namespace scan failed, entries expire by TTL"
                );
                return;
            }
        };
        if keys.is_empty() {
            return;
        }

        let mut conn = self.conn_manager.clone();
        let count = keys.len();
        for batch in keys.chunks(EVICT_BATCH) {
            if let Err(e) = conn.del::<_, ()>(batch).await {
                tracing::warn!(
                    namespace = namespace.as_str(),
                    error = %e,
                    "Namespace eviction batch failed, entries expire by TTL"
                );
            }
        }
        tracing::debug!(namespace = namespace.as_str(), count, "Evicted namespace");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn round_trip_and_ttl() {
        let cache = RedisCache::new(REDIS_URL)
            .await
            .expect("Failed to connect to Redis");

        let key = format!("stock:{}", uuid_like());
        cache.put(&key, "42", Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("42"));

        cache.evict(&key).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn namespace_eviction_spares_other_namespaces() {
        let cache = RedisCache::new(REDIS_URL)
            .await
            .expect("Failed to connect to Redis");

        let suffix = uuid_like();
        let ledger_key = format!("ledger:all-{suffix}");
        let stock_key = format!("stock:{suffix}");
        cache.put(&ledger_key, "[]", Duration::from_secs(60)).await;
        cache.put(&stock_key, "7", Duration::from_secs(60)).await;

        cache.evict_namespace(CacheNamespace::Ledger).await;
        assert_eq!(cache.get(&ledger_key).await, None);
        assert_eq!(cache.get(&stock_key).await.as_deref(), Some("7"));

        cache.evict(&stock_key).await;
    }

    fn uuid_like() -> String {
        format!("{:x}", std::time::UNIX_EPOCH.elapsed().map_or(0, |d| d.as_nanos()))
    }
}
