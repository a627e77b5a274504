//! Ledger history queries.
//!
//! Read-only, paginated views over the append-only ledger, cache-accelerated
//! per filter and page. Date-range queries bypass the cache entirely: their
//! key space is unbounded and the hit rate does not justify the churn.

use crate::store;
use sqlx::PgPool;
use stockpile_core::cache::{CacheNamespace, CacheStore};
use stockpile_core::{LedgerEntry, LedgerFilter, Page, PageRequest, Result};

/// Cached, paginated queries over ledger history.
#[derive(Clone)]
pub struct LedgerQueryService<C> {
    pool: PgPool,
    cache: C,
}

impl<C: CacheStore> LedgerQueryService<C> {
    /// Create the service over a connection pool and a cache backend.
    pub const fn new(pool: PgPool, cache: C) -> Self {
        Self { pool, cache }
    }

    /// One page of ledger history matching `filter`, newest first.
    ///
    /// Cacheable filters are served from the cache when present; an
    /// undecodable cached value is treated as a miss. Empty pages are never
    /// cached, so new history appears as soon as it commits.
    ///
    /// # Errors
    ///
    /// [`stockpile_core::InventoryError::Database`] on store failure. An
    /// unknown product, user or order id is not an error here; it simply
    /// matches no entries.
    pub async fn query(
        &self,
        filter: &LedgerFilter,
        page: PageRequest,
    ) -> Result<Page<LedgerEntry>> {
        let key = filter.cache_key(page);
        if let Some(key) = &key {
            if let Some(raw) = self.cache.get(key).await {
                if let Ok(cached) = serde_json::from_str::<Page<LedgerEntry>>(&raw) {
                    tracing::debug!(key, "Ledger cache hit");
                    return Ok(cached);
                }
            }
        }

        let result = store::ledger_page(&self.pool, filter, page).await?;

        if let Some(key) = key {
            if !result.items.is_empty() {
                if let Ok(raw) = serde_json::to_string(&result) {
                    self.cache
                        .put(&key, &raw, CacheNamespace::Ledger.ttl())
                        .await;
                }
            }
        }
        Ok(result)
    }
}
