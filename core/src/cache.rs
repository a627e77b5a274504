//! Cache coherence policy.
//!
//! The cache accelerates reads and is never the system of record. All cache
//! operations fail open: an implementation logs and swallows backend errors,
//! returning a miss (or doing nothing) so that callers fall back to the
//! source of truth. A cache outage must never fail a request that would
//! otherwise succeed.
//!
//! Namespaces partition the key space per cached class, each with its own
//! TTL. Single-entity keys are evicted or refreshed exactly; list caches,
//! whose affected pages cannot be determined from a write, are evicted in
//! full via [`full_evictions`].

use crate::state::{OperationKind, OrderId, ProductId, UserId};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════
// Namespaces & TTLs
// ═══════════════════════════════════════════════════════════════════════

/// A cached class of values, with its key prefix and per-class TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Single product detail views.
    Product,
    /// Paginated product list views.
    Products,
    /// Per-product stock counters.
    Stock,
    /// Single order detail views.
    Order,
    /// Per-user paginated order lists.
    Orders,
    /// Paginated ledger query results.
    Ledger,
}

impl CacheNamespace {
    /// Key prefix for this namespace, without the trailing separator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Products => "products",
            Self::Stock => "stock",
            Self::Order => "order",
            Self::Orders => "orders",
            Self::Ledger => "ledger",
        }
    }

    /// Time-to-live for entries of this class.
    ///
    /// Short for highly volatile classes (stock, ledger), longer for slower
    /// moving ones. These are tuning knobs, not correctness requirements: no
    /// ledger invariant depends on them.
    #[must_use]
    pub const fn ttl(self) -> Duration {
        const MINUTE: u64 = 60;
        match self {
            Self::Product => Duration::from_secs(15 * MINUTE),
            Self::Products => Duration::from_secs(5 * MINUTE),
            Self::Stock => Duration::from_secs(3 * MINUTE),
            Self::Order => Duration::from_secs(5 * MINUTE),
            Self::Orders => Duration::from_secs(3 * MINUTE),
            Self::Ledger => Duration::from_secs(2 * MINUTE),
        }
    }

    /// Build a key inside this namespace.
    #[must_use]
    pub fn key(self, suffix: &str) -> String {
        format!("{}:{suffix}", self.as_str())
    }

    /// The match prefix covering every key in this namespace.
    #[must_use]
    pub fn prefix(self) -> String {
        format!("{}:", self.as_str())
    }
}

/// Key for a product's cached stock counter.
#[must_use]
pub fn stock_key(product_id: ProductId) -> String {
    CacheNamespace::Stock.key(&product_id.to_string())
}

/// Key for a cached product detail view.
#[must_use]
pub fn product_key(product_id: ProductId) -> String {
    CacheNamespace::Product.key(&product_id.to_string())
}

/// Key for a cached order detail view, scoped to the requesting user so a
/// cached response can never leak across users.
#[must_use]
pub fn order_key(order_id: OrderId, user_id: UserId) -> String {
    CacheNamespace::Order.key(&format!("{order_id}-{user_id}"))
}

/// Key for one page of a user's order list.
#[must_use]
pub fn orders_key(user_id: UserId, page: u32, size: u32) -> String {
    CacheNamespace::Orders.key(&format!("{user_id}-{page}-{size}"))
}

// ═══════════════════════════════════════════════════════════════════════
// Eviction Table
// ═══════════════════════════════════════════════════════════════════════

/// List namespaces to evict in full after a committed mutation of the given
/// kind.
///
/// Every mutation invalidates the product list views (stock appears there)
/// and the ledger query caches (a new entry exists). Order caches are the
/// orchestrator's concern: it additionally evicts [`CacheNamespace::Orders`]
/// when a placement commits. Per-product keys (`stock:{id}`, `product:{id}`)
/// are refreshed/evicted exactly and are not part of this table.
#[must_use]
pub const fn full_evictions(kind: OperationKind) -> &'static [CacheNamespace] {
    match kind {
        OperationKind::Restock
        | OperationKind::Purchase
        | OperationKind::Return
        | OperationKind::Adjustment
        | OperationKind::Damaged
        | OperationKind::Lost => &[CacheNamespace::Products, CacheNamespace::Ledger],
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Store Trait
// ═══════════════════════════════════════════════════════════════════════

/// Best-effort key-value cache.
///
/// All methods are infallible from the caller's view: implementations log
/// backend failures and return a miss (`None`) or no-op instead. Concurrent
/// writes to the same key are last-write-wins, tolerable because the cache
/// is never authoritative.
pub trait CacheStore: Send + Sync {
    /// Look up a value; `None` on miss *or* backend failure.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Option<String>> + Send;

    /// Store a value with the given TTL.
    fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = ()> + Send;

    /// Remove a single key.
    fn evict(&self, key: &str) -> impl std::future::Future<Output = ()> + Send;

    /// Remove every key in a namespace.
    fn evict_namespace(
        &self,
        namespace: CacheNamespace,
    ) -> impl std::future::Future<Output = ()> + Send;
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory implementation (tests)
// ═══════════════════════════════════════════════════════════════════════

/// In-memory [`CacheStore`] with real TTL expiry, for tests.
#[cfg(feature = "test-utils")]
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: std::sync::Arc<
        std::sync::Mutex<std::collections::HashMap<String, (String, std::time::Instant)>>,
    >,
}

#[cfg(feature = "test-utils")]
impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = std::time::Instant::now();
        #[allow(clippy::unwrap_used)]
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|(_, dies)| *dies > now).count()
    }

    /// Whether the cache holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(feature = "test-utils")]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        #[allow(clippy::unwrap_used)]
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(_, dies)| *dies > std::time::Instant::now())
            .map(|(value, _)| value.clone())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) {
        #[allow(clippy::unwrap_used)]
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            (value.to_string(), std::time::Instant::now() + ttl),
        );
    }

    async fn evict(&self, key: &str) {
        #[allow(clippy::unwrap_used)]
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }

    async fn evict_namespace(&self, namespace: CacheNamespace) {
        let prefix = namespace.prefix();
        #[allow(clippy::unwrap_used)]
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|key, _| !key.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OperationKind;

    #[test]
    fn namespace_prefixes_do_not_collide() {
        // "product:" must not match keys of "products:"; prefix matching is
        // on the full "{ns}:" string.
        let single = CacheNamespace::Product.prefix();
        let list_key = CacheNamespace::Products.key("0-20");
        assert!(!list_key.starts_with(&single));
    }

    #[test]
    fn volatile_classes_have_shorter_ttls() {
        assert!(CacheNamespace::Ledger.ttl() < CacheNamespace::Products.ttl());
        assert!(CacheNamespace::Stock.ttl() < CacheNamespace::Product.ttl());
    }

    #[test]
    fn every_mutation_kind_evicts_lists_and_ledger() {
        for kind in [
            OperationKind::Restock,
            OperationKind::Purchase,
            OperationKind::Return,
            OperationKind::Adjustment,
            OperationKind::Damaged,
            OperationKind::Lost,
        ] {
            let evicted = full_evictions(kind);
            assert!(evicted.contains(&CacheNamespace::Products));
            assert!(evicted.contains(&CacheNamespace::Ledger));
        }
    }

    #[test]
    fn order_keys_are_user_scoped() {
        let order = OrderId::new();
        let alice = UserId::new();
        let bob = UserId::new();
        assert_ne!(order_key(order, alice), order_key(order, bob));
    }

    #[tokio::test]
    async fn memory_cache_round_trip_and_eviction() {
        let cache = MemoryCache::new();
        cache.put("stock:p1", "7", Duration::from_secs(60)).await;
        cache.put("ledger:all-0-20", "[]", Duration::from_secs(60)).await;

        assert_eq!(cache.get("stock:p1").await.as_deref(), Some("7"));
        assert_eq!(cache.get("stock:p2").await, None);

        cache.evict_namespace(CacheNamespace::Ledger).await;
        assert_eq!(cache.get("ledger:all-0-20").await, None);
        assert_eq!(cache.get("stock:p1").await.as_deref(), Some("7"));

        cache.evict("stock:p1").await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn memory_cache_respects_ttl() {
        let cache = MemoryCache::new();
        cache.put("stock:p1", "7", Duration::from_millis(0)).await;
        assert_eq!(cache.get("stock:p1").await, None);
    }
}
