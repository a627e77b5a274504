//! Application state shared across HTTP handlers.

use sqlx::PgPool;
use stockpile_postgres::{InventoryService, LedgerQueryService, OrderService};
use stockpile_redis::RedisCache;

/// Shared state: the three domain services over a common pool and cache.
///
/// Cheap to clone; the pool and the Redis connection are both internally
/// shared.
#[derive(Clone)]
pub struct AppState {
    /// Stock mutations and cached stock reads.
    pub inventory: InventoryService<RedisCache>,
    /// Order placement and cached order reads.
    pub orders: OrderService<RedisCache>,
    /// Filtered, paginated ledger history.
    pub ledger: LedgerQueryService<RedisCache>,
}

impl AppState {
    /// Build the state from a connected pool and cache.
    #[must_use]
    pub fn new(pool: PgPool, cache: RedisCache) -> Self {
        Self {
            inventory: InventoryService::new(pool.clone(), cache.clone()),
            orders: OrderService::new(pool.clone(), cache.clone()),
            ledger: LedgerQueryService::new(pool, cache),
        }
    }
}
