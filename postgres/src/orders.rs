//! Order placement and retrieval.
//!
//! Placement is an orchestration over the stock mutation core: one
//! transaction covers the order header, its items and one stock deduction
//! plus ledger entry per line. A failure on any line rolls back everything,
//! including lines already applied.

use crate::inventory::{
    apply_delta_in, check_availability, ensure_all_found, refresh_caches, validate_lines,
};
use crate::store;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use stockpile_core::cache::{self, CacheNamespace, CacheStore};
use stockpile_core::{
    lock_order, InventoryError, OperationKind, Order, OrderId, OrderItem, OrderLine, OrderStatus,
    Page, PageRequest, Result, StockDelta, UserId,
};
use uuid::Uuid;

/// Atomic multi-item order placement and cached order reads.
#[derive(Clone)]
pub struct OrderService<C> {
    pool: PgPool,
    cache: C,
}

impl<C: CacheStore> OrderService<C> {
    /// Create the service over a connection pool and a cache backend.
    pub const fn new(pool: PgPool, cache: C) -> Self {
        Self { pool, cache }
    }

    /// Place an order for several products atomically.
    ///
    /// Locks every distinct product in canonical order, validates stock for
    /// all lines (cumulatively for repeated products) before mutating any,
    /// then writes the order header, its items, the stock deductions and one
    /// ledger entry per line in a single transaction. The total is priced
    /// from the locked rows, so a concurrent price change cannot split an
    /// order across two price points.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::EmptyOrder`] / [`InventoryError::InvalidQuantity`]
    ///   before any IO.
    /// - [`InventoryError::UserNotFound`] / [`InventoryError::ProductNotFound`]
    ///   for missing references.
    /// - [`InventoryError::InsufficientStock`] naming the first failing line;
    ///   no partial state survives.
    /// - [`InventoryError::ConcurrencyConflict`] on deadlock or lock timeout,
    ///   retryable.
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: Vec<OrderLine>,
        notes: Option<String>,
    ) -> Result<Order> {
        validate_lines(&lines)?;

        let mut tx = self.pool.begin().await.map_err(store::map_db_err)?;
        if !store::user_exists(&mut tx, user_id).await? {
            return Err(InventoryError::UserNotFound { user_id });
        }

        let ordered = lock_order(lines.iter().map(|line| line.product_id));
        let products = store::products_for_update(&mut tx, &ordered).await?;
        ensure_all_found(&ordered, &products)?;
        check_availability(&lines, &products)?;

        let order_id = OrderId::new();
        let now = Utc::now();
        let price_of = |line: &OrderLine| {
            products
                .iter()
                .find(|p| p.id == line.product_id)
                .map(|p| p.price)
                .unwrap_or_default()
        };
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: price_of(line),
            })
            .collect();
        let total_price: Decimal = items.iter().map(OrderItem::subtotal).sum();

        let order = Order {
            id: order_id,
            user_id,
            total_price,
            status: OrderStatus::Pending,
            notes,
            items,
            created_at: now,
            updated_at: now,
        };

        // Header first so the per-line ledger entries can reference it.
        store::insert_order(&mut tx, &order).await?;
        for item in &order.items {
            store::insert_order_item(&mut tx, order_id, item).await?;
        }

        let mut entries = Vec::with_capacity(order.items.len());
        for line in &lines {
            let entry = apply_delta_in(
                &mut tx,
                StockDelta {
                    product_id: line.product_id,
                    delta: -line.quantity,
                    operation: OperationKind::Purchase,
                    performed_by: user_id,
                    order_id: Some(order_id),
                    reference_code: None,
                    notes: Some(format!("Order {order_id}")),
                },
            )
            .await?;
            entries.push(entry);
        }

        tx.commit().await.map_err(store::map_db_err)?;

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            lines = order.items.len(),
            total = %order.total_price,
            "Placed order"
        );
        refresh_caches(&self.cache, OperationKind::Purchase, &entries).await;
        self.cache.evict_namespace(CacheNamespace::Orders).await;
        Ok(order)
    }

    /// Fetch one order on behalf of a user, cache-first.
    ///
    /// The cache key is scoped to the requesting user; a hit for one user can
    /// never serve another. Ownership is enforced on every database read.
    ///
    /// # Errors
    ///
    /// [`InventoryError::OrderNotFound`] when missing or soft-deleted;
    /// [`InventoryError::Forbidden`] when the order belongs to someone else.
    pub async fn get_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let key = cache::order_key(order_id, user_id);
        if let Some(raw) = self.cache.get(&key).await {
            if let Ok(order) = serde_json::from_str::<Order>(&raw) {
                tracing::debug!(order_id = %order_id, "Order cache hit");
                return Ok(order);
            }
        }

        let order = store::fetch_order(&self.pool, order_id)
            .await?
            .ok_or(InventoryError::OrderNotFound { order_id })?;
        if order.user_id != user_id {
            return Err(InventoryError::Forbidden);
        }

        if let Ok(raw) = serde_json::to_string(&order) {
            self.cache
                .put(&key, &raw, CacheNamespace::Order.ttl())
                .await;
        }
        Ok(order)
    }

    /// One page of a user's orders, newest first, cache-first.
    ///
    /// Empty pages are never cached, so a user's very first order appears as
    /// soon as it commits rather than after a TTL.
    ///
    /// # Errors
    ///
    /// [`InventoryError::UserNotFound`] for an unknown user;
    /// [`InventoryError::Database`] on store failure.
    pub async fn orders_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let key = cache::orders_key(user_id, page.page, page.size);
        if let Some(raw) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_str::<Page<Order>>(&raw) {
                return Ok(cached);
            }
        }

        let mut conn = self.pool.acquire().await.map_err(store::map_db_err)?;
        if !store::user_exists(&mut conn, user_id).await? {
            return Err(InventoryError::UserNotFound { user_id });
        }
        drop(conn);

        let result = store::orders_by_user(&self.pool, user_id, page).await?;
        if !result.items.is_empty() {
            if let Ok(raw) = serde_json::to_string(&result) {
                self.cache
                    .put(&key, &raw, CacheNamespace::Orders.ttl())
                    .await;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stockpile_core::cache::MemoryCache;
    use stockpile_core::ProductId;

    fn service() -> OrderService<MemoryCache> {
        let pool = PgPool::connect_lazy("postgres://localhost:5432/stockpile_test").unwrap();
        OrderService::new(pool, MemoryCache::new())
    }

    #[tokio::test]
    async fn place_order_rejects_empty_line_list() {
        let svc = service();
        let err = svc
            .place_order(UserId::new(), Vec::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::EmptyOrder);
    }

    #[tokio::test]
    async fn place_order_rejects_non_positive_quantities() {
        let svc = service();
        let lines = vec![
            OrderLine {
                product_id: ProductId::new(),
                quantity: 2,
            },
            OrderLine {
                product_id: ProductId::new(),
                quantity: -1,
            },
        ];
        let err = svc.place_order(UserId::new(), lines, None).await.unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: -1 });
    }
}
