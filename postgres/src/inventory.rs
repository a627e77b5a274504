//! Stock mutation core.
//!
//! Applies exactly one signed quantity delta to one product's stock inside an
//! atomic unit, producing a matching ledger entry, with cache side effects.
//! All six mutating operations (restock, single purchase, multi purchase,
//! return, manual adjustment, order item deduction) funnel through
//! [`apply_delta_in`]; they differ only in validation wrappers and
//! [`OperationKind`].
//!
//! The stock write and the ledger append commit together or not at all.
//! Cache invalidation runs only after a successful commit, and a cache
//! failure never rolls anything back.

use crate::store;
use chrono::Utc;
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::collections::HashMap;
use stockpile_core::cache::{self, full_evictions, CacheNamespace, CacheStore};
use stockpile_core::{
    lock_order, InventoryError, LedgerEntry, LedgerEntryId, OperationKind, OrderId, OrderLine,
    Product, ProductId, Result, StockDelta, UserId,
};

/// Transactional engine for single- and multi-row stock mutations.
#[derive(Clone)]
pub struct InventoryService<C> {
    pool: PgPool,
    cache: C,
}

impl<C: CacheStore> InventoryService<C> {
    /// Create the service over a connection pool and a cache backend.
    pub const fn new(pool: PgPool, cache: C) -> Self {
        Self { pool, cache }
    }

    /// Apply one signed stock delta atomically.
    ///
    /// Acquires the row-level write lock before reading `stock_before`,
    /// rejects decrements that would drive stock negative, persists the new
    /// stock value and appends one ledger entry in the same transaction,
    /// then refreshes/evicts the affected cache entries.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`] for a zero delta.
    /// - [`InventoryError::ProductNotFound`] / [`InventoryError::UserNotFound`] /
    ///   [`InventoryError::OrderNotFound`] for missing references.
    /// - [`InventoryError::InsufficientStock`] when the resulting stock would
    ///   be negative; nothing is mutated.
    /// - [`InventoryError::ConcurrencyConflict`] on lock/deadlock timeout,
    ///   retryable by the caller.
    pub async fn apply_delta(&self, delta: StockDelta) -> Result<LedgerEntry> {
        if delta.delta == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: 0 });
        }
        let operation = delta.operation;

        let mut tx = self.pool.begin().await.map_err(store::map_db_err)?;
        let entry = apply_delta_in(&mut tx, delta).await?;
        tx.commit().await.map_err(store::map_db_err)?;

        refresh_caches(&self.cache, operation, std::slice::from_ref(&entry)).await;
        Ok(entry)
    }

    /// Add stock from a restock delivery. `quantity` must be positive.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_delta`]; additionally
    /// [`InventoryError::InvalidQuantity`] for `quantity <= 0`.
    pub async fn restock(
        &self,
        product_id: ProductId,
        quantity: i64,
        operator: UserId,
        notes: Option<String>,
    ) -> Result<LedgerEntry> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        self.apply_delta(StockDelta {
            product_id,
            delta: quantity,
            operation: OperationKind::Restock,
            performed_by: operator,
            order_id: None,
            reference_code: None,
            notes,
        })
        .await
    }

    /// Deduct stock for a single-item purchase. `quantity` must be `>= 1`.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_delta`].
    pub async fn purchase(
        &self,
        product_id: ProductId,
        quantity: i64,
        customer: UserId,
        order_ref: Option<OrderId>,
        notes: Option<String>,
    ) -> Result<LedgerEntry> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        self.apply_delta(StockDelta {
            product_id,
            delta: -quantity,
            operation: OperationKind::Purchase,
            performed_by: customer,
            order_id: order_ref,
            reference_code: None,
            notes,
        })
        .await
    }

    /// Deduct stock for several products in one atomic unit.
    ///
    /// Locks all rows in canonical order, validates availability for every
    /// line (cumulatively for repeated products) before mutating any, then
    /// applies the deltas line by line in the order supplied. Either every
    /// deduction commits or none does.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_delta`]; additionally
    /// [`InventoryError::EmptyOrder`] for an empty item list.
    pub async fn purchase_many(
        &self,
        customer: UserId,
        items: &[OrderLine],
        order_ref: Option<OrderId>,
    ) -> Result<Vec<LedgerEntry>> {
        validate_lines(items)?;

        let mut tx = self.pool.begin().await.map_err(store::map_db_err)?;
        let ordered = lock_order(items.iter().map(|line| line.product_id));
        let products = store::products_for_update(&mut tx, &ordered).await?;
        ensure_all_found(&ordered, &products)?;
        check_availability(items, &products)?;

        let mut entries = Vec::with_capacity(items.len());
        for line in items {
            let entry = apply_delta_in(
                &mut tx,
                StockDelta {
                    product_id: line.product_id,
                    delta: -line.quantity,
                    operation: OperationKind::Purchase,
                    performed_by: customer,
                    order_id: order_ref,
                    reference_code: None,
                    notes: None,
                },
            )
            .await?;
            entries.push(entry);
        }
        tx.commit().await.map_err(store::map_db_err)?;

        tracing::info!(
            customer = %customer,
            lines = items.len(),
            "Committed multi-item purchase"
        );
        refresh_caches(&self.cache, OperationKind::Purchase, &entries).await;
        Ok(entries)
    }

    /// Put returned stock back for an existing order.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_delta`]; the order must exist
    /// ([`InventoryError::OrderNotFound`]).
    pub async fn return_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        customer: UserId,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<LedgerEntry> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        self.apply_delta(StockDelta {
            product_id,
            delta: quantity,
            operation: OperationKind::Return,
            performed_by: customer,
            order_id: Some(order_id),
            reference_code: None,
            notes: reason,
        })
        .await
    }

    /// Manually adjust stock by a non-zero signed amount.
    ///
    /// The only operation permitted to move stock in either direction in one
    /// call; a negative adjustment still may not drive stock below zero.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_delta`].
    pub async fn adjust(
        &self,
        product_id: ProductId,
        quantity_change: i64,
        operator: UserId,
        reason: Option<String>,
    ) -> Result<LedgerEntry> {
        if quantity_change == 0 {
            return Err(InventoryError::InvalidQuantity { quantity: 0 });
        }
        self.apply_delta(StockDelta {
            product_id,
            delta: quantity_change,
            operation: OperationKind::Adjustment,
            performed_by: operator,
            order_id: None,
            reference_code: None,
            notes: reason,
        })
        .await
    }

    /// Current stock for one product, cache-first.
    ///
    /// Reads the committed value from the stock cache when present, falling
    /// back to the store and repopulating the cache on a miss.
    ///
    /// # Errors
    ///
    /// [`InventoryError::ProductNotFound`] if the product is missing or
    /// soft-deleted; [`InventoryError::Database`] on store failure.
    pub async fn stock_level(&self, product_id: ProductId) -> Result<i64> {
        let key = cache::stock_key(product_id);
        if let Some(value) = self.cache.get(&key).await {
            if let Ok(stock) = value.parse::<i64>() {
                tracing::debug!(product_id = %product_id, stock, "Stock cache hit");
                return Ok(stock);
            }
        }

        let stock = store::product_stock(&self.pool, product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound { product_id })?;
        self.cache
            .put(&key, &stock.to_string(), CacheNamespace::Stock.ttl())
            .await;
        Ok(stock)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core mutation sequence
// ═══════════════════════════════════════════════════════════════════════

/// The check-then-write sequence, inside the caller's open transaction.
///
/// Shared by [`InventoryService::apply_delta`], multi-item purchases and the
/// order placement orchestrator, so every stock mutation in the system goes
/// through the same lock/validate/mutate/append steps.
pub(crate) async fn apply_delta_in(
    conn: &mut PgConnection,
    req: StockDelta,
) -> Result<LedgerEntry> {
    if req.delta == 0 {
        return Err(InventoryError::InvalidQuantity { quantity: 0 });
    }

    // Lock first; stock_before is only ever read under the row lock.
    let product = store::product_for_update(conn, req.product_id).await?;
    if !store::user_exists(conn, req.performed_by).await? {
        return Err(InventoryError::UserNotFound {
            user_id: req.performed_by,
        });
    }
    if let Some(order_id) = req.order_id {
        if !store::order_exists(conn, order_id).await? {
            return Err(InventoryError::OrderNotFound { order_id });
        }
    }

    let stock_before = product.stock;
    let stock_after = stock_before + req.delta;
    if stock_after < 0 {
        return Err(InventoryError::InsufficientStock {
            product_id: req.product_id,
            requested: -req.delta,
            available: stock_before,
        });
    }

    store::set_stock(conn, req.product_id, stock_after).await?;

    let reference_code = req
        .reference_code
        .unwrap_or_else(|| derived_reference(req.operation, req.order_id));
    let entry = LedgerEntry {
        id: LedgerEntryId::new(),
        product_id: req.product_id,
        quantity_change: req.delta,
        stock_before,
        stock_after,
        operation: req.operation,
        performed_by: Some(req.performed_by),
        order_id: req.order_id,
        reference_code,
        notes: req.notes,
        created_at: Utc::now(),
    };
    store::insert_ledger_entry(conn, &entry).await?;

    tracing::info!(
        product_id = %entry.product_id,
        operation = %entry.operation,
        quantity_change = entry.quantity_change,
        stock_before = entry.stock_before,
        stock_after = entry.stock_after,
        reference = %entry.reference_code,
        "Applied stock delta"
    );
    Ok(entry)
}

/// Post-commit cache coherence for a batch of committed entries.
///
/// Refreshes each product's stock key with the fresh committed value (not a
/// bare evict), drops the product detail keys, then evicts the list
/// namespaces from the declarative table. Best-effort throughout.
pub(crate) async fn refresh_caches<C: CacheStore>(
    cache: &C,
    operation: OperationKind,
    entries: &[LedgerEntry],
) {
    for entry in entries {
        cache
            .put(
                &cache::stock_key(entry.product_id),
                &entry.stock_after.to_string(),
                CacheNamespace::Stock.ttl(),
            )
            .await;
        cache.evict(&cache::product_key(entry.product_id)).await;
    }
    for namespace in full_evictions(operation) {
        cache.evict_namespace(*namespace).await;
    }
}

/// Reject empty batches and non-positive line quantities before any IO.
pub(crate) fn validate_lines(items: &[OrderLine]) -> Result<()> {
    if items.is_empty() {
        return Err(InventoryError::EmptyOrder);
    }
    for line in items {
        if line.quantity < 1 {
            return Err(InventoryError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
    }
    Ok(())
}

/// Whole-batch failure when any requested id is missing or soft-deleted.
pub(crate) fn ensure_all_found(requested: &[ProductId], found: &[Product]) -> Result<()> {
    for &product_id in requested {
        if !found.iter().any(|p| p.id == product_id) {
            return Err(InventoryError::ProductNotFound { product_id });
        }
    }
    Ok(())
}

/// Validate availability for every line before mutating any.
///
/// Repeated products are checked cumulatively, so two lines for the same
/// product cannot jointly oversell it.
pub(crate) fn check_availability(items: &[OrderLine], products: &[Product]) -> Result<()> {
    let mut remaining: HashMap<ProductId, i64> =
        products.iter().map(|p| (p.id, p.stock)).collect();
    for line in items {
        let Some(available) = remaining.get_mut(&line.product_id) else {
            return Err(InventoryError::ProductNotFound {
                product_id: line.product_id,
            });
        };
        if *available < line.quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: line.product_id,
                requested: line.quantity,
                available: *available,
            });
        }
        *available -= line.quantity;
    }
    Ok(())
}

/// Reference code used when the caller supplies none.
fn derived_reference(operation: OperationKind, order_id: Option<OrderId>) -> String {
    let millis = Utc::now().timestamp_millis();
    match (operation, order_id) {
        (OperationKind::Purchase, Some(order)) => format!("ORDER-{order}"),
        (OperationKind::Return, Some(order)) => format!("RETURN-ORDER-{order}"),
        (OperationKind::Purchase, None) => format!("PURCHASE-{millis}"),
        (OperationKind::Return, None) => format!("RETURN-{millis}"),
        (OperationKind::Restock, _) => format!("RESTOCK-{millis}"),
        (OperationKind::Adjustment, _) => format!("ADJUST-{millis}"),
        (OperationKind::Damaged, _) => format!("DAMAGED-{millis}"),
        (OperationKind::Lost, _) => format!("LOST-{millis}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stockpile_core::cache::MemoryCache;

    // Validation failures short-circuit before any IO, so a lazy pool that
    // never connects is enough for these tests.
    fn service() -> InventoryService<MemoryCache> {
        let pool = PgPool::connect_lazy("postgres://localhost:5432/stockpile_test").unwrap();
        InventoryService::new(pool, MemoryCache::new())
    }

    fn product(id: ProductId, stock: i64) -> Product {
        Product {
            id,
            name: "widget".to_string(),
            price: Decimal::new(999, 2),
            stock,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn restock_rejects_non_positive_quantity() {
        let svc = service();
        for quantity in [0, -5] {
            let err = svc
                .restock(ProductId::new(), quantity, UserId::new(), None)
                .await
                .unwrap_err();
            assert_eq!(err, InventoryError::InvalidQuantity { quantity });
        }
    }

    #[tokio::test]
    async fn purchase_rejects_non_positive_quantity() {
        let svc = service();
        let err = svc
            .purchase(ProductId::new(), 0, UserId::new(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: 0 });
    }

    #[tokio::test]
    async fn adjust_rejects_zero_change() {
        let svc = service();
        let err = svc
            .adjust(ProductId::new(), 0, UserId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: 0 });
    }

    #[tokio::test]
    async fn return_rejects_non_positive_quantity() {
        let svc = service();
        let err = svc
            .return_stock(ProductId::new(), -1, UserId::new(), OrderId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: -1 });
    }

    #[tokio::test]
    async fn purchase_many_rejects_empty_and_bad_lines() {
        let svc = service();
        let err = svc
            .purchase_many(UserId::new(), &[], None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::EmptyOrder);

        let lines = [OrderLine {
            product_id: ProductId::new(),
            quantity: 0,
        }];
        let err = svc
            .purchase_many(UserId::new(), &lines, None)
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn availability_is_checked_cumulatively_for_repeated_products() {
        let id = ProductId::new();
        let products = [product(id, 5)];
        let lines = [
            OrderLine {
                product_id: id,
                quantity: 3,
            },
            OrderLine {
                product_id: id,
                quantity: 3,
            },
        ];
        let err = check_availability(&lines, &products).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: id,
                requested: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn availability_reports_the_failing_product() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let products = [product(p1, 10), product(p2, 5)];
        let lines = [
            OrderLine {
                product_id: p1,
                quantity: 2,
            },
            OrderLine {
                product_id: p2,
                quantity: 100,
            },
        ];
        let err = check_availability(&lines, &products).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: p2,
                requested: 100,
                available: 5,
            }
        );
    }

    #[test]
    fn missing_products_fail_the_whole_batch() {
        let present = ProductId::new();
        let absent = ProductId::new();
        let requested = lock_order([present, absent]);
        let found = [product(present, 1)];
        let err = ensure_all_found(&requested, &found).unwrap_err();
        // The error must name the requested id that is absent, never some
        // other id.
        assert_eq!(
            err,
            InventoryError::ProductNotFound {
                product_id: absent
            }
        );

        let complete = [product(present, 1), product(absent, 1)];
        assert!(ensure_all_found(&requested, &complete).is_ok());
    }

    #[test]
    fn derived_references_follow_operation_kind() {
        let order = OrderId::new();
        assert_eq!(
            derived_reference(OperationKind::Purchase, Some(order)),
            format!("ORDER-{order}")
        );
        assert_eq!(
            derived_reference(OperationKind::Return, Some(order)),
            format!("RETURN-ORDER-{order}")
        );
        assert!(derived_reference(OperationKind::Restock, None).starts_with("RESTOCK-"));
        assert!(derived_reference(OperationKind::Adjustment, None).starts_with("ADJUST-"));
    }
}
