//! Row-level store operations.
//!
//! Thin SQL layer shared by the mutation core, the order orchestrator and the
//! ledger query service. Locking functions must run inside an open
//! transaction; the lock is held until that transaction commits or rolls
//! back. Queries are runtime-checked so the workspace builds without a live
//! `DATABASE_URL`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use stockpile_core::{
    InventoryError, LedgerEntry, LedgerEntryId, LedgerFilter, Order, OrderId, OrderItem,
    OrderStatus, Page, PageRequest, Product, ProductId, Result, UserId,
};
use uuid::Uuid;

/// Map a sqlx error into the domain taxonomy.
///
/// Deadlocks and lock timeouts surface as the retryable
/// [`InventoryError::ConcurrencyConflict`]; SQLSTATE 40001
/// (serialization_failure), 40P01 (deadlock_detected) and 55P03
/// (lock_not_available) all qualify.
pub(crate) fn map_db_err(err: sqlx::Error) -> InventoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if matches!(code.as_ref(), "40001" | "40P01" | "55P03") {
                return InventoryError::ConcurrencyConflict;
            }
        }
    }
    InventoryError::Database(err.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Row types
// ═══════════════════════════════════════════════════════════════════════

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    stock: i64,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId(row.id),
            name: row.name,
            price: row.price,
            stock: row.stock,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    product_id: Uuid,
    quantity_change: i64,
    stock_before: i64,
    stock_after: i64,
    operation: String,
    performed_by: Option<Uuid>,
    order_id: Option<Uuid>,
    reference_code: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = InventoryError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        let operation = stockpile_core::OperationKind::parse(&row.operation).ok_or_else(|| {
            InventoryError::Serialization(format!(
                "unknown operation kind in ledger: {}",
                row.operation
            ))
        })?;
        Ok(Self {
            id: LedgerEntryId(row.id),
            product_id: ProductId(row.product_id),
            quantity_change: row.quantity_change,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            operation,
            performed_by: row.performed_by.map(UserId),
            order_id: row.order_id.map(OrderId),
            reference_code: row.reference_code,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_price: Decimal,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = InventoryError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            InventoryError::Serialization(format!("unknown order status: {}", row.status))
        })?;
        Ok(Self {
            id: OrderId(row.id),
            user_id: UserId(row.user_id),
            total_price: row.total_price,
            status,
            notes: row.notes,
            items: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
}

// ═══════════════════════════════════════════════════════════════════════
// Products & stock
// ═══════════════════════════════════════════════════════════════════════

/// Acquire the row-level write lock on one product and return it.
///
/// Must run inside an open transaction. Soft-deleted products are invisible.
pub(crate) async fn product_for_update(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<Product> {
    let row = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, price, stock, deleted_at
        FROM products
        WHERE id = $1 AND deleted_at IS NULL
        FOR UPDATE
        ",
    )
    .bind(product_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_err)?
    .ok_or(InventoryError::ProductNotFound { product_id })?;

    Ok(row.into())
}

/// Acquire row-level write locks on a set of products, in the caller's
/// (already canonical) order.
///
/// Must run inside an open transaction. Returns the found rows; the caller
/// is responsible for detecting missing ids.
pub(crate) async fn products_for_update(
    conn: &mut PgConnection,
    product_ids: &[ProductId],
) -> Result<Vec<Product>> {
    let ids: Vec<Uuid> = product_ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, price, stock, deleted_at
        FROM products
        WHERE id = ANY($1) AND deleted_at IS NULL
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_err)?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Persist a new stock value for a locked product row.
pub(crate) async fn set_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    stock: i64,
) -> Result<()> {
    let result = sqlx::query(
        r"
        UPDATE products
        SET stock = $2, updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(product_id.0)
    .bind(stock)
    .execute(&mut *conn)
    .await
    .map_err(map_db_err)?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::ProductNotFound { product_id });
    }
    Ok(())
}

/// Read one product's current committed stock, outside any lock.
pub(crate) async fn product_stock(pool: &PgPool, product_id: ProductId) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        r"
        SELECT stock FROM products
        WHERE id = $1 AND deleted_at IS NULL
        ",
    )
    .bind(product_id.0)
    .fetch_optional(pool)
    .await
    .map_err(map_db_err)
}

// ═══════════════════════════════════════════════════════════════════════
// Users & orders (existence)
// ═══════════════════════════════════════════════════════════════════════

/// Whether a (non-deleted) user exists.
pub(crate) async fn user_exists(conn: &mut PgConnection, user_id: UserId) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND deleted_at IS NULL)
        ",
    )
    .bind(user_id.0)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_err)
}

/// Whether a (non-deleted) order exists.
pub(crate) async fn order_exists(conn: &mut PgConnection, order_id: OrderId) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r"
        SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1 AND deleted_at IS NULL)
        ",
    )
    .bind(order_id.0)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_err)
}

// ═══════════════════════════════════════════════════════════════════════
// Ledger writes
// ═══════════════════════════════════════════════════════════════════════

/// Append one ledger entry. The table is append-only; there is no
/// corresponding update or delete anywhere in this crate.
pub(crate) async fn insert_ledger_entry(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO ledger_entries
            (id, product_id, quantity_change, stock_before, stock_after,
             operation, performed_by, order_id, reference_code, notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(entry.id.0)
    .bind(entry.product_id.0)
    .bind(entry.quantity_change)
    .bind(entry.stock_before)
    .bind(entry.stock_after)
    .bind(entry.operation.as_str())
    .bind(entry.performed_by.map(|u| u.0))
    .bind(entry.order_id.map(|o| o.0))
    .bind(&entry.reference_code)
    .bind(&entry.notes)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_db_err)?;

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Order writes & reads
// ═══════════════════════════════════════════════════════════════════════

/// Insert the order header. Items are inserted separately.
pub(crate) async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO orders (id, user_id, total_price, status, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(order.id.0)
    .bind(order.user_id.0)
    .bind(order.total_price)
    .bind(order.status.as_str())
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_db_err)?;

    Ok(())
}

/// Insert one order line.
pub(crate) async fn insert_order_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &OrderItem,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(item.id)
    .bind(order_id.0)
    .bind(item.product_id.0)
    .bind(item.quantity)
    .bind(item.unit_price)
    .execute(&mut *conn)
    .await
    .map_err(map_db_err)?;

    Ok(())
}

/// Fetch one order with its items materialized.
pub(crate) async fn fetch_order(pool: &PgPool, order_id: OrderId) -> Result<Option<Order>> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, user_id, total_price, status, notes, created_at, updated_at
        FROM orders
        WHERE id = $1 AND deleted_at IS NULL
        ",
    )
    .bind(order_id.0)
    .fetch_optional(pool)
    .await
    .map_err(map_db_err)?
    else {
        return Ok(None);
    };

    let mut order = Order::try_from(row)?;
    order.items = order_items_for(pool, &[order_id]).await?.remove(0).1;
    Ok(Some(order))
}

/// Fetch the items for a set of orders, grouped per order in input order.
async fn order_items_for(
    pool: &PgPool,
    order_ids: &[OrderId],
) -> Result<Vec<(OrderId, Vec<OrderItem>)>> {
    let ids: Vec<Uuid> = order_ids.iter().map(|id| id.0).collect();
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, quantity, unit_price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(map_db_err)?;

    let mut grouped: Vec<(OrderId, Vec<OrderItem>)> =
        order_ids.iter().map(|&id| (id, Vec::new())).collect();
    for row in rows {
        let item = OrderItem {
            id: row.id,
            product_id: ProductId(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
        };
        if let Some((_, items)) = grouped.iter_mut().find(|(id, _)| id.0 == row.order_id) {
            items.push(item);
        }
    }
    Ok(grouped)
}

/// One page of a user's orders, newest first, items materialized.
pub(crate) async fn orders_by_user(
    pool: &PgPool,
    user_id: UserId,
    page: PageRequest,
) -> Result<Page<Order>> {
    let total = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COUNT(*) FROM orders
        WHERE user_id = $1 AND deleted_at IS NULL
        ",
    )
    .bind(user_id.0)
    .fetch_one(pool)
    .await
    .map_err(map_db_err)?;

    let rows = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, user_id, total_price, status, notes, created_at, updated_at
        FROM orders
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(user_id.0)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(map_db_err)?;

    let mut orders: Vec<Order> = rows
        .into_iter()
        .map(Order::try_from)
        .collect::<Result<_>>()?;

    let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
    if !ids.is_empty() {
        for (order_id, items) in order_items_for(pool, &ids).await? {
            if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
                order.items = items;
            }
        }
    }

    Ok(Page {
        items: orders,
        page: page.page,
        size: page.size,
        total: total.unsigned_abs(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Ledger reads
// ═══════════════════════════════════════════════════════════════════════

const LEDGER_SELECT: &str = r"
    SELECT id, product_id, quantity_change, stock_before, stock_after,
           operation, performed_by, order_id, reference_code, notes, created_at
    FROM ledger_entries
";

/// One page of ledger history for a filter, newest first.
pub(crate) async fn ledger_page(
    pool: &PgPool,
    filter: &LedgerFilter,
    page: PageRequest,
) -> Result<Page<LedgerEntry>> {
    let tail = " ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3";
    let (rows, total) = match filter {
        LedgerFilter::All => {
            let sql = format!(
                "{LEDGER_SELECT} ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
            );
            let rows = sqlx::query_as::<_, LedgerRow>(&sql)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(pool)
                .await
                .map_err(map_db_err)?;
            let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ledger_entries")
                .fetch_one(pool)
                .await
                .map_err(map_db_err)?;
            (rows, total)
        }
        LedgerFilter::Product(product_id) => {
            let sql = format!("{LEDGER_SELECT} WHERE product_id = $1 {tail}");
            let rows = sqlx::query_as::<_, LedgerRow>(&sql)
                .bind(product_id.0)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(pool)
                .await
                .map_err(map_db_err)?;
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ledger_entries WHERE product_id = $1",
            )
            .bind(product_id.0)
            .fetch_one(pool)
            .await
            .map_err(map_db_err)?;
            (rows, total)
        }
        LedgerFilter::User(user_id) => {
            let sql = format!("{LEDGER_SELECT} WHERE performed_by = $1 {tail}");
            let rows = sqlx::query_as::<_, LedgerRow>(&sql)
                .bind(user_id.0)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(pool)
                .await
                .map_err(map_db_err)?;
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ledger_entries WHERE performed_by = $1",
            )
            .bind(user_id.0)
            .fetch_one(pool)
            .await
            .map_err(map_db_err)?;
            (rows, total)
        }
        LedgerFilter::Order(order_id) => {
            let sql = format!("{LEDGER_SELECT} WHERE order_id = $1 {tail}");
            let rows = sqlx::query_as::<_, LedgerRow>(&sql)
                .bind(order_id.0)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(pool)
                .await
                .map_err(map_db_err)?;
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ledger_entries WHERE order_id = $1",
            )
            .bind(order_id.0)
            .fetch_one(pool)
            .await
            .map_err(map_db_err)?;
            (rows, total)
        }
        LedgerFilter::DateRange { from, to } => {
            let sql = format!(
                "{LEDGER_SELECT} WHERE created_at >= $1 AND created_at <= $2 \
                 ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
            );
            let rows = sqlx::query_as::<_, LedgerRow>(&sql)
                .bind(from)
                .bind(to)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(pool)
                .await
                .map_err(map_db_err)?;
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM ledger_entries WHERE created_at >= $1 AND created_at <= $2",
            )
            .bind(from)
            .bind(to)
            .fetch_one(pool)
            .await
            .map_err(map_db_err)?;
            (rows, total)
        }
    };

    let items: Vec<LedgerEntry> = rows
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect::<Result<_>>()?;

    Ok(Page {
        items,
        page: page.page,
        size: page.size,
        total: total.unsigned_abs(),
    })
}
