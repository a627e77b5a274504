//! # Stockpile Postgres
//!
//! Transactional engine for the stock ledger: row-locked stock mutations, the
//! append-only audit ledger, atomic multi-item order placement and paginated
//! ledger queries, all backed by `PostgreSQL` via sqlx.
//!
//! ## Concurrency model
//!
//! Every stock mutation runs inside a transaction that acquires the product
//! row's write lock (`SELECT ... FOR UPDATE`) before reading the counter, so
//! concurrent writers to the same product serialize and each ledger entry
//! records a consistent before/after pair. Multi-row operations lock rows in
//! canonical id order to rule out lock-order deadlocks between themselves.
//!
//! ## Services
//!
//! - [`InventoryService`]: restock, purchase, multi-purchase, return,
//!   adjustment, cached stock reads.
//! - [`OrderService`]: atomic order placement, cached order reads.
//! - [`LedgerQueryService`]: filtered, paginated ledger history.
//!
//! All three are generic over a [`stockpile_core::CacheStore`] and treat the
//! cache as fail-open.

pub mod inventory;
pub mod ledger;
pub mod orders;
mod store;

pub use inventory::InventoryService;
pub use ledger::LedgerQueryService;
pub use orders::OrderService;

use sqlx::PgPool;
use stockpile_core::{InventoryError, Result};

/// Run the embedded schema migrations.
///
/// Idempotent; safe to call on every startup.
///
/// # Errors
///
/// [`InventoryError::Database`] when a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|err| InventoryError::Database(err.to_string()))?;
    tracing::info!("Schema migrations applied");
    Ok(())
}
