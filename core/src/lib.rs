//! # Stockpile Core
//!
//! Domain model and policy for the stock ledger engine: authoritative stock
//! counters, an append-only audit ledger of every stock change, and the cache
//! coherence rules that keep a secondary cache consistent with mutations.
//!
//! This crate is pure: no database client, no cache client. The transactional
//! engine lives in `stockpile-postgres`, the fail-open cache backend in
//! `stockpile-redis`.
//!
//! ## Invariants
//!
//! - Stock never goes negative; every decrement is checked under a row lock.
//! - Every committed stock mutation produces exactly one [`LedgerEntry`] with
//!   `stock_after == stock_before + quantity_change`.
//! - The cache is a read accelerator, never the source of truth; any cache
//!   failure is treated as a miss.

// Public modules
pub mod cache;
pub mod error;
pub mod lock;
pub mod query;
pub mod state;

// Re-export main types for convenience
pub use cache::{CacheNamespace, CacheStore};
pub use error::{InventoryError, Result};
pub use lock::lock_order;
pub use query::{LedgerFilter, Page, PageRequest};
pub use state::{
    LedgerEntry, LedgerEntryId, OperationKind, Order, OrderId, OrderItem, OrderLine, OrderStatus,
    Product, ProductId, StockDelta, UserId,
};
