//! Error types for stock ledger and order operations.

use crate::state::{OrderId, ProductId, UserId};
use thiserror::Error;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Error taxonomy for the stock ledger and order engine.
///
/// Validation errors are detected before any mutation and short-circuit the
/// transaction; once the commit phase begins, failure rolls back the stock
/// write and the ledger write together. Cache errors never appear here: the
/// cache layer fails open and recovers locally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InventoryError {
    // ═══════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════
    /// Non-positive quantity supplied where a positive quantity is required,
    /// or a zero adjustment.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: i64,
    },

    /// An order or multi-purchase was submitted with no items.
    #[error("Item list is empty")]
    EmptyOrder,

    // ═══════════════════════════════════════════════════════════
    // Missing References
    // ═══════════════════════════════════════════════════════════
    /// Referenced product missing or soft-deleted. Aborts the whole batch.
    #[error("Product {product_id} not found")]
    ProductNotFound {
        /// The missing product.
        product_id: ProductId,
    },

    /// Acting user does not exist.
    #[error("User {user_id} not found")]
    UserNotFound {
        /// The missing user.
        user_id: UserId,
    },

    /// Referenced order does not exist.
    #[error("Order {order_id} not found")]
    OrderNotFound {
        /// The missing order.
        order_id: OrderId,
    },

    /// The requesting user does not own the order.
    #[error("Not permitted to access this order")]
    Forbidden,

    // ═══════════════════════════════════════════════════════════
    // Stock Errors
    // ═══════════════════════════════════════════════════════════
    /// A decrement would drive stock negative. Never partially applied.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// Product whose stock check failed.
        product_id: ProductId,
        /// Quantity the caller asked to remove.
        requested: i64,
        /// Stock on hand at the time of the check.
        available: i64,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════
    /// Lock acquisition timed out or a deadlock was detected. Transient;
    /// the caller may retry.
    #[error("Concurrent update conflict, retry the operation")]
    ConcurrencyConflict,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Cached or persisted value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cache backend could not be reached during setup.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl InventoryError {
    /// Returns `true` if this error is due to invalid caller input or a
    /// missing reference, i.e. it should surface as a client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity { .. }
                | Self::EmptyOrder
                | Self::ProductNotFound { .. }
                | Self::UserNotFound { .. }
                | Self::OrderNotFound { .. }
                | Self::Forbidden
                | Self::InsufficientStock { .. }
        )
    }

    /// Returns `true` if the operation may succeed when retried.
    ///
    /// Only lock/deadlock timeouts are retryable; the engine itself never
    /// retries, that policy belongs to the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_classified() {
        assert!(
            InventoryError::InvalidQuantity { quantity: 0 }.is_client_error()
        );
        assert!(
            InventoryError::InsufficientStock {
                product_id: ProductId::new(),
                requested: 8,
                available: 5,
            }
            .is_client_error()
        );
        assert!(!InventoryError::ConcurrencyConflict.is_client_error());
        assert!(!InventoryError::Database("boom".to_string()).is_client_error());
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(InventoryError::ConcurrencyConflict.is_retryable());
        assert!(!InventoryError::EmptyOrder.is_retryable());
        assert!(!InventoryError::Database("down".to_string()).is_retryable());
    }

    #[test]
    fn insufficient_stock_message_carries_detail() {
        let product_id = ProductId::new();
        let err = InventoryError::InsufficientStock {
            product_id,
            requested: 8,
            available: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 8"));
        assert!(msg.contains("available 5"));
        assert!(msg.contains(&product_id.to_string()));
    }
}
