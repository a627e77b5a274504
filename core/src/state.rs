//! Domain state types.
//!
//! The stock counter lives on [`Product`] and is mutated only by the stock
//! mutation core under a row-level lock. [`LedgerEntry`] is the immutable
//! audit record of one such mutation; it holds non-owning references to the
//! product, the acting user and (optionally) an order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a product (and its stock record).
    ProductId
);
id_type!(
    /// Unique identifier for a user.
    UserId
);
id_type!(
    /// Unique identifier for an order.
    OrderId
);
id_type!(
    /// Unique identifier for a ledger entry.
    LedgerEntryId
);

// ═══════════════════════════════════════════════════════════════════════
// Operation Kinds
// ═══════════════════════════════════════════════════════════════════════

/// Classification of why a stock change occurred.
///
/// Wire form is the upper-case name: `RESTOCK`, `PURCHASE`, `RETURN`,
/// `ADJUSTMENT`, `DAMAGED`, `LOST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Stock added by a restock delivery.
    Restock,
    /// Stock removed by a purchase or order deduction.
    Purchase,
    /// Stock returned by a customer.
    Return,
    /// Manual correction; the only kind permitted to move stock in either
    /// direction in one call.
    Adjustment,
    /// Stock written off as damaged.
    Damaged,
    /// Stock written off as lost.
    Lost,
}

impl OperationKind {
    /// Wire representation, as persisted in the ledger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restock => "RESTOCK",
            Self::Purchase => "PURCHASE",
            Self::Return => "RETURN",
            Self::Adjustment => "ADJUSTMENT",
            Self::Damaged => "DAMAGED",
            Self::Lost => "LOST",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RESTOCK" => Some(Self::Restock),
            "PURCHASE" => Some(Self::Purchase),
            "RETURN" => Some(Self::Return),
            "ADJUSTMENT" => Some(Self::Adjustment),
            "DAMAGED" => Some(Self::Damaged),
            "LOST" => Some(Self::Lost),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Products & Stock
// ═══════════════════════════════════════════════════════════════════════

/// A catalog product together with its authoritative stock counter.
///
/// `stock >= 0` at all times; decrements are validated under the row lock
/// before commit. Products are never deleted, only soft-marked via
/// `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product id.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price. Order items snapshot this at purchase time.
    pub price: Decimal,
    /// Quantity on hand, available for sale.
    pub stock: i64,
    /// Soft-delete marker; a deleted product is invisible to all operations.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A single stock mutation request, handled by the stock mutation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDelta {
    /// Target product.
    pub product_id: ProductId,
    /// Signed, non-zero quantity change.
    pub delta: i64,
    /// Why the stock is changing.
    pub operation: OperationKind,
    /// Acting user; must reference an existing user.
    pub performed_by: UserId,
    /// Related order, when the change was caused by one.
    pub order_id: Option<OrderId>,
    /// Caller-supplied reference code; derived from the operation kind when
    /// absent (e.g. `RESTOCK-{timestamp}`, `ORDER-{order_id}`).
    pub reference_code: Option<String>,
    /// Free-form note recorded on the ledger entry.
    pub notes: Option<String>,
}

/// One requested line of a purchase or order: a product and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product to deduct from.
    pub product_id: ProductId,
    /// Requested quantity, must be `>= 1`.
    pub quantity: i64,
}

// ═══════════════════════════════════════════════════════════════════════
// Ledger
// ═══════════════════════════════════════════════════════════════════════

/// Immutable audit record of one stock change.
///
/// Created synchronously in the same transaction as the stock mutation it
/// documents; never updated or deleted afterwards. Holds the invariant
/// `stock_after == stock_before + quantity_change`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry id.
    pub id: LedgerEntryId,
    /// Product whose stock changed.
    pub product_id: ProductId,
    /// Signed quantity change applied.
    pub quantity_change: i64,
    /// Stock level read under the row lock, before the change.
    pub stock_before: i64,
    /// Stock level after the change.
    pub stock_after: i64,
    /// Why the stock changed.
    pub operation: OperationKind,
    /// Acting user, when known.
    pub performed_by: Option<UserId>,
    /// Order that caused the change, when any.
    pub order_id: Option<OrderId>,
    /// Human-readable reference, e.g. `ORDER-{id}` or `RESTOCK-{timestamp}`.
    pub reference_code: String,
    /// Free-form note.
    pub notes: Option<String>,
    /// Creation timestamp; immutable.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether the entry's arithmetic is internally consistent.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.stock_after == self.stock_before + self.quantity_change
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Orders
// ═══════════════════════════════════════════════════════════════════════

/// Order lifecycle status. Transition logic is outside the ledger scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Newly placed.
    Pending,
    /// Handed to the carrier.
    Shipped,
    /// Delivered to the customer.
    Delivered,
    /// Cancelled before shipment.
    Cancelled,
    /// Refunded after delivery.
    Refunded,
}

impl OrderStatus {
    /// Wire representation, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SHIPPED" => Some(Self::Shipped),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// One order line: quantity of a product at a price snapshot.
///
/// Items are immutable after creation; the snapshot must not drift with later
/// product price changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item id.
    pub id: uuid::Uuid,
    /// Purchased product.
    pub product_id: ProductId,
    /// Quantity purchased, always `>= 1`.
    pub quantity: i64,
    /// Unit price at purchase time.
    pub unit_price: Decimal,
}

impl OrderItem {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A customer's purchase transaction.
///
/// Created atomically with its items, the stock decrements they cause and the
/// ledger entries documenting those decrements. Holds the invariant
/// `total_price == Σ item.subtotal()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: OrderId,
    /// Purchasing user.
    pub user_id: UserId,
    /// Sum of item subtotals, non-negative.
    pub total_price: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Free-form note.
    pub notes: Option<String>,
    /// Order lines.
    pub items: Vec<OrderItem>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of the item subtotals.
    #[must_use]
    pub fn computed_total(&self) -> Decimal {
        self.items.iter().map(OrderItem::subtotal).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_kind_wire_round_trip() {
        for kind in [
            OperationKind::Restock,
            OperationKind::Purchase,
            OperationKind::Return,
            OperationKind::Adjustment,
            OperationKind::Damaged,
            OperationKind::Lost,
        ] {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::parse("REFUND"), None);
    }

    #[test]
    fn operation_kind_serde_uses_wire_form() {
        #[allow(clippy::unwrap_used)]
        let json = serde_json::to_string(&OperationKind::Restock).unwrap();
        assert_eq!(json, "\"RESTOCK\"");
    }

    #[test]
    fn ledger_entry_balance() {
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            product_id: ProductId::new(),
            quantity_change: -3,
            stock_before: 10,
            stock_after: 7,
            operation: OperationKind::Purchase,
            performed_by: Some(UserId::new()),
            order_id: None,
            reference_code: "ORDER-test".to_string(),
            notes: None,
            created_at: Utc::now(),
        };
        assert!(entry.is_balanced());

        let skewed = LedgerEntry {
            stock_after: 8,
            ..entry
        };
        assert!(!skewed.is_balanced());
    }

    #[test]
    fn order_item_subtotal() {
        let item = OrderItem {
            id: uuid::Uuid::new_v4(),
            product_id: ProductId::new(),
            quantity: 3,
            unit_price: Decimal::new(1250, 2), // 12.50
        };
        assert_eq!(item.subtotal(), Decimal::new(3750, 2)); // 37.50
    }

    #[test]
    fn order_total_matches_items() {
        let items = vec![
            OrderItem {
                id: uuid::Uuid::new_v4(),
                product_id: ProductId::new(),
                quantity: 2,
                unit_price: Decimal::new(500, 2),
            },
            OrderItem {
                id: uuid::Uuid::new_v4(),
                product_id: ProductId::new(),
                quantity: 1,
                unit_price: Decimal::new(199, 2),
            },
        ];
        let order = Order {
            id: OrderId::new(),
            user_id: UserId::new(),
            total_price: Decimal::new(1199, 2),
            status: OrderStatus::Pending,
            notes: None,
            items,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(order.computed_total(), order.total_price);
    }
}
