//! Stock mutation and stock read endpoints.
//!
//! Every mutation returns the ledger entry it produced, so clients see the
//! committed before/after pair without a second round trip.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use stockpile_core::{LedgerEntry, OrderId, OrderLine, ProductId, UserId};

/// Request body for a restock.
#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    /// Product to restock.
    pub product_id: ProductId,
    /// Units delivered, must be positive.
    pub quantity: i64,
    /// Operator recording the delivery.
    pub performed_by: UserId,
    /// Optional free-form note.
    pub notes: Option<String>,
}

/// Request body for a single-product purchase.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Product to purchase.
    pub product_id: ProductId,
    /// Units requested, must be `>= 1`.
    pub quantity: i64,
    /// Purchasing user.
    pub performed_by: UserId,
    /// Existing order to attribute the deduction to; the ledger entry then
    /// carries an `ORDER-{id}` reference instead of a timestamped one.
    pub order_id: Option<OrderId>,
    /// Optional free-form note.
    pub notes: Option<String>,
}

/// Request body for a multi-product purchase.
#[derive(Debug, Deserialize)]
pub struct PurchaseBatchRequest {
    /// Requested lines; repeated products are validated cumulatively.
    pub items: Vec<OrderLine>,
    /// Purchasing user.
    pub performed_by: UserId,
}

/// Request body for a stock return.
#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    /// Product being returned.
    pub product_id: ProductId,
    /// Units returned, must be positive.
    pub quantity: i64,
    /// Returning customer.
    pub performed_by: UserId,
    /// Order the units were originally purchased under.
    pub order_id: OrderId,
    /// Optional return reason.
    pub reason: Option<String>,
}

/// Request body for a manual adjustment.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Product to adjust.
    pub product_id: ProductId,
    /// Signed, non-zero change.
    pub quantity_change: i64,
    /// Operator performing the correction.
    pub performed_by: UserId,
    /// Optional audit reason.
    pub reason: Option<String>,
}

/// Response body for a stock read.
#[derive(Debug, serde::Serialize)]
pub struct StockResponse {
    /// Product queried.
    pub product_id: ProductId,
    /// Current committed stock level.
    pub stock: i64,
}

/// `POST /api/v1/inventory/restock`
pub async fn restock(
    State(state): State<AppState>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let entry = state
        .inventory
        .restock(req.product_id, req.quantity, req.performed_by, req.notes)
        .await?;
    Ok(Json(entry))
}

/// `POST /api/v1/inventory/purchase`
pub async fn purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let entry = state
        .inventory
        .purchase(
            req.product_id,
            req.quantity,
            req.performed_by,
            req.order_id,
            req.notes,
        )
        .await?;
    Ok(Json(entry))
}

/// `POST /api/v1/inventory/purchase-batch`
///
/// All lines succeed or none do.
pub async fn purchase_batch(
    State(state): State<AppState>,
    Json(req): Json<PurchaseBatchRequest>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let entries = state
        .inventory
        .purchase_many(req.performed_by, &req.items, None)
        .await?;
    Ok(Json(entries))
}

/// `POST /api/v1/inventory/return`
pub async fn return_stock(
    State(state): State<AppState>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let entry = state
        .inventory
        .return_stock(
            req.product_id,
            req.quantity,
            req.performed_by,
            req.order_id,
            req.reason,
        )
        .await?;
    Ok(Json(entry))
}

/// `POST /api/v1/inventory/adjust`
pub async fn adjust(
    State(state): State<AppState>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let entry = state
        .inventory
        .adjust(
            req.product_id,
            req.quantity_change,
            req.performed_by,
            req.reason,
        )
        .await?;
    Ok(Json(entry))
}

/// `GET /api/v1/inventory/{product_id}/stock`
pub async fn stock_level(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<StockResponse>, AppError> {
    let stock = state.inventory.stock_level(product_id).await?;
    Ok(Json(StockResponse { product_id, stock }))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn purchase_request_accepts_an_order_attribution() {
        let order_id = OrderId::new();
        let body = serde_json::json!({
            "product_id": ProductId::new(),
            "quantity": 2,
            "performed_by": UserId::new(),
            "order_id": order_id,
        });
        let req: PurchaseRequest =
            serde_json::from_value(body).expect("body should deserialize");
        assert_eq!(req.order_id, Some(order_id));
    }

    #[test]
    fn purchase_request_order_attribution_is_optional() {
        let body = serde_json::json!({
            "product_id": ProductId::new(),
            "quantity": 2,
            "performed_by": UserId::new(),
        });
        let req: PurchaseRequest =
            serde_json::from_value(body).expect("body should deserialize");
        assert_eq!(req.order_id, None);
    }
}
