//! Order placement and retrieval endpoints.
//!
//! There is no session layer here; the acting user is carried explicitly in
//! the request. Ownership of an order is still enforced on every read.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use stockpile_core::{Order, OrderId, OrderLine, Page, PageRequest, UserId};

/// Request body for order placement.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Purchasing user.
    pub user_id: UserId,
    /// Requested lines; repeated products are validated cumulatively.
    pub items: Vec<OrderLine>,
    /// Optional free-form note.
    pub notes: Option<String>,
}

/// Query parameters identifying the requesting user.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Requesting user.
    pub user_id: UserId,
}

/// Query parameters for the order listing.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// User whose orders to list.
    pub user_id: UserId,
    /// Zero-based page number.
    #[serde(default)]
    pub page: u32,
    /// Page size; clamped server-side.
    #[serde(default)]
    pub size: u32,
}

/// `POST /api/v1/orders`
///
/// Places the order atomically: header, items, stock deductions and ledger
/// entries commit together or not at all.
pub async fn place_order(
    State(state): State<AppState>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .place_order(req.user_id, req.items, req.notes)
        .await?;
    Ok(Json(order))
}

/// `GET /api/v1/orders/{order_id}?user_id=...`
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.get_order(order_id, query.user_id).await?;
    Ok(Json(order))
}

/// `GET /api/v1/orders?user_id=...&page=0&size=20`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Page<Order>>, AppError> {
    let page = PageRequest::new(query.page, query.size);
    let orders = state.orders.orders_by_user(query.user_id, page).await?;
    Ok(Json(orders))
}
