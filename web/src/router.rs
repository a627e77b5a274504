//! Route table.

use crate::handlers::{health, inventory, ledger, orders};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/inventory/restock", post(inventory::restock))
        .route("/api/v1/inventory/purchase", post(inventory::purchase))
        .route(
            "/api/v1/inventory/purchase-batch",
            post(inventory::purchase_batch),
        )
        .route("/api/v1/inventory/return", post(inventory::return_stock))
        .route("/api/v1/inventory/adjust", post(inventory::adjust))
        .route(
            "/api/v1/inventory/:product_id/stock",
            get(inventory::stock_level),
        )
        .route("/api/v1/orders", post(orders::place_order).get(orders::list_orders))
        .route("/api/v1/orders/:order_id", get(orders::get_order))
        .route("/api/v1/ledger", get(ledger::query_ledger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
