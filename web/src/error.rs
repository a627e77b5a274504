//! Error types for web handlers.
//!
//! Bridges the domain error taxonomy to HTTP responses via Axum's
//! `IntoResponse`. Every domain error has a fixed status mapping, so clients
//! can branch on status and `code` without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use stockpile_core::InventoryError;

/// Application error type for web handlers.
///
/// Wraps domain errors with an HTTP status, a stable machine-readable code
/// and an optional structured detail payload (used for insufficient-stock
/// responses so clients can render what was available).
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Structured detail payload, exposed to the client.
    detail: Option<serde_json::Value>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            detail: None,
            source: None,
        }
    }

    /// Attach a structured detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "CONFLICT".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InvalidQuantity { .. } | InventoryError::EmptyOrder => {
                Self::bad_request(err.to_string())
            }
            InventoryError::ProductNotFound { product_id } => {
                Self::not_found("Product", product_id)
            }
            InventoryError::UserNotFound { user_id } => Self::not_found("User", user_id),
            InventoryError::OrderNotFound { order_id } => Self::not_found("Order", order_id),
            InventoryError::Forbidden => Self::forbidden("Order belongs to another user"),
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::new(
                StatusCode::CONFLICT,
                err.to_string(),
                "INSUFFICIENT_STOCK".to_string(),
            )
            .with_detail(serde_json::json!({
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
            InventoryError::ConcurrencyConflict => {
                Self::unavailable("Operation conflicted with a concurrent update, retry")
            }
            InventoryError::Database(_)
            | InventoryError::Serialization(_)
            | InventoryError::Cache(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::anyhow!(err))
            }
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
    /// Structured detail payload, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            detail: self.detail,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use stockpile_core::{OrderId, ProductId, UserId};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let err = AppError::from(InventoryError::InvalidQuantity { quantity: 0 });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = AppError::from(InventoryError::EmptyOrder);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_references_map_to_404() {
        for err in [
            InventoryError::ProductNotFound {
                product_id: ProductId::new(),
            },
            InventoryError::UserNotFound {
                user_id: UserId::new(),
            },
            InventoryError::OrderNotFound {
                order_id: OrderId::new(),
            },
        ] {
            assert_eq!(AppError::from(err).status, StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_insufficient_stock_maps_to_409_with_detail() {
        let product_id = ProductId::new();
        let err = AppError::from(InventoryError::InsufficientStock {
            product_id,
            requested: 8,
            available: 5,
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "INSUFFICIENT_STOCK");
        let detail = err.detail.expect("detail payload");
        assert_eq!(detail["requested"], 8);
        assert_eq!(detail["available"], 5);
    }

    #[test]
    fn test_concurrency_conflict_maps_to_503() {
        let err = AppError::from(InventoryError::ConcurrencyConflict);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_errors_hide_their_message() {
        let err = AppError::from(InventoryError::Database("connection reset".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("connection reset"));
    }
}
