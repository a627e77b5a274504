//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the service is
//! running. Does not check dependencies; a Redis outage in particular must
//! not fail the health check, the service degrades but keeps serving.

use axum::http::StatusCode;

/// Simple liveness check.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
