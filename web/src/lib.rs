//! # Stockpile Web
//!
//! HTTP API over the stock ledger engine. Thin handlers: parse the request,
//! call one domain service, serialize the result. All invariants live in
//! `stockpile-postgres`; this crate only maps the error taxonomy to HTTP
//! statuses.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
