//! HTTP request handlers.

pub mod health;
pub mod inventory;
pub mod ledger;
pub mod orders;
