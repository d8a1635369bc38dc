//! Wallet ledger: atomic, concurrency-safe transfers between wallets.
//!
//! - [`domain`]: wallet and transaction types, the error taxonomy, and the
//!   persistence contracts (`DatabaseClient`, `AtomicScope`)
//! - [`app`]: the transfer engine and query service
//! - [`infra`]: the PostgreSQL store
//! - [`api`]: the axum HTTP adapter

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
