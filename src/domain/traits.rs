//! Domain traits defining contracts for the persistence collaborator.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::AppError;
use super::types::{TransactionRecord, Wallet};

/// Wallet reads and balance mutations inside an atomic scope
#[async_trait]
pub trait WalletRepository: Send {
    /// Point-in-time read without locking
    async fn get_wallet(&mut self, address: &str) -> Result<Option<Wallet>, AppError>;

    /// Read that holds an exclusive lock on the wallet until the scope ends.
    ///
    /// Blocks while another scope holds the same wallet, up to the store's
    /// lock timeout, after which it fails with [`AppError::LockTimeout`].
    async fn get_wallet_for_update(&mut self, address: &str) -> Result<Option<Wallet>, AppError>;

    /// Add `delta` to the wallet balance and return the updated wallet.
    ///
    /// Fails with [`AppError::InsufficientFunds`] rather than letting the
    /// balance go negative, and with [`AppError::WalletNotFound`] for an
    /// unknown address.
    async fn apply_delta(&mut self, address: &str, delta: Decimal) -> Result<Wallet, AppError>;
}

/// Append-only record of completed transfers inside an atomic scope
#[async_trait]
pub trait TransactionLog: Send {
    /// Insert one immutable entry; the store assigns `id` and `created_at`.
    async fn append_transaction(
        &mut self,
        from_address: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TransactionRecord, AppError>;
}

/// A unit of work whose reads and writes take effect together or not at all.
///
/// Dropping a scope that was neither committed nor rolled back discards its
/// effects and releases its locks.
#[async_trait]
pub trait AtomicScope: WalletRepository + TransactionLog {
    /// Make every write in the scope visible atomically and release locks.
    async fn commit(&mut self) -> Result<(), AppError>;

    /// Discard every write in the scope and release locks.
    async fn rollback(&mut self) -> Result<(), AppError>;
}

/// Database client trait for persistence operations
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Open a new atomic scope
    async fn begin(&self) -> Result<Box<dyn AtomicScope>, AppError>;

    /// Committed wallet state, no locking
    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, AppError>;

    /// Most recent ledger entries, newest first
    async fn list_recent_transactions(&self, limit: i64)
    -> Result<Vec<TransactionRecord>, AppError>;
}
