//! Transfer engine.
//!
//! One transfer runs entirely inside a single atomic scope: both wallets are
//! locked in canonical address order, the sender balance is checked, the
//! debit, credit and ledger entry are written, and the scope commits. Any
//! failure after the scope opens rolls all of it back.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, AtomicScope, DatabaseClient, SubmitTransferRequest, TransactionLog,
    TransactionRecord, ValidationError, Wallet, WalletRepository,
};

/// Stateless orchestrator for wallet-to-wallet transfers
pub struct TransferEngine {
    db_client: Arc<dyn DatabaseClient>,
}

impl TransferEngine {
    #[must_use]
    pub fn new(db_client: Arc<dyn DatabaseClient>) -> Self {
        Self { db_client }
    }

    /// Move `request.amount` from `request.from_address` to `request.to_address`.
    ///
    /// Invalid input is rejected before any scope is opened. The engine never
    /// retries; `LockTimeout` and `StorageFailure` leave no partial effect and
    /// can be retried by the caller with the same request.
    #[instrument(
        skip(self, request),
        fields(from = %request.from_address, to = %request.to_address, amount = %request.amount)
    )]
    pub async fn transfer(
        &self,
        request: &SubmitTransferRequest,
    ) -> Result<TransactionRecord, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        let mut scope = self.db_client.begin().await?;

        match execute_transfer(scope.as_mut(), request).await {
            Ok(record) => {
                scope.commit().await?;
                info!(id = record.id, "Transfer committed");
                Ok(record)
            }
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    error!(error = %rollback_err, "Rollback failed, scope discarded on drop");
                }
                warn!(kind = %e.kind(), error = %e, "Transfer rolled back");
                Err(e)
            }
        }
    }
}

async fn execute_transfer(
    scope: &mut dyn AtomicScope,
    request: &SubmitTransferRequest,
) -> Result<TransactionRecord, AppError> {
    let from = request.from_address.as_str();
    let to = request.to_address.as_str();
    let amount = request.amount;

    let (first, second) = lock_order(from, to);
    let first_wallet = lock_wallet(scope, first).await?;
    let second_wallet = lock_wallet(scope, second).await?;

    let sender = if first_wallet.address == from {
        first_wallet
    } else {
        second_wallet
    };

    if sender.balance < amount {
        return Err(AppError::InsufficientFunds {
            address: sender.address,
            balance: sender.balance,
            requested: amount,
        });
    }

    scope.apply_delta(from, -amount).await?;
    scope.apply_delta(to, amount).await?;
    scope.append_transaction(from, to, amount).await
}

async fn lock_wallet(scope: &mut dyn AtomicScope, address: &str) -> Result<Wallet, AppError> {
    scope
        .get_wallet_for_update(address)
        .await?
        .ok_or_else(|| AppError::WalletNotFound(address.to_string()))
}

/// Canonical lock order: two transfers over the same pair always lock the
/// same wallet first, whichever direction they move value.
fn lock_order<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}
