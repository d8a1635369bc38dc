//! Read-only queries over wallets and the transaction log.

use std::sync::Arc;

use tracing::{instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, DatabaseClient, RecentTransactionsParams, TransactionRecord, ValidationError, Wallet,
};

pub struct QueryService {
    db_client: Arc<dyn DatabaseClient>,
}

impl QueryService {
    #[must_use]
    pub fn new(db_client: Arc<dyn DatabaseClient>) -> Self {
        Self { db_client }
    }

    /// Committed balance of a wallet. Never observes an uncommitted transfer.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, address: &str) -> Result<Wallet, AppError> {
        if address.is_empty() {
            return Err(AppError::Validation(ValidationError::MissingField(
                "address".to_string(),
            )));
        }

        self.db_client
            .get_wallet(address)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(address.to_string()))
    }

    /// Up to `count` most recent transactions, newest first.
    #[instrument(skip(self))]
    pub async fn get_recent(&self, count: i64) -> Result<Vec<TransactionRecord>, AppError> {
        RecentTransactionsParams { count }.validate().map_err(|e| {
            warn!(error = %e, "Validation failed");
            AppError::Validation(ValidationError::InvalidField {
                field: "count".to_string(),
                message: "Count must be a positive integer".to_string(),
            })
        })?;

        self.db_client.list_recent_transactions(count).await
    }
}
