//! Application service exposing the ledger operations to adapters.

use std::sync::Arc;

use tracing::instrument;

use crate::domain::{
    AppError, DatabaseClient, HealthResponse, HealthStatus, SubmitTransferRequest,
    TransactionRecord, Wallet,
};

use super::engine::TransferEngine;
use super::query::QueryService;

/// Application service containing business logic
pub struct AppService {
    db_client: Arc<dyn DatabaseClient>,
    engine: TransferEngine,
    queries: QueryService,
}

impl AppService {
    #[must_use]
    pub fn new(db_client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            engine: TransferEngine::new(Arc::clone(&db_client)),
            queries: QueryService::new(Arc::clone(&db_client)),
            db_client,
        }
    }

    /// Atomically move value between two wallets and record it.
    pub async fn transfer(
        &self,
        request: &SubmitTransferRequest,
    ) -> Result<TransactionRecord, AppError> {
        self.engine.transfer(request).await
    }

    /// Get the committed balance of a wallet
    pub async fn get_balance(&self, address: &str) -> Result<Wallet, AppError> {
        self.queries.get_balance(address).await
    }

    /// List the most recent transactions, newest first
    pub async fn get_recent_transactions(
        &self,
        count: i64,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.queries.get_recent(count).await
    }

    /// Perform health check on the database
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_health = match self.db_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(db_health)
    }
}
