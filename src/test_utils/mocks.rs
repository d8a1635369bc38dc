//! Mock implementations for testing.
//!
//! [`MockDatabaseClient`] is an in-memory store that behaves like the
//! PostgreSQL one where it matters to the engine: per-wallet exclusive locks
//! held until the scope ends, bounded lock waits, writes staged inside a scope
//! and published together on commit.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{
    AppError, AtomicScope, DatabaseClient, DatabaseError, TransactionLog, TransactionRecord,
    Wallet, WalletRepository,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    wallets: HashMap<String, Decimal>,
    transactions: Vec<TransactionRecord>,
    next_id: i64,
}

type LockTable = Arc<DashMap<String, Arc<RowLock<()>>>>;

/// Mock database client for testing
pub struct MockDatabaseClient {
    ledger: Arc<Mutex<Ledger>>,
    row_locks: LockTable,
    lock_timeout: Duration,
    config: MockConfig,
    is_healthy: AtomicBool,
    fail_on_append: AtomicBool,
    scopes_opened: AtomicUsize,
}

impl MockDatabaseClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            row_locks: Arc::new(DashMap::new()),
            lock_timeout: Duration::from_secs(5),
            config,
            is_healthy: AtomicBool::new(true),
            fail_on_append: AtomicBool::new(false),
            scopes_opened: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Seed a wallet with a committed balance
    #[must_use]
    pub fn with_wallet(self, address: &str, balance: Decimal) -> Self {
        self.insert_wallet(address, balance);
        self
    }

    pub fn insert_wallet(&self, address: &str, balance: Decimal) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.wallets.insert(address.to_string(), balance);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Make every scope opened from now on fail its transaction log append
    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::Relaxed);
    }

    /// Committed balance of a wallet (for testing)
    pub fn balance_of(&self, address: &str) -> Option<Decimal> {
        self.ledger.lock().unwrap().wallets.get(address).copied()
    }

    /// Sum of all committed balances (for testing)
    pub fn total_balance(&self) -> Decimal {
        self.ledger.lock().unwrap().wallets.values().copied().sum()
    }

    /// All committed transactions in log order (for testing)
    pub fn get_all_transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.lock().unwrap().transactions.clone()
    }

    /// Number of atomic scopes opened so far (for testing)
    pub fn scopes_opened(&self) -> usize {
        self.scopes_opened.load(Ordering::Relaxed)
    }

    /// Hold a wallet's row lock from outside any scope, as a competing
    /// transaction would (for testing lock timeouts)
    pub async fn hold_wallet_lock(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = self.row_locks.entry(address.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn begin(&self) -> Result<Box<dyn AtomicScope>, AppError> {
        self.check_should_fail()?;
        self.scopes_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockScope {
            ledger: Arc::clone(&self.ledger),
            row_locks: Arc::clone(&self.row_locks),
            lock_timeout: self.lock_timeout,
            fail_on_append: self.fail_on_append.load(Ordering::Relaxed),
            held: HashMap::new(),
            deltas: HashMap::new(),
            appended: Vec::new(),
            finished: false,
        }))
    }

    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, AppError> {
        self.check_should_fail()?;
        Ok(self
            .balance_of(address)
            .map(|balance| Wallet::new(address, balance)))
    }

    async fn list_recent_transactions(
        &self,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.check_should_fail()?;
        let mut items = self.get_all_transactions();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(items.into_iter().take(limit.max(0) as usize).collect())
    }
}

/// In-memory atomic scope; dropping it releases its locks and discards its writes
pub struct MockScope {
    ledger: Arc<Mutex<Ledger>>,
    row_locks: LockTable,
    lock_timeout: Duration,
    fail_on_append: bool,
    held: HashMap<String, OwnedMutexGuard<()>>,
    deltas: HashMap<String, Decimal>,
    appended: Vec<TransactionRecord>,
    finished: bool,
}

impl MockScope {
    fn ensure_open(&self) -> Result<(), AppError> {
        if self.finished {
            return Err(AppError::Database(DatabaseError::Query(
                "Atomic scope already finished".to_string(),
            )));
        }
        Ok(())
    }

    async fn acquire(&mut self, address: &str) -> Result<(), AppError> {
        if self.held.contains_key(address) {
            return Ok(());
        }
        let lock = self.row_locks.entry(address.to_string()).or_default().clone();
        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                AppError::LockTimeout(format!("Timed out waiting for lock on wallet {address}"))
            })?;
        self.held.insert(address.to_string(), guard);
        Ok(())
    }

    /// Committed balance plus this scope's own pending writes
    fn staged_balance(&self, address: &str) -> Option<Decimal> {
        let ledger = self.ledger.lock().unwrap();
        ledger
            .wallets
            .get(address)
            .map(|balance| *balance + self.deltas.get(address).copied().unwrap_or_default())
    }

    fn exists(&self, address: &str) -> bool {
        self.ledger.lock().unwrap().wallets.contains_key(address)
    }

    fn finish(&mut self) {
        self.deltas.clear();
        self.appended.clear();
        self.held.clear();
        self.finished = true;
    }
}

#[async_trait]
impl WalletRepository for MockScope {
    async fn get_wallet(&mut self, address: &str) -> Result<Option<Wallet>, AppError> {
        self.ensure_open()?;
        Ok(self
            .staged_balance(address)
            .map(|balance| Wallet::new(address, balance)))
    }

    async fn get_wallet_for_update(&mut self, address: &str) -> Result<Option<Wallet>, AppError> {
        self.ensure_open()?;
        if !self.exists(address) {
            return Ok(None);
        }
        self.acquire(address).await?;
        Ok(self
            .staged_balance(address)
            .map(|balance| Wallet::new(address, balance)))
    }

    async fn apply_delta(&mut self, address: &str, delta: Decimal) -> Result<Wallet, AppError> {
        self.ensure_open()?;
        if !self.exists(address) {
            return Err(AppError::WalletNotFound(address.to_string()));
        }
        self.acquire(address).await?;

        let current = self
            .staged_balance(address)
            .ok_or_else(|| AppError::WalletNotFound(address.to_string()))?;
        let updated = current + delta;
        if updated < Decimal::ZERO {
            return Err(AppError::InsufficientFunds {
                address: address.to_string(),
                balance: current,
                requested: -delta,
            });
        }

        *self.deltas.entry(address.to_string()).or_default() += delta;
        Ok(Wallet::new(address, updated))
    }
}

#[async_trait]
impl TransactionLog for MockScope {
    async fn append_transaction(
        &mut self,
        from_address: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TransactionRecord, AppError> {
        self.ensure_open()?;
        if self.fail_on_append {
            return Err(AppError::Database(DatabaseError::Query(
                "Injected transaction log failure".to_string(),
            )));
        }

        let record = {
            let mut ledger = self.ledger.lock().unwrap();
            let known = |address: &str| ledger.wallets.contains_key(address);
            if !known(from_address) || !known(to_address) {
                return Err(AppError::Database(DatabaseError::Constraint(
                    "transactions references unknown wallet".to_string(),
                )));
            }
            ledger.next_id += 1;
            TransactionRecord {
                id: ledger.next_id,
                from_address: from_address.to_string(),
                to_address: to_address.to_string(),
                amount,
                created_at: Utc::now(),
            }
        };

        self.appended.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AtomicScope for MockScope {
    async fn commit(&mut self) -> Result<(), AppError> {
        if self.finished {
            return Ok(());
        }

        let result = {
            let mut ledger = self.ledger.lock().unwrap();
            let violates_check = self.deltas.iter().any(|(address, delta)| {
                ledger
                    .wallets
                    .get(address)
                    .is_none_or(|balance| *balance + *delta < Decimal::ZERO)
            });

            if violates_check {
                Err(AppError::Database(DatabaseError::Constraint(
                    "wallets_balance_check".to_string(),
                )))
            } else {
                for (address, delta) in &self.deltas {
                    if let Some(balance) = ledger.wallets.get_mut(address) {
                        *balance += *delta;
                    }
                }
                ledger.transactions.append(&mut self.appended);
                Ok(())
            }
        };

        self.finish();
        result
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        self.finish();
        Ok(())
    }
}
