//! PostgreSQL database client implementation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgPoolOptions};
use std::env;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AppError, AtomicScope, DatabaseClient, DatabaseError, TransactionLog, TransactionRecord,
    ValidationError, Wallet, WalletRepository,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// Upper bound on waiting for a wallet row lock inside a scope
    pub lock_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl PostgresConfig {
    /// Load overrides from `DB_MAX_CONNECTIONS` and `DB_LOCK_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_connections);
        let lock_timeout = env::var("DB_LOCK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        Self {
            max_connections,
            min_connections: defaults.min_connections.min(max_connections),
            lock_timeout,
            ..defaults
        }
    }
}

/// Bootstrap seeding settings shared by the server and the `seed_wallets` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub enabled: bool,
    pub wallet_count: usize,
    pub wallet_balance: Decimal,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wallet_count: 10,
            wallet_balance: Decimal::from(100),
        }
    }
}

impl SeedConfig {
    /// Load from `SEED_WALLETS`, `SEED_WALLET_COUNT` and `SEED_WALLET_BALANCE`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::parse(
            env::var("SEED_WALLETS").ok(),
            env::var("SEED_WALLET_COUNT").ok(),
            env::var("SEED_WALLET_BALANCE").ok(),
        )
    }

    fn parse(
        enabled: Option<String>,
        count: Option<String>,
        balance: Option<String>,
    ) -> Result<Self, AppError> {
        let defaults = Self::default();
        let enabled = enabled
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.enabled);

        let wallet_count = match count {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| invalid_setting("SEED_WALLET_COUNT", &v, "not a count"))?,
            None => defaults.wallet_count,
        };

        let wallet_balance = match balance {
            Some(v) => {
                let balance = v
                    .parse::<Decimal>()
                    .map_err(|_| invalid_setting("SEED_WALLET_BALANCE", &v, "not a decimal"))?;
                if balance.is_sign_negative() {
                    return Err(invalid_setting("SEED_WALLET_BALANCE", &v, "negative"));
                }
                balance
            }
            None => defaults.wallet_balance,
        };

        Ok(Self {
            enabled,
            wallet_count,
            wallet_balance,
        })
    }
}

fn invalid_setting(name: &str, value: &str, reason: &str) -> AppError {
    AppError::Validation(ValidationError::InvalidField {
        field: name.to_string(),
        message: format!("{value:?} is {reason}"),
    })
}

/// Resolve the connection string from `DATABASE_URL`, or assemble it from
/// `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and `DB_SSLMODE`.
///
/// Returns `None` when neither form is configured.
pub fn database_url_from_env() -> Option<SecretString> {
    if let Some(url) = env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) {
        return Some(SecretString::from(url));
    }

    let host = env::var("DB_HOST").ok().filter(|v| !v.is_empty())?;
    let user = env::var("DB_USER").ok().filter(|v| !v.is_empty())?;
    let name = env::var("DB_NAME").ok().filter(|v| !v.is_empty())?;
    let password = env::var("DB_PASSWORD").unwrap_or_default();
    let port = env::var("DB_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(5432);
    let sslmode = env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());

    Some(SecretString::from(build_database_url(
        &host, port, &user, &password, &name, &sslmode,
    )))
}

fn build_database_url(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    name: &str,
    sslmode: &str,
) -> String {
    format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
}

/// PostgreSQL database client with connection pooling
pub struct PostgresClient {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self {
            pool,
            lock_timeout: config.lock_timeout,
        })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a wallet with an opening balance.
    #[instrument(skip(self))]
    pub async fn create_wallet(&self, address: &str, balance: Decimal) -> Result<Wallet, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (address, balance)
            VALUES ($1, $2)
            RETURNING address, balance
            "#,
        )
        .bind(address)
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_wallet(&row))
    }

    /// Create `count` random wallets holding `initial_balance` each, but only
    /// when the wallets table is empty. Returns the wallets created.
    #[instrument(skip(self))]
    pub async fn seed_wallets(
        &self,
        count: usize,
        initial_balance: Decimal,
    ) -> Result<Vec<Wallet>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent seeders wait here instead of both seeing an empty table
        sqlx::query("LOCK TABLE wallets IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            info!(existing, "Wallets already exist, skipping seed");
            return Ok(Vec::new());
        }

        let mut wallets = Vec::with_capacity(count);
        for _ in 0..count {
            let row = sqlx::query(
                "INSERT INTO wallets (address, balance) VALUES ($1, $2) RETURNING address, balance",
            )
            .bind(Wallet::generate_address())
            .bind(initial_balance)
            .fetch_one(&mut *tx)
            .await?;
            let wallet = Self::row_to_wallet(&row);
            debug!(address = %wallet.address, balance = %wallet.balance, "Seeded wallet");
            wallets.push(wallet);
        }

        tx.commit().await?;
        info!(count = wallets.len(), "Seeded wallets");
        Ok(wallets)
    }

    fn row_to_wallet(row: &sqlx::postgres::PgRow) -> Wallet {
        Wallet {
            address: row.get("address"),
            balance: row.get("balance"),
        }
    }

    fn row_to_transaction(row: &sqlx::postgres::PgRow) -> TransactionRecord {
        TransactionRecord {
            id: row.get("id"),
            from_address: row.get("from_address"),
            to_address: row.get("to_address"),
            amount: row.get("amount"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn AtomicScope>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Scoped to this transaction only (is_local = true)
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PostgresScope { tx: Some(tx) }))
    }

    #[instrument(skip(self))]
    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, AppError> {
        let row = sqlx::query("SELECT address, balance FROM wallets WHERE address = $1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::row_to_wallet))
    }

    #[instrument(skip(self))]
    async fn list_recent_transactions(
        &self,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_address, to_address, amount, created_at
            FROM transactions
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_transaction).collect())
    }
}

/// An open PostgreSQL transaction acting as the atomic scope.
///
/// sqlx rolls the transaction back when it is dropped unfinished.
pub struct PostgresScope {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresScope {
    fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        self.tx.as_deref_mut().ok_or_else(|| {
            AppError::Database(DatabaseError::Query(
                "Atomic scope already finished".to_string(),
            ))
        })
    }
}

#[async_trait]
impl WalletRepository for PostgresScope {
    async fn get_wallet(&mut self, address: &str) -> Result<Option<Wallet>, AppError> {
        let row = sqlx::query("SELECT address, balance FROM wallets WHERE address = $1")
            .bind(address)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(row.as_ref().map(PostgresClient::row_to_wallet))
    }

    async fn get_wallet_for_update(&mut self, address: &str) -> Result<Option<Wallet>, AppError> {
        let row =
            sqlx::query("SELECT address, balance FROM wallets WHERE address = $1 FOR UPDATE")
                .bind(address)
                .fetch_optional(self.conn()?)
                .await?;

        Ok(row.as_ref().map(PostgresClient::row_to_wallet))
    }

    async fn apply_delta(&mut self, address: &str, delta: Decimal) -> Result<Wallet, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $1
            WHERE address = $2 AND balance + $1 >= 0
            RETURNING address, balance
            "#,
        )
        .bind(delta)
        .bind(address)
        .fetch_optional(self.conn()?)
        .await?;

        if let Some(row) = row {
            return Ok(PostgresClient::row_to_wallet(&row));
        }

        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE address = $1")
                .bind(address)
                .fetch_optional(self.conn()?)
                .await?;

        match balance {
            None => Err(AppError::WalletNotFound(address.to_string())),
            Some(balance) => {
                warn!(%address, %balance, %delta, "Rejected delta that would overdraw wallet");
                Err(AppError::InsufficientFunds {
                    address: address.to_string(),
                    balance,
                    requested: -delta,
                })
            }
        }
    }
}

#[async_trait]
impl TransactionLog for PostgresScope {
    async fn append_transaction(
        &mut self,
        from_address: &str,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TransactionRecord, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (from_address, to_address, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_address, to_address, amount, created_at
            "#,
        )
        .bind(from_address)
        .bind(to_address)
        .bind(amount)
        .fetch_one(self.conn()?)
        .await?;

        Ok(PostgresClient::row_to_transaction(&row))
    }
}

#[async_trait]
impl AtomicScope for PostgresScope {
    async fn commit(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(AppError::from),
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(AppError::from),
            None => Ok(()),
        }
    }
}
