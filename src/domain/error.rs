//! Error taxonomy for the ledger.

use rust_decimal::Decimal;
use thiserror::Error;

/// Postgres SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// Postgres SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for CHECK constraint violations.
const CHECK_VIOLATION: &str = "23514";
/// Postgres SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Stable, closed classification of every failure the ledger can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input
    InvalidRequest,
    /// A referenced wallet does not exist
    WalletNotFound,
    /// Sender balance is below the requested amount
    InsufficientFunds,
    /// A wallet lock could not be acquired in time
    LockTimeout,
    /// The underlying store failed
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::WalletNotFound => "wallet_not_found",
            Self::InsufficientFunds => "insufficient_funds",
            Self::LockTimeout => "lock_timeout",
            Self::StorageFailure => "storage_failure",
        }
    }

    /// Whether the identical request may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout | Self::StorageFailure)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error(
        "Insufficient funds in wallet {address}: current balance {balance}, required {requested}"
    )]
    InsufficientFunds {
        address: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Database error: {0}")]
    Database(#[source] DatabaseError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidRequest,
            Self::WalletNotFound(_) => ErrorKind::WalletNotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::LockTimeout(_) => ErrorKind::LockTimeout,
            Self::Database(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return AppError::LockTimeout(db_err.message().to_string());
            }
        }
        AppError::Database(DatabaseError::from(err))
    }
}

/// Request validation failures
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("{0}")]
    Multiple(String),
}

/// Storage-layer failures
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => DatabaseError::Connection(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => DatabaseError::Duplicate(db_err.message().to_string()),
                Some(CHECK_VIOLATION) | Some(FOREIGN_KEY_VIOLATION) => {
                    DatabaseError::Constraint(db_err.message().to_string())
                }
                _ => DatabaseError::Query(db_err.message().to_string()),
            },
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_maps_to_one_kind() {
        let cases = vec![
            (
                AppError::Validation(ValidationError::MissingField("from".to_string())),
                ErrorKind::InvalidRequest,
            ),
            (
                AppError::WalletNotFound("ghost".to_string()),
                ErrorKind::WalletNotFound,
            ),
            (
                AppError::InsufficientFunds {
                    address: "w1".to_string(),
                    balance: Decimal::from(60),
                    requested: Decimal::from(1000),
                },
                ErrorKind::InsufficientFunds,
            ),
            (
                AppError::LockTimeout("canceling statement".to_string()),
                ErrorKind::LockTimeout,
            ),
            (
                AppError::Database(DatabaseError::Connection("refused".to_string())),
                ErrorKind::StorageFailure,
            ),
            (
                AppError::Database(DatabaseError::Timeout("deadline".to_string())),
                ErrorKind::StorageFailure,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_only_transient_kinds_are_retryable() {
        assert!(!ErrorKind::InvalidRequest.is_retryable());
        assert!(!ErrorKind::WalletNotFound.is_retryable());
        assert!(!ErrorKind::InsufficientFunds.is_retryable());
        assert!(ErrorKind::LockTimeout.is_retryable());
        assert!(ErrorKind::StorageFailure.is_retryable());
    }

    #[test]
    fn test_insufficient_funds_message_reports_amounts() {
        let err = AppError::InsufficientFunds {
            address: "w1".to_string(),
            balance: Decimal::from(60),
            requested: Decimal::from(1000),
        };
        let message = err.to_string();
        assert!(message.contains("60"));
        assert!(message.contains("1000"));
    }

    #[test]
    fn test_pool_timeout_is_connection_failure() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::Connection(_))
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_database_error_is_kept_as_source() {
        use std::error::Error as _;
        let err = AppError::from(DatabaseError::Query("boom".to_string()));
        assert!(err.source().is_some());
    }
}
