//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, DatabaseError, ErrorKind, ValidationError};
pub use traits::{AtomicScope, DatabaseClient, TransactionLog, WalletRepository};
pub use types::{
    ErrorDetail, ErrorResponse, HealthResponse, HealthStatus, MAX_AMOUNT_SCALE,
    RecentTransactionsParams, SubmitTransferRequest, TransactionRecord, TransferResponse, Wallet,
};
