//! Domain types with validation support.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

/// Maximum number of fractional digits a stored amount can carry (NUMERIC(38, 8)).
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Number of random bytes in a generated wallet address.
const ADDRESS_BYTES: usize = 16;

/// A named holder of balance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Wallet {
    /// Wallet address (hex string)
    #[schema(example = "d6a6a923049b728b1534e37a0c1c3f21")]
    pub address: String,
    /// Current committed balance
    #[schema(example = "100")]
    pub balance: Decimal,
}

impl Wallet {
    #[must_use]
    pub fn new(address: impl Into<String>, balance: Decimal) -> Self {
        Self {
            address: address.into(),
            balance,
        }
    }

    /// Generate a random 32-character hex address for a seeded wallet.
    #[must_use]
    pub fn generate_address() -> String {
        let mut bytes = [0u8; ADDRESS_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// Immutable ledger entry describing one completed transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TransactionRecord {
    /// Store-assigned, strictly increasing identifier
    #[schema(example = 42)]
    pub id: i64,
    /// Sender wallet address
    #[serde(rename = "from")]
    #[schema(example = "d6a6a923049b728b1534e37a0c1c3f21")]
    pub from_address: String,
    /// Receiver wallet address
    #[serde(rename = "to")]
    #[schema(example = "0b7c2f5e9a1d4c3b8e6f7a2d1c0b9e8f")]
    pub to_address: String,
    /// Amount moved
    #[schema(example = "40")]
    pub amount: Decimal,
    /// Store-assigned creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Request to move value between two wallets
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_distinct_addresses"))]
pub struct SubmitTransferRequest {
    /// Sender wallet address
    #[serde(rename = "from", alias = "from_address")]
    #[validate(length(min = 1, message = "From address is required"))]
    #[schema(example = "d6a6a923049b728b1534e37a0c1c3f21")]
    pub from_address: String,
    /// Receiver wallet address
    #[serde(rename = "to", alias = "to_address")]
    #[validate(length(min = 1, message = "To address is required"))]
    #[schema(example = "0b7c2f5e9a1d4c3b8e6f7a2d1c0b9e8f")]
    pub to_address: String,
    /// Amount to transfer, positive with at most 8 fractional digits
    #[serde(deserialize_with = "deserialize_exact_amount")]
    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "40")]
    pub amount: Decimal,
}

impl SubmitTransferRequest {
    #[must_use]
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
        }
    }
}

/// Read an amount keeping every digit the caller sent.
///
/// Strings must parse without rounding and integers are taken as-is. Fractional
/// JSON numbers are refused because they have already passed through `f64`.
fn deserialize_exact_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct ExactAmount;

    impl Visitor<'_> for ExactAmount {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
            Decimal::from_str_exact(v)
                .map_err(|_| E::custom(format!("amount {v:?} is not an exact decimal")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Decimal, E> {
            Err(E::custom(
                "fractional or oversized amounts must be sent as a decimal string",
            ))
        }
    }

    deserializer.deserialize_any(ExactAmount)
}

fn validate_amount(amount: &Decimal) -> Result<(), validator::ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut err = validator::ValidationError::new("amount_not_positive");
        err.message = Some("Amount must be positive".into());
        return Err(err);
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        let mut err = validator::ValidationError::new("amount_precision");
        err.message =
            Some(format!("Amount supports at most {MAX_AMOUNT_SCALE} decimal places").into());
        return Err(err);
    }
    Ok(())
}

fn validate_distinct_addresses(
    request: &SubmitTransferRequest,
) -> Result<(), validator::ValidationError> {
    if request.from_address == request.to_address {
        let mut err = validator::ValidationError::new("same_wallet");
        err.message = Some("From and to addresses must differ".into());
        return Err(err);
    }
    Ok(())
}

/// Response returned after a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferResponse {
    /// Human-readable outcome
    #[schema(example = "Transfer completed successfully")]
    pub message: String,
    /// Identifier of the ledger entry
    #[schema(example = 42)]
    pub transaction_id: i64,
    /// Timestamp of the ledger entry
    pub created_at: DateTime<Utc>,
    /// Sender wallet address
    pub from: String,
    /// Receiver wallet address
    pub to: String,
    /// Amount moved
    #[schema(example = "40")]
    pub amount: Decimal,
}

impl From<TransactionRecord> for TransferResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            message: "Transfer completed successfully".to_string(),
            transaction_id: record.id,
            created_at: record.created_at,
            from: record.from_address,
            to: record.to_address,
            amount: record.amount,
        }
    }
}

/// Query parameters for listing recent transactions
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecentTransactionsParams {
    /// Number of most recent transactions to return (must be positive)
    #[validate(range(min = 1, message = "Count must be a positive integer"))]
    #[schema(example = 10)]
    pub count: i64,
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Critical systems unavailable
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Database health status
    pub database: HealthStatus,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus) -> Self {
        Self {
            status: database,
            database,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable error kind identifier
    #[schema(example = "insufficient_funds")]
    pub r#type: String,
    /// Human-readable error message
    #[schema(example = "Insufficient funds in wallet d6a6…: current balance 60, required 1000")]
    pub message: String,
    /// Whether the identical request may be retried
    pub retryable: bool,
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_submit_transfer_request_validation() {
        // Valid request
        let req = SubmitTransferRequest::new("W1", "W2", Decimal::from(40));
        assert!(req.validate().is_ok());

        // Invalid From (empty)
        let req = SubmitTransferRequest::new("", "W2", Decimal::from(10));
        assert!(req.validate().is_err());

        // Invalid To (empty)
        let req = SubmitTransferRequest::new("W1", "", Decimal::from(10));
        assert!(req.validate().is_err());

        // Same wallet on both sides
        let req = SubmitTransferRequest::new("W1", "W1", Decimal::from(10));
        assert!(req.validate().is_err());

        // Zero and negative amounts
        let req = SubmitTransferRequest::new("W1", "W2", Decimal::ZERO);
        assert!(req.validate().is_err());
        let req = SubmitTransferRequest::new("W1", "W2", Decimal::from(-5));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_amount_precision_is_bounded() {
        let ok = Decimal::from_str("0.00000001").unwrap();
        assert!(SubmitTransferRequest::new("W1", "W2", ok).validate().is_ok());

        let too_fine = Decimal::from_str("0.000000001").unwrap();
        assert!(SubmitTransferRequest::new("W1", "W2", too_fine).validate().is_err());

        // Trailing zeros do not count against the scale
        let padded = Decimal::from_str("1.5000000000").unwrap();
        assert!(SubmitTransferRequest::new("W1", "W2", padded).validate().is_ok());
    }

    #[test]
    fn test_submit_transfer_request_accepts_wire_names_and_aliases() {
        let req: SubmitTransferRequest =
            serde_json::from_str(r#"{"from":"a","to":"b","amount":100}"#).unwrap();
        assert_eq!(req.from_address, "a");
        assert_eq!(req.to_address, "b");
        assert_eq!(req.amount, Decimal::from(100));

        let req: SubmitTransferRequest =
            serde_json::from_str(r#"{"from_address":"a","to_address":"b","amount":"12.5"}"#)
                .unwrap();
        assert_eq!(req.amount, Decimal::from_str("12.5").unwrap());
    }

    #[test]
    fn test_amount_digits_are_never_rounded_away() {
        // Beyond 28 significant digits rust_decimal would otherwise round to 1
        let result = serde_json::from_str::<SubmitTransferRequest>(
            r#"{"from":"a","to":"b","amount":"1.000000000000000000000000000001"}"#,
        );
        assert!(result.is_err());

        // Fractional and oversized JSON numbers arrive through f64
        for body in [
            r#"{"from":"a","to":"b","amount":12.5}"#,
            r#"{"from":"a","to":"b","amount":123456789012345678901234567}"#,
        ] {
            assert!(serde_json::from_str::<SubmitTransferRequest>(body).is_err());
        }

        // Exact but too fine: parses, then fails validation
        let req: SubmitTransferRequest =
            serde_json::from_str(r#"{"from":"a","to":"b","amount":"0.123456789"}"#).unwrap();
        assert_eq!(req.amount, Decimal::from_str("0.123456789").unwrap());
        assert!(req.validate().is_err());

        let req: SubmitTransferRequest = serde_json::from_str(
            r#"{"from":"a","to":"b","amount":"123456789012345678901234567"}"#,
        )
        .unwrap();
        assert_eq!(req.amount.to_string(), "123456789012345678901234567");
    }

    #[test]
    fn test_recent_transactions_params_validation() {
        assert!(RecentTransactionsParams { count: 1 }.validate().is_ok());
        assert!(RecentTransactionsParams { count: 0 }.validate().is_err());
        assert!(RecentTransactionsParams { count: -3 }.validate().is_err());
    }

    #[test]
    fn test_generated_addresses_are_hex_and_unique() {
        let a = Wallet::generate_address();
        let b = Wallet::generate_address();
        assert_eq!(a.len(), ADDRESS_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_transfer_response_from_record() {
        let record = TransactionRecord {
            id: 7,
            from_address: "W1".to_string(),
            to_address: "W2".to_string(),
            amount: Decimal::from(40),
            created_at: Utc::now(),
        };
        let response = TransferResponse::from(record.clone());
        assert_eq!(response.transaction_id, 7);
        assert_eq!(response.from, "W1");
        assert_eq!(response.to, "W2");
        assert_eq!(response.amount, record.amount);
        assert_eq!(response.created_at, record.created_at);
    }

    #[test]
    fn test_health_response_follows_database() {
        assert_eq!(
            HealthResponse::new(HealthStatus::Healthy).status,
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthResponse::new(HealthStatus::Unhealthy).status,
            HealthStatus::Unhealthy
        );
    }
}
