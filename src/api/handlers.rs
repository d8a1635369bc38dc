//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    BoxError, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tower::timeout::error::Elapsed;
use tracing::{error, info, warn};
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    AppError, DatabaseError, ErrorDetail, ErrorKind, ErrorResponse, HealthResponse, HealthStatus,
    RecentTransactionsParams, SubmitTransferRequest, TransactionRecord, TransferResponse,
    ValidationError, Wallet,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wallet Ledger API",
        version = "0.1.0",
        description = "API for atomic wallet-to-wallet transfers and ledger queries",
        license(
            name = "MIT"
        )
    ),
    paths(
        send_handler,
        get_balance_handler,
        list_transactions_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            Wallet,
            TransactionRecord,
            SubmitTransferRequest,
            TransferResponse,
            RecentTransactionsParams,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "transfers", description = "Wallet transfer endpoints"),
        (name = "queries", description = "Balance and ledger queries"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Transfer value between two wallets
///
/// Debits the sender, credits the receiver and records the transaction in
/// one atomic step. Nothing is applied when the request fails.
#[utoipa::path(
    post,
    path = "/api/send",
    tag = "transfers",
    request_body = SubmitTransferRequest,
    responses(
        (status = 201, description = "Transfer completed", body = TransferResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 402, description = "Insufficient funds", body = ErrorResponse),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (
            status = 503,
            description = "Lock timeout, database unavailable or deadline exceeded; safe to retry",
            body = ErrorResponse
        )
    )
)]
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| malformed("body", rejection.body_text()))?;
    let record = state.service.transfer(&payload).await?;
    Ok((StatusCode::CREATED, Json(TransferResponse::from(record))))
}

/// Get the balance of a wallet
#[utoipa::path(
    get,
    path = "/api/wallet/{address}/balance",
    tag = "queries",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Wallet found", body = Wallet),
        (status = 404, description = "Wallet not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn get_balance_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<Wallet>, AppError> {
    let wallet = state.service.get_balance(&address).await?;
    Ok(Json(wallet))
}

/// List the most recent transactions
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "queries",
    params(
        ("count" = i64, Query, description = "Number of transactions to return (positive)")
    ),
    responses(
        (status = 200, description = "Transactions, newest first", body = Vec<TransactionRecord>),
        (status = 400, description = "Invalid count", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn list_transactions_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RecentTransactionsParams>, QueryRejection>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let Query(params) = params.map_err(|rejection| malformed("count", rejection.body_text()))?;
    let transactions = state.service.get_recent_transactions(params.count).await?;
    info!(requested = params.count, returned = transactions.len(), "Listed transactions");
    Ok(Json(transactions))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness check
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Failures raised by the router's middleware stack, mapped onto the error envelope
pub async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        warn!("Request exceeded its deadline");
        return AppError::Database(DatabaseError::Timeout(
            "Request did not complete before its deadline".to_string(),
        ));
    }
    AppError::Database(DatabaseError::Query(err.to_string()))
}

/// Extractor rejections use the same error envelope as every other failure
fn malformed(field: &str, message: String) -> AppError {
    AppError::Validation(ValidationError::InvalidField {
        field: field.to_string(),
        message,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::WalletNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(DatabaseError::Connection(_) | DatabaseError::Timeout(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();

        if status.is_server_error() && kind == ErrorKind::StorageFailure {
            error!(error_type = %kind, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: kind.as_str().to_string(),
                message,
                retryable: kind.is_retryable(),
                timestamp: Utc::now(),
            },
        });

        (status, body).into_response()
    }
}
