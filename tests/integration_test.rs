//! Integration tests for the API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tower::ServiceExt;

use wallet_ledger::api::{RouterConfig, create_router, create_router_with_config};
use wallet_ledger::app::AppState;
use wallet_ledger::domain::{
    ErrorResponse, HealthResponse, HealthStatus, TransactionRecord, TransferResponse, Wallet,
};
use wallet_ledger::test_utils::MockDatabaseClient;

fn create_test_db() -> Arc<MockDatabaseClient> {
    Arc::new(
        MockDatabaseClient::new()
            .with_wallet("W1", Decimal::from(100))
            .with_wallet("W2", Decimal::from(100)),
    )
}

fn create_test_state(db: &Arc<MockDatabaseClient>) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::clone(db) as _))
}

fn send_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/send")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_send_success() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"W2","amount":40}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: TransferResponse = read_json(response).await;
    assert_eq!(body.from, "W1");
    assert_eq!(body.to, "W2");
    assert_eq!(body.amount, Decimal::from(40));
    assert!(body.transaction_id > 0);

    assert_eq!(db.balance_of("W1"), Some(Decimal::from(60)));
    assert_eq!(db.balance_of("W2"), Some(Decimal::from(140)));
}

#[tokio::test]
async fn test_send_accepts_string_amount_and_long_field_names() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(
            r#"{"from_address":"W1","to_address":"W2","amount":"12.5"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(db.balance_of("W1"), Some(Decimal::new(875, 1)));
}

#[tokio::test]
async fn test_send_validation_error() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"","to":"W2","amount":10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "invalid_request");
    assert!(!body.error.retryable);
    assert_eq!(db.scopes_opened(), 0);
}

#[tokio::test]
async fn test_send_malformed_body_uses_error_envelope() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"W2""#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "invalid_request");
}

#[tokio::test]
async fn test_send_rejects_amounts_that_would_lose_digits() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    for body in [
        r#"{"from":"W1","to":"W2","amount":"1.000000000000000000000000000001"}"#,
        r#"{"from":"W1","to":"W2","amount":123456789012345678901234567}"#,
        r#"{"from":"W1","to":"W2","amount":0.5}"#,
    ] {
        let response = router.clone().oneshot(send_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");

        let error: ErrorResponse = read_json(response).await;
        assert_eq!(error.error.r#type, "invalid_request");
    }

    assert_eq!(db.balance_of("W1"), Some(Decimal::from(100)));
    assert!(db.get_all_transactions().is_empty());
}

#[tokio::test]
async fn test_request_deadline_uses_error_envelope() {
    let db = create_test_db();
    let config = RouterConfig {
        request_timeout: Duration::from_millis(50),
        ..RouterConfig::default()
    };
    let router = create_router_with_config(create_test_state(&db), config);

    // Lock wait in the store outlasts the request deadline
    let _guard = db.hold_wallet_lock("W1").await;
    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"W2","amount":"5"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "storage_failure");
    assert!(body.error.retryable);
    assert_eq!(db.balance_of("W1"), Some(Decimal::from(100)));
}

#[tokio::test]
async fn test_send_insufficient_funds() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"W2","amount":1000}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "insufficient_funds");
    assert!(!body.error.retryable);
    assert_eq!(db.balance_of("W1"), Some(Decimal::from(100)));
}

#[tokio::test]
async fn test_send_unknown_wallet() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"ghost","amount":10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "wallet_not_found");
}

#[tokio::test]
async fn test_send_storage_failure_is_retryable() {
    let db = create_test_db();
    db.set_fail_on_append(true);
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(send_request(r#"{"from":"W1","to":"W2","amount":10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: ErrorResponse = read_json(response).await;
    assert_eq!(body.error.r#type, "storage_failure");
    assert!(body.error.retryable);
    assert_eq!(db.balance_of("W1"), Some(Decimal::from(100)));
}

#[tokio::test]
async fn test_get_balance() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .clone()
        .oneshot(get_request("/api/wallet/W1/balance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let wallet: Wallet = read_json(response).await;
    assert_eq!(wallet.address, "W1");
    assert_eq!(wallet.balance, Decimal::from(100));

    let response = router
        .oneshot(get_request("/api/wallet/ghost/balance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_transactions_empty() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(get_request("/api/transactions?count=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let items: Vec<TransactionRecord> = read_json(response).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_list_transactions_rejects_bad_count() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    for uri in [
        "/api/transactions?count=0",
        "/api/transactions?count=-1",
        "/api/transactions?count=abc",
        "/api/transactions",
    ] {
        let response = router.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
        let body: ErrorResponse = read_json(response).await;
        assert_eq!(body.error.r#type, "invalid_request");
    }
}

#[tokio::test]
async fn test_health_check() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = read_json(response).await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.database, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_readiness_reflects_database_health() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .clone()
        .oneshot(get_request("/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    db.set_healthy(false);
    let response = router
        .clone()
        .oneshot(get_request("/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = router.oneshot(get_request("/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let db = create_test_db();
    let router = create_router(create_test_state(&db));

    let response = router
        .oneshot(get_request("/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = read_json(response).await;
    assert!(doc["paths"]["/api/send"].is_object());
}
