//! Router construction and HTTP middleware.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    error_handling::HandleErrorLayer,
    routing::{get, post},
};
use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;

use super::handlers::{
    ApiDoc, get_balance_handler, handle_middleware_error, health_check_handler,
    list_transactions_handler, liveness_handler, readiness_handler, send_handler,
};

/// HTTP layer configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Upper bound on a single request, including waiting for wallet locks
    pub request_timeout: Duration,
    /// Maximum accepted request body size in bytes
    pub body_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            body_limit: 64 * 1024,
        }
    }
}

impl RouterConfig {
    /// Load overrides from `REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            request_timeout,
            ..defaults
        }
    }
}

/// Create the application router with default middleware settings
pub fn create_router(app_state: Arc<AppState>) -> Router {
    create_router_with_config(app_state, RouterConfig::default())
}

/// Create the application router
pub fn create_router_with_config(app_state: Arc<AppState>, config: RouterConfig) -> Router {
    let api_routes = Router::new()
        .route("/api/send", post(send_handler))
        .route("/api/wallet/{address}/balance", get(get_balance_handler))
        .route("/api/transactions", get(list_transactions_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .layer(RequestBodyLimitLayer::new(config.body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
