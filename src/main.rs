//! Application entry point.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretString};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::api::{RouterConfig, create_router_with_config};
use wallet_ledger::app::AppState;
use wallet_ledger::infra::{PostgresClient, PostgresConfig, SeedConfig, database_url_from_env};

/// Application configuration
struct Config {
    database_url: SecretString,
    host: String,
    port: u16,
    seed: SeedConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = database_url_from_env().context(
            "DATABASE_URL not set (or DB_HOST, DB_USER and DB_NAME to compose one)",
        )?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let seed = SeedConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            seed,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🏗️  Wallet Ledger v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    info!("📦 Initializing infrastructure...");

    let db_config = PostgresConfig::from_env();
    info!(
        "   ✓ Pool size {}, lock timeout {}ms",
        db_config.max_connections,
        db_config.lock_timeout.as_millis()
    );
    let postgres_client =
        PostgresClient::new(config.database_url.expose_secret(), db_config).await?;
    postgres_client.run_migrations().await?;
    info!("   ✓ Database connected and migrations applied");

    if config.seed.enabled {
        let seeded = postgres_client
            .seed_wallets(config.seed.wallet_count, config.seed.wallet_balance)
            .await?;
        if seeded.is_empty() {
            info!("   ○ Wallets already present, seeding skipped");
        } else {
            info!(
                "   ✓ Seeded {} wallets with balance {}",
                seeded.len(),
                config.seed.wallet_balance
            );
            for wallet in &seeded {
                info!("     • {}", wallet.address);
            }
        }
    } else {
        info!("   ○ Wallet seeding disabled");
    }

    let app_state = Arc::new(AppState::new(Arc::new(postgres_client)));

    let router_config = RouterConfig::from_env();
    info!(
        "   ✓ Request timeout {}s",
        router_config.request_timeout.as_secs()
    );
    let router = create_router_with_config(app_state, router_config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("🚀 Server listening on http://{}", addr);
    info!("📖 Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
