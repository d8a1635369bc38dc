//! Seed wallets: apply migrations and populate an empty ledger.
//!
//! Creates `SEED_WALLET_COUNT` (default 10) wallets holding
//! `SEED_WALLET_BALANCE` (default 100) each, prints their addresses and a
//! sample request body for `POST /api/send`. Does nothing to a ledger that
//! already has wallets.
//!
//! Usage:
//!   cargo run --bin seed_wallets

use anyhow::{Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;

use wallet_ledger::domain::SubmitTransferRequest;
use wallet_ledger::infra::{PostgresClient, PostgresConfig, SeedConfig, database_url_from_env};

fn print_separator(title: &str) {
    println!("{}", "=".repeat(70));
    println!("  {}", title);
    println!("{}", "=".repeat(70));
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let database_url = database_url_from_env().context("DATABASE_URL not set")?;
    let seed = SeedConfig::from_env()?;

    let client = PostgresClient::new(database_url.expose_secret(), PostgresConfig::from_env())
        .await
        .context("Failed to connect to database")?;
    client.run_migrations().await?;

    let wallets = client.seed_wallets(seed.wallet_count, seed.wallet_balance).await?;
    if wallets.is_empty() {
        println!("Ledger already has wallets, nothing seeded.");
        return Ok(());
    }

    print_separator("Seeded wallets");
    for wallet in &wallets {
        println!("  {}  {}", wallet.address, wallet.balance);
    }

    if let [first, second, ..] = wallets.as_slice() {
        let request =
            SubmitTransferRequest::new(&first.address, &second.address, Decimal::new(125, 1));
        print_separator("Sample POST /api/send body");
        println!("{}", serde_json::to_string_pretty(&request)?);
    }

    Ok(())
}
