//! Database implementations.

pub mod postgres;

pub use postgres::{
    PostgresClient, PostgresConfig, PostgresScope, SeedConfig, database_url_from_env,
};
