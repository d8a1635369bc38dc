//! Infrastructure layer implementations.

pub mod database;

pub use database::{
    PostgresClient, PostgresConfig, PostgresScope, SeedConfig, database_url_from_env,
};
