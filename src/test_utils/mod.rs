//! Test doubles for the persistence layer.

pub mod mocks;

pub use mocks::{MockConfig, MockDatabaseClient};
