//! Application layer containing business logic and shared state.

pub mod engine;
pub mod query;
pub mod service;
pub mod state;

pub use engine::TransferEngine;
pub use query::QueryService;
pub use service::AppService;
pub use state::AppState;
