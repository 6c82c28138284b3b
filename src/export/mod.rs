pub mod health;
pub mod query;

use std::sync::Arc;

use prometheus::{Counter, Registry};

use crate::stats::ErrorStats;

/// Shared state for axum handlers.
pub(crate) struct AppState {
    pub registry: Registry,
    pub stats: Arc<ErrorStats>,
    pub resets: Counter,
}
