use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::AppState;
use crate::stats::row::StatRow;
use crate::stats::slow::SlowLogStats;
use crate::stats::StatsError;

/// Maps service errors onto HTTP statuses.
#[derive(Debug)]
pub struct QueryError(StatsError);

impl From<StatsError> for QueryError {
    fn from(e: StatsError) -> Self {
        Self(e)
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StatsError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            StatsError::AlreadyInitialized => StatusCode::CONFLICT,
        };
        (status, self.0.to_string()).into_response()
    }
}

/// GET /stats - snapshot rows as JSON.
pub(crate) async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StatRow>>, QueryError> {
    Ok(Json(state.stats.snapshot()?))
}

/// POST /stats/reset - zero all counters.
pub(crate) async fn reset_handler(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, QueryError> {
    state.stats.reset()?;
    state.resets.inc();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /slow_log - slow-statement tally, empty before initialization.
pub(crate) async fn slow_log_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<SlowLogStats>> {
    Json(state.stats.slow_stats().into_iter().collect())
}
