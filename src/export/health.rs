use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::query::{reset_handler, slow_log_handler, stats_handler};
use super::AppState;
use crate::stats::ErrorStats;

const NAMESPACE: &str = "errwindow";

/// Prometheus self-metrics and the HTTP server exposing them.
///
/// All metrics use the "errwindow" namespace.
pub struct HealthMetrics {
    registry: Registry,
    addr: String,
    shutdown: parking_lot::Mutex<Option<CancellationToken>>,

    /// Parsed log events by level.
    pub events_received: CounterVec,
    /// Events counted against the fallback category.
    pub unknown_codes: Counter,
    /// Slow-statement lines seen.
    pub slow_events: Counter,
    /// Input lines that could not be parsed.
    pub parse_errors: Counter,
    /// Completed window rotations.
    pub rotations: Counter,
    /// Time spent in one rotation (10us-50ms buckets).
    pub rotation_duration: Histogram,
    /// Successful statistics resets.
    pub resets: Counter,
    /// Number of registered error categories, fallback included.
    pub categories: Gauge,
}

impl HealthMetrics {
    /// Creates a new health metrics instance with all metrics registered.
    pub fn new(addr: &str) -> Result<Self> {
        let registry = Registry::new();

        let events_received = CounterVec::new(
            Opts::new(
                "events_received_total",
                "Total parsed log events by level.",
            )
            .namespace(NAMESPACE),
            &["level"],
        )?;
        let unknown_codes = Counter::with_opts(
            Opts::new(
                "unknown_codes_total",
                "Total events whose error code is not in the catalogue.",
            )
            .namespace(NAMESPACE),
        )?;
        let slow_events = Counter::with_opts(
            Opts::new("slow_events_total", "Total slow-statement log lines.")
                .namespace(NAMESPACE),
        )?;
        let parse_errors = Counter::with_opts(
            Opts::new(
                "parse_errors_total",
                "Total input lines that could not be parsed.",
            )
            .namespace(NAMESPACE),
        )?;
        let rotations = Counter::with_opts(
            Opts::new("rotations_total", "Total window rotations.").namespace(NAMESPACE),
        )?;
        let rotation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "rotation_duration_seconds",
                "Time to fold current buckets into history.",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.05]),
        )?;
        let resets = Counter::with_opts(
            Opts::new("resets_total", "Total statistics resets.").namespace(NAMESPACE),
        )?;
        let categories = Gauge::with_opts(
            Opts::new(
                "categories",
                "Number of registered error categories.",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(events_received.clone()))?;
        registry.register(Box::new(unknown_codes.clone()))?;
        registry.register(Box::new(slow_events.clone()))?;
        registry.register(Box::new(parse_errors.clone()))?;
        registry.register(Box::new(rotations.clone()))?;
        registry.register(Box::new(rotation_duration.clone()))?;
        registry.register(Box::new(resets.clone()))?;
        registry.register(Box::new(categories.clone()))?;

        Ok(Self {
            registry,
            addr: addr.to_string(),
            shutdown: parking_lot::Mutex::new(None),
            events_received,
            unknown_codes,
            slow_events,
            parse_errors,
            rotations,
            rotation_duration,
            resets,
            categories,
        })
    }

    /// Builds the router serving statistics, /metrics and /healthz.
    pub fn router(&self, stats: Arc<ErrorStats>) -> Router {
        let app_state = Arc::new(AppState {
            registry: self.registry.clone(),
            stats,
            resets: self.resets.clone(),
        });

        Router::new()
            .route("/stats", get(stats_handler))
            .route("/stats/reset", post(reset_handler))
            .route("/slow_log", get(slow_log_handler))
            .route("/metrics", get(metrics_handler))
            .route("/healthz", get(healthz_handler))
            .with_state(app_state)
    }

    /// Starts the HTTP server and returns the bound address.
    pub async fn start(&self, stats: Arc<ErrorStats>) -> Result<SocketAddr> {
        // Parse address, handling ":port" shorthand.
        let bind_addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };

        let app = self.router(stats);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("listening on {bind_addr}"))?;

        let local_addr = listener.local_addr().context("getting local address")?;

        let cancel = CancellationToken::new();
        *self.shutdown.lock() = Some(cancel.clone());

        tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "stats server started");

            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "stats server error");
            }
        });

        Ok(local_addr)
    }

    /// Gracefully shuts down the server.
    pub async fn stop(&self) -> Result<()> {
        if let Some(cancel) = self.shutdown.lock().take() {
            cancel.cancel();
        }

        Ok(())
    }
}

/// GET /metrics - Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "encoding metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "encoding error".to_string(),
        );
    }

    match String::from_utf8(buffer) {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!(error = %e, "converting metrics to string");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encoding error".to_string(),
            )
        }
    }
}

/// GET /healthz - Simple health check.
async fn healthz_handler() -> &'static str {
    "ok"
}
