//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::arbitrage::ExecutorStats;
use crate::market::MarketSlotKey;

/// What the engine is currently polling.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Polling {
    /// Kalshi market ticker.
    pub ticker: Option<String>,
    /// Current slot key.
    pub slot: Option<MarketSlotKey>,
    /// Time of the most recent snapshot.
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Set once the first snapshot has been handled.
    pub ready: Arc<AtomicBool>,
    /// Current ticker and slot.
    pub polling: Arc<RwLock<Polling>>,
    /// Executor stats.
    pub stats: Arc<RwLock<ExecutorStats>>,
    /// Whether orders are suppressed.
    pub dry_run: bool,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(dry_run: bool) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            polling: Arc::new(RwLock::new(Polling::default())),
            stats: Arc::new(RwLock::new(ExecutorStats::default())),
            dry_run,
            metrics: None,
        }
    }

    /// Attach the Prometheus handle rendered at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("ready", &self.is_ready())
            .field("dry_run", &self.dry_run)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Current ticker if available.
    pub ticker: Option<String>,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Whether orders are suppressed.
    pub dry_run: bool,
    /// Current ticker and slot.
    #[serde(flatten)]
    pub polling: Polling,
    /// Statistics.
    pub stats: ExecutorStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 once a snapshot was handled, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let ticker = state.polling.read().await.ticker.clone();

    let response = ReadyResponse {
        ready: is_ready,
        ticker,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns engine status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let polling = state.polling.read().await.clone();
    let stats = state.stats.read().await.clone();

    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        dry_run: state.dry_run,
        polling,
        stats,
    })
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics exporter not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_ready_toggle() {
        let state = AppState::new(true);
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn status_response_flattens_polling() {
        let response = StatusResponse {
            status: "running",
            dry_run: true,
            polling: Polling {
                ticker: Some("KXBTC15M-TEST".to_string()),
                slot: None,
                last_snapshot_at: None,
            },
            stats: ExecutorStats::default(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ticker"], "KXBTC15M-TEST");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["stats"]["legs_executed"], 0);
    }
}
