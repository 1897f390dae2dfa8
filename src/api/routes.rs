//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health, metrics, ready, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status endpoint
        .route("/api/v1/status", get(status))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(AppState::new(true));
        assert_eq!(get_status(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_before_first_snapshot() {
        let app = create_router(AppState::new(true));
        assert_eq!(get_status(app, "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = AppState::new(true);
        state.set_ready(true);
        let app = create_router(state);

        assert_eq!(get_status(app, "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_ticker() {
        let state = AppState::new(false);
        state.polling.write().await.ticker = Some("KXBTC15M-TEST".to_string());
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ticker"], "KXBTC15M-TEST");
        assert_eq!(json["dry_run"], false);
        assert_eq!(json["status"], "starting");
    }

    #[tokio::test]
    async fn metrics_endpoint_without_exporter_is_unavailable() {
        let app = create_router(AppState::new(true));
        assert_eq!(get_status(app, "/metrics").await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
