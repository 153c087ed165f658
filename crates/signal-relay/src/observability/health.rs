//! Health endpoints for Signal Relay.
//!
//! - `GET /health` - Liveness: the process is up, with uptime
//! - `GET /ready` - Readiness: the relay accepts new connections
//!
//! Readiness flips to false at the start of graceful shutdown so load
//! balancers stop routing new participants here while existing
//! connections drain.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Liveness and readiness state shared with the shutdown path.
#[derive(Debug)]
pub struct HealthState {
    ready: AtomicBool,
    started_at: Instant,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (not ready).
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the relay as draining.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

/// Router with `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_seconds: state.uptime_seconds(),
    })
}

async fn readiness_handler(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let uptime_seconds = state.uptime_seconds();
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                uptime_seconds,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "draining",
                uptime_seconds,
            }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::new();
        assert!(!state.is_ready(), "Should not be ready by default");

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready(), "Draining after set_not_ready()");
    }

    #[tokio::test]
    async fn test_health_endpoint_reports_healthy() {
        let app = health_router(Arc::new(HealthState::new()));

        let (status, body) = get_json(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_ready_endpoint_follows_state() {
        let state = Arc::new(HealthState::new());

        let (status, body) = get_json(health_router(Arc::clone(&state)), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "draining");

        state.set_ready();
        let (status, body) = get_json(health_router(Arc::clone(&state)), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let app = health_router(Arc::new(HealthState::new()));
        let (status, _) = get_json(app, "/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
