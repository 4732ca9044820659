//! tgsync-api — HTTP surface for the tgsync daemon.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness: 200 while the process runs |
//! | GET | `/trigger` | Run one sync pass inline; 200 `ok` or 503 with the error |
//!
//! The debug router (separate bind, optional) serves a redacted snapshot of
//! the effective configuration under `/debug/config`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tgsync_sync::Syncer;
use tracing::warn;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub syncer: Arc<Syncer>,
}

/// Build the daemon router.
pub fn build_router(syncer: Arc<Syncer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trigger", get(trigger))
        .with_state(ApiState { syncer })
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// GET /trigger: run one sync pass and report its outcome.
async fn trigger(State(state): State<ApiState>) -> impl IntoResponse {
    match state.syncer.sync().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!(error = %e, "triggered sync failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Build the debug router over a pre-redacted configuration snapshot.
pub fn build_debug_router(config: serde_json::Value) -> Router {
    Router::new().route(
        "/debug/config",
        get(move || {
            let config = config.clone();
            async move { Json(config) }
        }),
    )
}
