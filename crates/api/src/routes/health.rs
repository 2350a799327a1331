//! Health endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::app::AppState;

/// Basic health check.
///
/// GET /api/health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe. Always succeeds while the process is running.
///
/// GET /api/health/live
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe. Verifies the database is reachable.
///
/// GET /api/health/ready
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match persistence::db::ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable"})),
            )
        }
    }
}
