use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
///
/// Lifetime counters such as dropped deliveries or abrupt closes are reported
/// by `/metrics` and do not affect the status.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let online = state.chat.online_users().await.len() as u64;
    let metrics = state.metrics.snapshot();

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        connections: metrics.connections.active,
        online_users: online,
        uptime_secs: metrics.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
