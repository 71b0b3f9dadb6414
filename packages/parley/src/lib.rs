//! Parley: a small real-time chat server.
//!
//! Clients hold one WebSocket each, claim a username, and exchange messages
//! with everyone else connected. Presence changes are pushed as bare
//! notifications; clients pull the actual list from `GET /online-users`.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod session;
pub mod ws;

#[cfg(test)]
mod test_helpers;

use crate::config::{IdentityPolicy, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::session::ChatState;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    /// Session core: registry, identities, presence and routing
    pub chat: Arc<ChatState>,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    pub fn new(server_config: ServerConfig, policy: IdentityPolicy) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        Self {
            chat: Arc::new(ChatState::new(policy, metrics.clone())),
            server_config: Arc::new(server_config),
            metrics,
        }
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// All HTTP and WebSocket routes with tracing and CORS applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::chat_websocket_handler))
        .route("/online-users", get(handlers::online_users_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `state` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
