use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Chat WebSocket handler - one socket per client
pub async fn chat_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let chat = state.chat.clone();
    let server_config = state.server_config.clone();

    ws.on_upgrade(move |socket| ws::handle_chat_ws(socket, chat, server_config))
}
