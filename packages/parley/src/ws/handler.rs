//! WebSocket Handler
//!
//! Chat socket lifecycle: register, pump frames both ways, clean up.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::session::ChatState;

use super::dispatch::{ConnectionContext, disconnect_cleanup, dispatch_client_message};
use super::protocol::{ClientMessage, ServerMessage};

/// Handle one chat WebSocket connection until either side goes away.
pub async fn handle_chat_ws(
    socket: WebSocket,
    state: Arc<ChatState>,
    server_config: Arc<ServerConfig>,
) {
    let metrics = state.metrics().clone();
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Ordered outbound queue; the greeting is already in it once registered.
    let (tx, mut rx) =
        mpsc::channel::<ServerMessage>(server_config.websocket.send_channel_capacity);
    let connection_id = state.register(tx.clone()).await;
    info!(conn_id = %connection_id, "New chat connection");

    let ctx = ConnectionContext::new(connection_id, tx, state.clone());

    // Task to send messages to WebSocket
    let metrics_send = metrics.clone();
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                // Peer went away; the input side records how.
                debug!(conn_id = %connection_id, "Socket write failed: {}", e);
                break;
            }
            metrics_send.frame_sent();
        }
    };

    // Task to handle incoming messages
    let metrics_input = metrics.clone();
    let ctx_ref = &ctx;
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => dispatch_client_message(ctx_ref, client_msg).await,
                    Err(e) => {
                        metrics_input.malformed_frame();
                        debug!(conn_id = %connection_id, "Ignoring unparseable frame: {}", e);
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    // Reset or missing close handshake: the client left.
                    debug!(conn_id = %connection_id, "Connection ended without close: {}", e);
                    metrics_input.connection_dropped();
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(conn_id = %connection_id, "Sender task ended"),
        _ = input_task => debug!(conn_id = %connection_id, "Input task ended"),
    }

    disconnect_cleanup(&ctx).await;
    metrics.connection_closed();
    info!(conn_id = %connection_id, "Chat connection closed");
}
