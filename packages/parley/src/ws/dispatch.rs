//! Protocol state machine for one connection.
//!
//! Maps inbound `ClientMessage`s onto the session core and its results onto
//! outbound events. Each connection's messages are dispatched one at a time
//! from its input task, which is what gives a single sender its in-order
//! delivery.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Rejection, SessionError};
use crate::session::{ChatState, ConnectionId, LoginOutcome, Outbound};

use super::protocol::{ClientMessage, MessageDraft, ServerMessage};

/// Lifecycle of a connection as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Registered, no username yet.
    Connected,
    /// Username claimed. Re-claiming stays here.
    LoggedIn,
    /// Terminal; cleanup has run.
    Disconnected,
}

/// Per-connection context shared between the transport and the dispatcher.
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    /// This connection's own outbound queue.
    pub tx: Outbound,
    pub state: Arc<ChatState>,
    phase: RwLock<ConnectionPhase>,
}

impl ConnectionContext {
    pub fn new(connection_id: ConnectionId, tx: Outbound, state: Arc<ChatState>) -> Self {
        Self {
            connection_id,
            tx,
            state,
            phase: RwLock::new(ConnectionPhase::Connected),
        }
    }

    pub async fn phase(&self) -> ConnectionPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: ConnectionPhase) {
        *self.phase.write().await = phase;
    }

    async fn send_self(&self, msg: ServerMessage) {
        if self.tx.send(msg).await.is_err() {
            debug!(conn_id = %self.connection_id, "Own queue closed, event dropped");
        }
    }
}

/// Dispatch a single `ClientMessage` for the connection in `ctx`.
pub async fn dispatch_client_message(ctx: &ConnectionContext, msg: ClientMessage) {
    if ctx.phase().await == ConnectionPhase::Disconnected {
        debug!(conn_id = %ctx.connection_id, "Ignoring message after disconnect");
        return;
    }
    match msg {
        ClientMessage::SetUsername { username } => handle_login(ctx, &username).await,
        ClientMessage::SendMessage(draft) => handle_send(ctx, draft).await,
    }
}

async fn handle_login(ctx: &ConnectionContext, username: &str) {
    let conn_id = ctx.connection_id;
    match ctx.state.set_username(conn_id, username).await {
        Ok(outcome) => {
            ctx.set_phase(ConnectionPhase::LoggedIn).await;
            if let LoginOutcome::Renamed { previous } = &outcome {
                info!(conn_id = %conn_id, %previous, username, "User renamed");
            }
            // Confirmation goes to this connection only; everyone else learns
            // about the change through the presence channel.
            // Queued after the table lock is released, so peer events fanned
            // out in between can reach this connection before its loggedin.
            ctx.send_self(ServerMessage::LoggedIn).await;
            ctx.state.notify_presence_changed(Some(conn_id)).await;
        }
        Err(e) if e.is_client_visible() => {
            warn!(conn_id = %conn_id, username, "Login rejected: {}", e);
            ctx.state.metrics().login_rejected();
            ctx.send_self(ServerMessage::LoginRejected(Rejection::from(&e)))
                .await;
        }
        Err(e) => {
            debug!(conn_id = %conn_id, "Login dropped: {}", e);
        }
    }
}

async fn handle_send(ctx: &ConnectionContext, draft: MessageDraft) {
    let conn_id = ctx.connection_id;
    ctx.state.metrics().message_received();
    match ctx.state.route(conn_id, draft).await {
        Ok(_) => {}
        Err(SessionError::NotLoggedIn(_)) => {
            debug!(conn_id = %conn_id, "Dropping message from connection that has not logged in");
        }
        Err(e) => {
            debug!(conn_id = %conn_id, "Message dropped: {}", e);
        }
    }
}

/// Release everything the connection holds and tell the remaining peers.
///
/// Safe to call more than once.
pub async fn disconnect_cleanup(ctx: &ConnectionContext) {
    let conn_id = ctx.connection_id;
    let cleared = ctx.state.remove(conn_id).await;
    ctx.state.unregister(conn_id).await;
    ctx.set_phase(ConnectionPhase::Disconnected).await;

    if let Some(username) = cleared {
        info!(conn_id = %conn_id, %username, "User left");
        ctx.state.notify_presence_changed(None).await;
    }
}
