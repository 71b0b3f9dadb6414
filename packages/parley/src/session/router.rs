//! Message router: fan a chat message out from one logged-in sender.
//!
//! The sender is excluded from the fan-out. Its client appends the message to
//! its own view at send time instead of waiting for an echo.

use tracing::debug;

use super::{ChatState, ConnectionId, Delivery, fan_out};
use crate::error::SessionError;
use crate::ws::{MessageDraft, ServerMessage};

impl ChatState {
    /// Broadcast a message from `sender` to every other live connection.
    ///
    /// Dropped with `NotLoggedIn` when the sender has not claimed a username.
    /// Messages from one sender reach each peer in the order they were routed.
    pub async fn route(
        &self,
        sender: ConnectionId,
        draft: MessageDraft,
    ) -> Result<Delivery, SessionError> {
        let table = self.table.lock().await;

        let entry = table
            .connections
            .get(&sender)
            .ok_or(SessionError::UnknownConnection(sender))?;
        let Some(identity) = entry.identity.as_ref() else {
            self.metrics.message_unauthenticated();
            return Err(SessionError::NotLoggedIn(sender));
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        let message = draft.into_message(&identity.username, sender, now_ms);
        let delivery = fan_out(
            &table,
            &self.metrics,
            &ServerMessage::Message(message),
            |id, _| id != sender,
        );
        self.metrics.message_routed();
        debug!(
            conn_id = %sender,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Message routed"
        );
        Ok(delivery)
    }
}
