//! WebSocket Protocol Types
//!
//! JSON frames exchanged over the chat socket, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::error::Rejection;
use crate::session::ConnectionId;

/// A chat message as delivered to peers. Never mutated after routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    /// Username captured by the sender at send time.
    pub sender: String,
    /// Tag naming the sending connection. Not used for delivery.
    pub id: String,
    /// Milliseconds since the Unix epoch, normally assigned by the sender.
    pub timestamp: i64,
}

/// Inbound `sendmessage` payload. Only `text` is required; missing fields are
/// filled in by the router from what the server knows about the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl MessageDraft {
    pub fn into_message(self, username: &str, conn_id: ConnectionId, now_ms: i64) -> ChatMessage {
        ChatMessage {
            text: self.text,
            sender: self.sender.unwrap_or_else(|| username.to_string()),
            id: self.id.unwrap_or_else(|| conn_id.to_string()),
            timestamp: self.timestamp.unwrap_or(now_ms),
        }
    }
}

impl From<ChatMessage> for MessageDraft {
    fn from(msg: ChatMessage) -> Self {
        Self {
            text: msg.text,
            sender: Some(msg.sender),
            id: Some(msg.id),
            timestamp: Some(msg.timestamp),
        }
    }
}

/// One entry of the online-users view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub id: ConnectionId,
    pub username: String,
}

/// Body of `GET /online-users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    #[serde(rename = "onlineUsers")]
    pub online_users: Vec<OnlineUser>,
}

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Claim (or overwrite) this connection's username.
    #[serde(rename = "setUsername")]
    SetUsername { username: String },

    /// Broadcast a chat message to every other connection.
    #[serde(rename = "sendmessage")]
    SendMessage(MessageDraft),
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First frame on every connection: the identifier assigned to it.
    #[serde(rename = "connected")]
    Connected { id: ConnectionId },

    /// The username claim was accepted.
    #[serde(rename = "loggedin")]
    LoggedIn,

    /// The username claim was refused by identity policy.
    #[serde(rename = "loginrejected")]
    LoginRejected(Rejection),

    /// Presence changed; clients re-fetch `/online-users`.
    #[serde(rename = "newConnection")]
    NewConnection,

    /// A chat message from another connection.
    #[serde(rename = "message")]
    Message(ChatMessage),
}
