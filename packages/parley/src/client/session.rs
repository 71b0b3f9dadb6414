//! Client-side chat session state.
//!
//! Pure state with no I/O: the transport feeds server events into
//! [`ChatSession::apply`] and sends whatever frames the session hands back.
//! One session per connection; nothing here is global.

use crate::error::Rejection;
use crate::session::ConnectionId;
use crate::ws::{ChatMessage, ClientMessage, MessageDraft, OnlineUser, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket opened, greeting not seen yet.
    Connecting,
    /// Greeted; username not yet accepted.
    Connected,
    LoggedIn,
    Disconnected,
}

/// Follow-up work a server event asks of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Presence changed; re-fetch the online-users list.
    RefreshPresence,
    /// The username claim was refused.
    LoginRejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("log in before sending messages")]
    NotLoggedIn,

    #[error("connection closed")]
    Disconnected,

    #[error("message is empty")]
    EmptyText,

    #[error("username must not be empty")]
    EmptyUsername,
}

#[derive(Debug)]
pub struct ChatSession {
    phase: SessionPhase,
    connection_id: Option<ConnectionId>,
    /// Name sent in the last `setUsername`, awaiting confirmation.
    pending_username: Option<String>,
    username: Option<String>,
    messages: Vec<ChatMessage>,
    online_users: Vec<OnlineUser>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
            connection_id: None,
            pending_username: None,
            username: None,
            messages: Vec::new(),
            online_users: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Local transcript, own messages included, in display order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn online_users(&self) -> &[OnlineUser] {
        &self.online_users
    }

    pub fn set_online_users(&mut self, users: Vec<OnlineUser>) {
        self.online_users = users;
    }

    /// Handle one server event.
    pub fn apply(&mut self, event: ServerMessage) -> Option<SessionEffect> {
        if self.phase == SessionPhase::Disconnected {
            return None;
        }
        match event {
            ServerMessage::Connected { id } => {
                self.connection_id = Some(id);
                if self.phase == SessionPhase::Connecting {
                    self.phase = SessionPhase::Connected;
                }
                None
            }
            ServerMessage::LoggedIn => {
                if let Some(name) = self.pending_username.take() {
                    self.username = Some(name);
                }
                self.phase = SessionPhase::LoggedIn;
                Some(SessionEffect::RefreshPresence)
            }
            ServerMessage::LoginRejected(rejection) => {
                self.pending_username = None;
                Some(SessionEffect::LoginRejected(rejection))
            }
            ServerMessage::NewConnection => Some(SessionEffect::RefreshPresence),
            ServerMessage::Message(msg) => {
                self.messages.push(msg);
                None
            }
        }
    }

    /// Build the `setUsername` frame for `username`.
    pub fn login(&mut self, username: &str) -> Result<ClientMessage, ComposeError> {
        if self.phase == SessionPhase::Disconnected {
            return Err(ComposeError::Disconnected);
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(ComposeError::EmptyUsername);
        }
        self.pending_username = Some(username.to_string());
        Ok(ClientMessage::SetUsername {
            username: username.to_string(),
        })
    }

    /// Append an outgoing message to the local transcript and build its
    /// `sendmessage` frame. The server does not echo messages back.
    pub fn compose(&mut self, text: &str, now_ms: i64) -> Result<ClientMessage, ComposeError> {
        match self.phase {
            SessionPhase::LoggedIn => {}
            SessionPhase::Disconnected => return Err(ComposeError::Disconnected),
            _ => return Err(ComposeError::NotLoggedIn),
        }
        if text.trim().is_empty() {
            return Err(ComposeError::EmptyText);
        }
        let msg = ChatMessage {
            text: text.to_string(),
            sender: self.username.clone().unwrap_or_default(),
            id: self
                .connection_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            timestamp: now_ms,
        };
        self.messages.push(msg.clone());
        Ok(ClientMessage::SendMessage(MessageDraft::from(msg)))
    }

    pub fn disconnected(&mut self) {
        self.phase = SessionPhase::Disconnected;
    }
}

/// One transcript line: `[HH:MM:SS] sender: text` (UTC).
pub fn format_message(msg: &ChatMessage) -> String {
    let time = chrono::DateTime::from_timestamp_millis(msg.timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    format!("[{}] {}: {}", time, msg.sender, msg.text)
}
