//! Chat WebSocket
//!
//! One socket per client carrying JSON events both ways:
//! - inbound `setUsername` / `sendmessage`
//! - outbound greeting, login results, presence pings and chat messages

pub(crate) mod dispatch;
mod handler;
mod protocol;

pub use dispatch::{ConnectionContext, ConnectionPhase, disconnect_cleanup, dispatch_client_message};
pub use handler::handle_chat_ws;
pub use protocol::{
    ChatMessage, ClientMessage, MessageDraft, OnlineUser, OnlineUsersResponse, ServerMessage,
};
