//! Terminal chat client.

mod connect;
mod session;

pub use connect::{ClientError, ServerEndpoints, connect_command, fetch_online_users};
pub use session::{ChatSession, ComposeError, SessionEffect, SessionPhase, format_message};
