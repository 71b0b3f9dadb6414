use crate::AppState;
use crate::config::{IdentityPolicy, ServerConfig};

/// Build an `AppState` with default configuration. The chat core and the
/// HTTP handlers share one metrics instance, as they do in the server.
pub fn test_app_state() -> AppState {
    AppState::new(ServerConfig::default(), IdentityPolicy::default())
}
