//! Error taxonomy for the session core.

use serde::{Deserialize, Serialize};

use crate::session::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The connection was unregistered before (or while) the operation ran.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} has not logged in")]
    NotLoggedIn(ConnectionId),

    #[error("username must not be empty")]
    InvalidUsername,

    #[error("connection {0} is already logged in")]
    AlreadyLoggedIn(ConnectionId),

    #[error("username {username:?} is already taken")]
    UsernameTaken { username: String },
}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownConnection(_) => "unknown_connection",
            Self::NotLoggedIn(_) => "not_logged_in",
            Self::InvalidUsername => "invalid_username",
            Self::AlreadyLoggedIn(_) => "already_logged_in",
            Self::UsernameTaken { .. } => "username_taken",
        }
    }

    /// Whether the requesting client should be told about this failure.
    ///
    /// Races with disconnect and unauthenticated sends are absorbed silently;
    /// only login policy rejections produce an outbound event.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidUsername | Self::AlreadyLoggedIn(_) | Self::UsernameTaken { .. }
        )
    }
}

/// Serializable rejection reason carried by the `loginrejected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
    pub message: String,
}

impl From<&SessionError> for Rejection {
    fn from(err: &SessionError) -> Self {
        Self {
            reason: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(
            SessionError::UnknownConnection(ConnectionId(3)).error_code(),
            "unknown_connection"
        );
        assert_eq!(SessionError::InvalidUsername.error_code(), "invalid_username");
        assert_eq!(
            SessionError::UsernameTaken {
                username: "alice".into()
            }
            .error_code(),
            "username_taken"
        );
    }

    #[test]
    fn only_policy_rejections_are_visible() {
        assert!(SessionError::InvalidUsername.is_client_visible());
        assert!(SessionError::AlreadyLoggedIn(ConnectionId(1)).is_client_visible());
        assert!(!SessionError::NotLoggedIn(ConnectionId(1)).is_client_visible());
        assert!(!SessionError::UnknownConnection(ConnectionId(1)).is_client_visible());
    }

    #[test]
    fn rejection_from_error() {
        let err = SessionError::UsernameTaken {
            username: "bob".into(),
        };
        let rejection = Rejection::from(&err);
        assert_eq!(rejection.reason, "username_taken");
        assert!(rejection.message.contains("bob"));
    }

    #[test]
    fn display_includes_connection_id() {
        let err = SessionError::NotLoggedIn(ConnectionId(42));
        assert_eq!(err.to_string(), "connection conn-42 has not logged in");
    }
}
