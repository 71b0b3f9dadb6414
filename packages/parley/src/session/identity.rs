//! Identity manager: username claims per connection.

use tracing::{debug, info};

use super::{ChatState, ConnectionId, Identity};
use crate::error::SessionError;

/// What a successful `set_username` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The connection was not logged in before.
    LoggedIn,
    /// The connection was already logged in and its username was overwritten.
    Renamed { previous: String },
}

impl ChatState {
    /// Record or overwrite the username for a connection.
    ///
    /// With the default policy any non-empty username is accepted verbatim,
    /// whitespace and duplicates across connections included, and a second
    /// claim silently overwrites the first. Fails with `UnknownConnection` when the connection was
    /// unregistered concurrently.
    pub async fn set_username(
        &self,
        id: ConnectionId,
        username: &str,
    ) -> Result<LoginOutcome, SessionError> {
        if username.is_empty() {
            return Err(SessionError::InvalidUsername);
        }

        let mut guard = self.table.lock().await;
        let table = &mut *guard;

        let already_logged_in = match table.connections.get(&id) {
            Some(entry) => entry.is_logged_in(),
            None => return Err(SessionError::UnknownConnection(id)),
        };
        if already_logged_in && !self.policy.allow_rename {
            return Err(SessionError::AlreadyLoggedIn(id));
        }
        if self.policy.unique_usernames {
            let taken = table.connections.iter().any(|(other, entry)| {
                *other != id
                    && entry
                        .identity
                        .as_ref()
                        .is_some_and(|i| i.username == username)
            });
            if taken {
                return Err(SessionError::UsernameTaken {
                    username: username.to_string(),
                });
            }
        }

        let login_seq = table.next_login_seq;
        let entry = table
            .connections
            .get_mut(&id)
            .ok_or(SessionError::UnknownConnection(id))?;

        let outcome = match entry.identity.as_mut() {
            Some(identity) => {
                let previous = std::mem::replace(&mut identity.username, username.to_string());
                debug!(conn_id = %id, %previous, username, "Username overwritten");
                LoginOutcome::Renamed { previous }
            }
            None => {
                entry.identity = Some(Identity {
                    username: username.to_string(),
                    login_seq,
                });
                table.next_login_seq += 1;
                info!(conn_id = %id, username, "User logged in");
                LoginOutcome::LoggedIn
            }
        };
        self.metrics.login();
        Ok(outcome)
    }

    pub async fn is_logged_in(&self, id: ConnectionId) -> bool {
        self.table
            .lock()
            .await
            .connections
            .get(&id)
            .is_some_and(|entry| entry.is_logged_in())
    }

    pub async fn username_of(&self, id: ConnectionId) -> Option<String> {
        self.table
            .lock()
            .await
            .connections
            .get(&id)
            .and_then(|entry| entry.identity.as_ref())
            .map(|identity| identity.username.clone())
    }

    /// Drop the identity mapping for a connection, leaving the connection
    /// itself registered. Returns the username that was cleared.
    pub async fn remove(&self, id: ConnectionId) -> Option<String> {
        let mut table = self.table.lock().await;
        let identity = table.connections.get_mut(&id)?.identity.take()?;
        debug!(conn_id = %id, username = %identity.username, "Identity removed");
        Some(identity.username)
    }
}
