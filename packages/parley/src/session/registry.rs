//! Connection registry: live transport sessions and their identifiers.

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::{ChatState, ConnectionEntry, ConnectionId, Outbound};
use crate::ws::ServerMessage;

impl ChatState {
    /// Register a freshly accepted connection and bind its outbound queue.
    /// The connection is immediately part of the broadcast fan-out set.
    ///
    /// A `connected` greeting carrying the new id is queued before the entry
    /// becomes visible, so it is always the first frame the peer receives.
    pub async fn register(&self, outbound: Outbound) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut table = self.table.lock().await;
        if outbound.try_send(ServerMessage::Connected { id }).is_err() {
            warn!(conn_id = %id, "Could not queue greeting");
        }
        table.connections.insert(
            id,
            ConnectionEntry {
                outbound,
                identity: None,
            },
        );
        debug!(conn_id = %id, live = table.connections.len(), "Connection registered");
        id
    }

    /// Remove a connection together with any identity it still holds.
    ///
    /// Idempotent: unregistering an unknown id is a no-op. Returns the
    /// username the connection was logged in under, if any.
    pub async fn unregister(&self, id: ConnectionId) -> Option<String> {
        let mut table = self.table.lock().await;
        let removed = table.connections.remove(&id)?;
        debug!(conn_id = %id, live = table.connections.len(), "Connection unregistered");
        removed.identity.map(|i| i.username)
    }

    /// Every live connection, ordered by identifier.
    pub async fn list(&self) -> Vec<ConnectionId> {
        let table = self.table.lock().await;
        let mut ids: Vec<ConnectionId> = table.connections.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn is_registered(&self, id: ConnectionId) -> bool {
        self.table.lock().await.connections.contains_key(&id)
    }
}
