//! Presence tracker: a read-through view over identities.
//!
//! Nothing is cached here. The online list is recomputed from the session
//! table on every call, so it can never disagree with identity state.

use tracing::debug;

use super::{ChatState, ConnectionId, Delivery, fan_out};
use crate::ws::{OnlineUser, ServerMessage};

impl ChatState {
    /// Snapshot of every logged-in connection, in login order.
    pub async fn online_users(&self) -> Vec<OnlineUser> {
        let table = self.table.lock().await;
        let mut users: Vec<(u64, OnlineUser)> = table
            .connections
            .iter()
            .filter_map(|(id, entry)| {
                entry.identity.as_ref().map(|identity| {
                    (
                        identity.login_seq,
                        OnlineUser {
                            id: *id,
                            username: identity.username.clone(),
                        },
                    )
                })
            })
            .collect();
        users.sort_by_key(|(seq, _)| *seq);
        users.into_iter().map(|(_, user)| user).collect()
    }

    /// Push a presence-changed event to every logged-in connection except
    /// `exclude`.
    pub async fn notify_presence_changed(&self, exclude: Option<ConnectionId>) -> Delivery {
        let table = self.table.lock().await;
        let delivery = fan_out(
            &table,
            &self.metrics,
            &ServerMessage::NewConnection,
            |id, entry| entry.is_logged_in() && Some(id) != exclude,
        );
        self.metrics.presence_notification();
        debug!(
            excluded = ?exclude,
            delivered = delivery.delivered,
            "Presence change broadcast"
        );
        delivery
    }
}
