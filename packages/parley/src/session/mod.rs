//! Session core
//!
//! Connection registry, identity, presence and message routing over a single
//! shared table. Every mutation and every snapshot runs under one lock so that
//! presence and fan-out always observe a consistent view of who is online.
//!
//! Outbound events are pushed into each connection's ordered queue while the
//! lock is held. Pushing never waits (a full queue drops the event for that
//! peer), so a slow peer cannot stall logins or disconnects; the socket write
//! itself happens later in the connection's own sender task.

mod identity;
mod presence;
mod registry;
mod router;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::config::IdentityPolicy;
use crate::metrics::ServerMetrics;
use crate::ws::ServerMessage;

pub use identity::LoginOutcome;

/// Identifier of one live transport session. Allocated from a process-wide
/// counter, so an identifier is never handed out twice.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("conn-")
            .and_then(|n| n.parse().ok())
            .map(ConnectionId)
            .ok_or_else(|| format!("invalid connection id: {s:?}"))
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Sending half of a connection's ordered outbound queue.
pub type Outbound = mpsc::Sender<ServerMessage>;

/// Claimed identity of a logged-in connection.
#[derive(Debug)]
struct Identity {
    username: String,
    /// Position in login order; kept across renames.
    login_seq: u64,
}

/// One live connection.
struct ConnectionEntry {
    outbound: Outbound,
    identity: Option<Identity>,
}

impl ConnectionEntry {
    fn is_logged_in(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Default)]
struct SessionTable {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    next_login_seq: u64,
}

/// Result of pushing one event to a set of peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Peers whose queue accepted the event.
    pub delivered: usize,
    /// Peers whose queue was full; the event is lost for them.
    pub dropped: usize,
}

/// Shared state of every connection on this server.
pub struct ChatState {
    table: Mutex<SessionTable>,
    next_id: AtomicU64,
    policy: IdentityPolicy,
    metrics: Arc<ServerMetrics>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new(IdentityPolicy::default(), Arc::new(ServerMetrics::new()))
    }
}

impl ChatState {
    pub fn new(policy: IdentityPolicy, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            next_id: AtomicU64::new(1),
            policy,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }
}

/// Push `msg` to every entry accepted by `filter`. Must be called with the
/// table lock held so that every peer sees events in processing order.
fn fan_out<F>(
    table: &SessionTable,
    metrics: &ServerMetrics,
    msg: &ServerMessage,
    mut filter: F,
) -> Delivery
where
    F: FnMut(ConnectionId, &ConnectionEntry) -> bool,
{
    let mut delivery = Delivery::default();
    for (&conn_id, entry) in &table.connections {
        if !filter(conn_id, entry) {
            continue;
        }
        match entry.outbound.try_send(msg.clone()) {
            Ok(()) => delivery.delivered += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %conn_id, "Outbound queue full, dropping event");
                metrics.delivery_dropped();
                delivery.dropped += 1;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Peer is mid-disconnect; its cleanup will unregister it.
                debug!(conn_id = %conn_id, "Outbound queue closed, skipping");
            }
        }
    }
    metrics.deliveries(delivery.delivered as u64);
    delivery
}
