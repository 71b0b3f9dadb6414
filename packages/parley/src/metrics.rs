//! Server metrics for observability
//!
//! Counters for connections, logins, routed messages and per-peer deliveries.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open chat sockets
    pub active_connections: AtomicU64,
    /// Total chat sockets since server start
    pub total_connections: AtomicU64,
    /// Sockets that ended without a close handshake
    pub abrupt_closes: AtomicU64,

    // Identity metrics
    /// Accepted username claims, renames included
    pub logins_accepted: AtomicU64,
    /// Claims refused by identity policy
    pub logins_rejected: AtomicU64,

    // Message metrics
    /// `sendmessage` frames received
    pub messages_received: AtomicU64,
    /// Messages fanned out to peers
    pub messages_routed: AtomicU64,
    /// Messages dropped because the sender had not logged in
    pub messages_unauthenticated: AtomicU64,

    // Delivery metrics
    /// Events accepted into a peer's outbound queue
    pub deliveries_enqueued: AtomicU64,
    /// Events lost to a full outbound queue
    pub deliveries_dropped: AtomicU64,
    /// Frames written to sockets
    pub frames_sent: AtomicU64,
    /// Presence-changed broadcasts
    pub presence_notifications: AtomicU64,

    // Error metrics
    /// Inbound frames that did not parse as a client message
    pub malformed_frames: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_dropped(&self) {
        self.abrupt_closes.fetch_add(1, Ordering::Relaxed);
    }

    // Identity tracking
    pub fn login(&self) {
        self.logins_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_rejected(&self) {
        self.logins_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_routed(&self) {
        self.messages_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_unauthenticated(&self) {
        self.messages_unauthenticated.fetch_add(1, Ordering::Relaxed);
    }

    // Delivery tracking
    pub fn deliveries(&self, n: u64) {
        self.deliveries_enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn delivery_dropped(&self) {
        self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn presence_notification(&self) {
        self.presence_notifications.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                abrupt_closes: self.abrupt_closes.load(Ordering::Relaxed),
            },
            logins: LoginMetrics {
                accepted: self.logins_accepted.load(Ordering::Relaxed),
                rejected: self.logins_rejected.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                routed: self.messages_routed.load(Ordering::Relaxed),
                unauthenticated: self.messages_unauthenticated.load(Ordering::Relaxed),
            },
            deliveries: DeliveryMetrics {
                enqueued: self.deliveries_enqueued.load(Ordering::Relaxed),
                dropped: self.deliveries_dropped.load(Ordering::Relaxed),
                frames_sent: self.frames_sent.load(Ordering::Relaxed),
                presence_notifications: self.presence_notifications.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub logins: LoginMetrics,
    pub messages: MessageMetrics,
    pub deliveries: DeliveryMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub abrupt_closes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginMetrics {
    pub accepted: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub routed: u64,
    pub unauthenticated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    pub enqueued: u64,
    pub dropped: u64,
    pub frames_sent: u64,
    pub presence_notifications: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub malformed_frames: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub online_users: u64,
    pub uptime_secs: u64,
}
