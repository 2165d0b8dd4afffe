//! Live peer set built from inbound location events.
//!
//! Every peer gets one expiry timer; a fresh event replaces it. Records
//! vanish once a peer has been silent for the expiry window.

mod peer_set;
mod tracker;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

pub use tracker::PresenceTracker;

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceConfig {
    /// Silence after which a peer is dropped.
    pub expiry: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_millis(30_000),
        }
    }
}

/// Latest known position of one peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRecord {
    pub peer_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Monotonic receipt time; drives expiry.
    #[serde(skip)]
    pub last_seen_at: Instant,
    /// Wall-clock receipt time, for display.
    pub received_at: DateTime<Utc>,
}
