//! Presence tracking and location sharing configuration types.

use serde::{Deserialize, Serialize};

/// Peer expiry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// A peer with no event for this long is dropped from the live set.
    pub expiry_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { expiry_ms: 30_000 }
    }
}

/// Outbound location sharing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Interval between outbound samples.
    pub interval_ms: u64,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self { interval_ms: 2_000 }
    }
}
