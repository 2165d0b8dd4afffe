//! Mock-mode configuration types.

use serde::{Deserialize, Serialize};

/// Synthetic event generator used when the hub is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Start in mock mode without touching the network.
    pub enabled: bool,
    /// Delay between a failed connect and the automatic switch to mock mode.
    pub fallback_delay_ms: u64,
    /// Interval between synthesized location events.
    pub interval_ms: u64,
    /// Reserved peer identity used for synthesized events.
    pub peer_id: String,
    pub reference_lat: f64,
    pub reference_lon: f64,
    /// Total jitter span in degrees (samples land within +/- jitter / 2).
    pub jitter: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fallback_delay_ms: 2_000,
            interval_ms: 3_000,
            peer_id: "mock.user@example.com".into(),
            reference_lat: 25.73736464,
            reference_lon: 90.3644747,
            jitter: 0.01,
        }
    }
}
