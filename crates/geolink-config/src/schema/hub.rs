//! Hub connection and reconnect configuration types.

use serde::{Deserialize, Serialize};

/// Streaming transport names accepted in `hub.transports`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportName {
    WebSockets,
    ServerSentEvents,
    LongPolling,
}

/// Remote hub connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub endpoint URL (the negotiate probe goes to `<url>/negotiate`).
    pub url: String,
    /// Timeout for the negotiate probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Timeout for transport connect + handshake, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest a single outbound write may take before the connection
    /// counts as dropped, in milliseconds.
    pub send_timeout_ms: u64,
    /// Interval between keep-alive pings while connected, in milliseconds.
    pub keepalive_interval_ms: u64,
    /// Silence from the server after which the connection counts as dropped.
    pub server_timeout_ms: u64,
    /// Allowed transports, richest first.
    pub transports: Vec<TransportName>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: "https://tech-test.raintor.com/Hub".into(),
            probe_timeout_ms: 15_000,
            connect_timeout_ms: 15_000,
            send_timeout_ms: 15_000,
            keepalive_interval_ms: 15_000,
            server_timeout_ms: 30_000,
            transports: vec![
                TransportName::WebSockets,
                TransportName::ServerSentEvents,
                TransportName::LongPolling,
            ],
        }
    }
}

/// Automatic reconnect policy after an unexpected drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Attempts before giving up (valid range: 0-20).
    pub max_attempts: u32,
    /// Lower bound of the random delay, inclusive.
    pub min_delay_ms: u64,
    /// Upper bound of the random delay, exclusive.
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_ms: 2_000,
            max_delay_ms: 12_000,
        }
    }
}
