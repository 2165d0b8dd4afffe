//! Session state, observable status and tuning knobs.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::SendError;
use crate::mock::MockConfig;
use crate::protocol::LocationEvent;
use crate::transport::TransportKind;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle of one logical hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    TestingEndpoint,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Failed,
    MockActive,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::TestingEndpoint => "Testing endpoint...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Failed => "Failed",
            ConnectionState::MockActive => "Connected (Mock)",
        };
        f.write_str(label)
    }
}

/// Snapshot of everything a caller may observe about a session.
///
/// Published as a whole, so `state` and `last_error` always change together.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub mock_mode: bool,
    /// Transport carrying the live link, if any.
    pub transport: Option<TransportKind>,
    /// 1-based number of the reconnect attempt in progress, 0 otherwise.
    pub reconnect_attempt: u32,
}

impl SessionStatus {
    pub(crate) fn new(state: ConnectionState, mock_mode: bool) -> Self {
        Self {
            state,
            last_error: None,
            mock_mode,
            transport: None,
            reconnect_attempt: 0,
        }
    }

    /// True only while events can flow: `Connected` or `MockActive`.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::MockActive
        )
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounded automatic reconnect after an unexpected drop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    /// Exclusive upper bound of the random delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(12000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (0-based), or `None` once the retry
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        self.delay_for_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_for_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        if self.max_delay <= self.min_delay {
            return Some(self.min_delay);
        }
        Some(rng.gen_range(self.min_delay..self.max_delay))
    }
}

/// Everything a session needs besides the endpoint and transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest one outbound write may stall before the link counts as lost.
    pub send_timeout: Duration,
    /// Interval between client pings while connected.
    pub keepalive_interval: Duration,
    /// Silence from the server after which the link counts as dropped.
    pub server_timeout: Duration,
    /// Allowed transports, in preference order.
    pub transports: Vec<TransportKind>,
    pub reconnect: ReconnectPolicy,
    pub mock: MockConfig,
    /// Start with mock mode enabled instead of probing the hub.
    pub start_in_mock_mode: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(15),
            send_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            transports: TransportKind::ALL.to_vec(),
            reconnect: ReconnectPolicy::default(),
            mock: MockConfig::default(),
            start_in_mock_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands (handle → actor)
// ---------------------------------------------------------------------------

/// Identifies one registered location callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

#[derive(Debug)]
pub(crate) enum Command {
    Send {
        event: LocationEvent,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    SetMockMode(bool),
    ToggleMockMode,
    Close {
        reply: oneshot::Sender<()>,
    },
}
