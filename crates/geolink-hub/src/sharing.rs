//! Periodic publishing of our own location through a session.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mock::{jittered, MockConfig};
use crate::session::HubSession;
use crate::ticker::delayed_ticker;

#[derive(Debug, Clone, PartialEq)]
pub struct SharingConfig {
    pub interval: Duration,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SharingError {
    #[error("peer id must not be empty")]
    EmptyPeerId,
}

/// Where outgoing samples come from.
#[async_trait]
pub trait LocationSource: Send + 'static {
    /// Current `(lat, lon)`, or `None` if no fix is available right now.
    async fn current(&mut self) -> Option<(f64, f64)>;
}

/// Positions jittered around a fixed reference point.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    pub reference_lat: f64,
    pub reference_lon: f64,
    pub jitter: f64,
}

impl SimulatedSource {
    pub fn around(mock: &MockConfig) -> Self {
        Self {
            reference_lat: mock.reference_lat,
            reference_lon: mock.reference_lon,
            jitter: mock.jitter,
        }
    }

    fn sample(&self) -> (f64, f64) {
        let mut rng = rand::thread_rng();
        (
            jittered(&mut rng, self.reference_lat, self.jitter),
            jittered(&mut rng, self.reference_lon, self.jitter),
        )
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::around(&MockConfig::default())
    }
}

#[async_trait]
impl LocationSource for SimulatedSource {
    async fn current(&mut self) -> Option<(f64, f64)> {
        Some(self.sample())
    }
}

/// Counters reported when a sharer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharingStats {
    pub sent: u64,
    pub failed: u64,
    /// Ticks skipped because the session was not connected.
    pub skipped: u64,
}

/// Sends one sample per interval while the session is connected.
pub struct LocationSharer {
    token: CancellationToken,
    task: JoinHandle<SharingStats>,
}

impl LocationSharer {
    pub fn start(
        session: HubSession,
        peer_id: &str,
        source: Box<dyn LocationSource>,
        config: SharingConfig,
    ) -> Result<Self, SharingError> {
        let peer_id = peer_id.trim().to_string();
        if peer_id.is_empty() {
            return Err(SharingError::EmptyPeerId);
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(share_loop(
            session,
            peer_id,
            source,
            config.interval,
            token.clone(),
        ));
        Ok(Self { token, task })
    }

    /// Token that stops this sharer when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn stop(self) -> SharingStats {
        self.token.cancel();
        self.task.await.unwrap_or_default()
    }
}

async fn share_loop(
    session: HubSession,
    peer_id: String,
    mut source: Box<dyn LocationSource>,
    period: Duration,
    token: CancellationToken,
) -> SharingStats {
    let mut stats = SharingStats::default();
    let mut ticker = delayed_ticker("sharing", period);
    info!(peer = %peer_id, interval_ms = period.as_millis() as u64, "location sharing started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !session.is_connected() {
            debug!(peer = %peer_id, state = %session.state(), "not connected, skipping sample");
            stats.skipped += 1;
            continue;
        }
        let Some((lat, lon)) = source.current().await else {
            debug!(peer = %peer_id, "no position fix");
            continue;
        };

        tokio::select! {
            _ = token.cancelled() => break,
            result = session.send(lat, lon, &peer_id) => match result {
                Ok(()) => {
                    debug!(peer = %peer_id, lat, lon, "location shared");
                    stats.sent += 1;
                }
                Err(e) => {
                    warn!(peer = %peer_id, error = %e, "failed to share location");
                    stats.failed += 1;
                }
            }
        }
    }

    info!(peer = %peer_id, sent = stats.sent, failed = stats.failed, "location sharing stopped");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::error::HubError;
    use crate::session::HubConfig;
    use crate::transport::{HubLink, HubTransport, Negotiation};
    use std::sync::Arc;
    use tokio::time::sleep;

    struct Offline;

    #[async_trait]
    impl HubTransport for Offline {
        async fn negotiate(&self, endpoint: &Endpoint) -> Result<Negotiation, HubError> {
            Err(HubError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: "offline".into(),
            })
        }

        async fn connect(&self, _negotiation: &Negotiation) -> Result<HubLink, HubError> {
            Err(HubError::NegotiationFailed("offline".into()))
        }
    }

    struct Fixed(f64, f64);

    #[async_trait]
    impl LocationSource for Fixed {
        async fn current(&mut self) -> Option<(f64, f64)> {
            Some((self.0, self.1))
        }
    }

    fn session(mock: bool) -> HubSession {
        let config = HubConfig {
            start_in_mock_mode: mock,
            ..HubConfig::default()
        };
        HubSession::open("https://hub.test/Hub", config, Arc::new(Offline))
    }

    #[tokio::test]
    async fn empty_peer_id_is_rejected() {
        let result = LocationSharer::start(
            session(true),
            "   ",
            Box::new(SimulatedSource::default()),
            SharingConfig::default(),
        );
        assert_eq!(result.err(), Some(SharingError::EmptyPeerId));
    }

    #[tokio::test(start_paused = true)]
    async fn shares_once_per_interval_while_connected() {
        let sharer = LocationSharer::start(
            session(true),
            "a@x.com",
            Box::new(Fixed(1.0, 2.0)),
            SharingConfig::default(),
        )
        .unwrap();

        sleep(Duration::from_millis(6001)).await;
        let stats = sharer.stop().await;
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_samples_while_not_connected() {
        // Unreachable hub without mock: Failed until the 2s fallback.
        let sharer = LocationSharer::start(
            session(false),
            "a@x.com",
            Box::new(SimulatedSource::default()),
            SharingConfig {
                interval: Duration::from_millis(500),
            },
        )
        .unwrap();

        sleep(Duration::from_millis(1900)).await;
        let stats = sharer.stop().await;
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.skipped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let sharer = LocationSharer::start(
            session(true),
            "a@x.com",
            Box::new(Fixed(1.0, 2.0)),
            SharingConfig {
                interval: Duration::ZERO,
            },
        )
        .unwrap();

        sleep(Duration::from_millis(100)).await;
        let stats = sharer.stop().await;
        assert!(stats.sent >= 1, "{stats:?}");
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_token_stops_sharing() {
        let sharer = LocationSharer::start(
            session(true),
            "a@x.com",
            Box::new(SimulatedSource::default()),
            SharingConfig::default(),
        )
        .unwrap();
        sharer.token().cancel();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(sharer.stop().await, SharingStats::default());
    }

    #[test]
    fn simulated_positions_stay_near_reference() {
        let source = SimulatedSource::default();
        for _ in 0..100 {
            let (lat, lon) = source.sample();
            assert!((lat - source.reference_lat).abs() <= source.jitter / 2.0);
            assert!((lon - source.reference_lon).abs() <= source.jitter / 2.0);
        }
    }
}
