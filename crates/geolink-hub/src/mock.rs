//! Synthetic location source used when the hub is unavailable or the caller
//! asks for mock mode.

use std::time::Duration;

use rand::Rng;

use crate::protocol::LocationEvent;

/// Reserved identity for synthesized events.
pub const MOCK_PEER_ID: &str = "mock.user@example.com";

#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    /// Delay between a failed probe/connect and switching to mock mode.
    pub fallback_delay: Duration,
    /// Cadence of synthesized events.
    pub interval: Duration,
    pub peer_id: String,
    pub reference_lat: f64,
    pub reference_lon: f64,
    /// Full width of the jitter box around the reference point, in degrees.
    pub jitter: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fallback_delay: Duration::from_millis(2000),
            interval: Duration::from_millis(3000),
            peer_id: MOCK_PEER_ID.to_string(),
            reference_lat: 25.73736464,
            reference_lon: 90.3644747,
            jitter: 0.01,
        }
    }
}

/// `reference + (u - 0.5) * jitter` for `u` uniform in `[0, 1)`.
pub fn jittered<R: Rng + ?Sized>(rng: &mut R, reference: f64, jitter: f64) -> f64 {
    reference + (rng.gen::<f64>() - 0.5) * jitter
}

impl MockConfig {
    /// One synthesized event for the reserved peer.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> LocationEvent {
        LocationEvent::new(
            self.peer_id.clone(),
            jittered(rng, self.reference_lat, self.jitter),
            jittered(rng, self.reference_lon, self.jitter),
        )
    }

    pub fn sample(&self) -> LocationEvent {
        self.sample_with(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_inside_the_jitter_box() {
        let config = MockConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let event = config.sample_with(&mut rng);
            assert_eq!(event.peer_id, MOCK_PEER_ID);
            assert!((event.lat - config.reference_lat).abs() <= 0.005);
            assert!((event.lon - config.reference_lon).abs() <= 0.005);
        }
    }

    #[test]
    fn zero_jitter_returns_reference_point() {
        let config = MockConfig {
            jitter: 0.0,
            ..MockConfig::default()
        };
        let event = config.sample();
        assert_eq!(event.lat, config.reference_lat);
        assert_eq!(event.lon, config.reference_lon);
    }
}
