//! Delayed periodic tickers shared by the session and the sharer.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::warn;

/// Shortest period a ticker will run at.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Ticker whose first tick lands one period from now. Periods below
/// [`MIN_PERIOD`] are raised to it.
pub(crate) fn delayed_ticker(name: &'static str, period: Duration) -> Interval {
    let period = if period < MIN_PERIOD {
        warn!(
            ticker = name,
            requested_ms = period.as_millis() as u64,
            min_ms = MIN_PERIOD.as_millis() as u64,
            "period too short, clamping"
        );
        MIN_PERIOD
    } else {
        period
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped() {
        let mut ticker = delayed_ticker("test", Duration::ZERO);
        assert_eq!(ticker.period(), MIN_PERIOD);

        let start = Instant::now();
        ticker.tick().await;
        assert_eq!(start.elapsed(), MIN_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_away() {
        let mut ticker = delayed_ticker("test", Duration::from_secs(3));
        let start = Instant::now();
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
