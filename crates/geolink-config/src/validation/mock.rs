//! Validation for mock mode, presence expiry and sharing intervals.

use crate::schema::GeolinkConfig;

use super::helpers::{validate_nonzero, validate_range_f64};

/// Validate the mock generator settings.
pub(crate) fn validate_mock(errors: &mut Vec<String>, config: &GeolinkConfig) {
    let mock = &config.mock;
    if mock.peer_id.trim().is_empty() {
        errors.push("mock.peer_id must not be empty".into());
    }
    validate_range_f64(errors, "mock.reference_lat", mock.reference_lat, -90.0, 90.0);
    validate_range_f64(errors, "mock.reference_lon", mock.reference_lon, -180.0, 180.0);
    validate_range_f64(errors, "mock.jitter", mock.jitter, 0.0, 1.0);
}

/// Validate the remaining timer settings.
pub(crate) fn validate_timers(errors: &mut Vec<String>, config: &GeolinkConfig) {
    validate_nonzero(errors, "mock.interval_ms", config.mock.interval_ms);
    validate_nonzero(errors, "presence.expiry_ms", config.presence.expiry_ms);
    validate_nonzero(errors, "sharing.interval_ms", config.sharing.interval_ms);
}
