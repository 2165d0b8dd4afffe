//! Validation for the hub connection and reconnect sections.

use crate::schema::GeolinkConfig;

use super::helpers::{validate_nonzero, validate_range};

/// Validate hub endpoint, timeouts, and transport list.
pub(crate) fn validate_hub(errors: &mut Vec<String>, config: &GeolinkConfig) {
    let hub = &config.hub;
    let url = hub.url.trim();
    if url.is_empty() {
        errors.push("hub.url must not be empty".into());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("hub.url = {url} must use http or https"));
    }

    validate_nonzero(errors, "hub.probe_timeout_ms", hub.probe_timeout_ms);
    validate_nonzero(errors, "hub.connect_timeout_ms", hub.connect_timeout_ms);
    validate_nonzero(errors, "hub.send_timeout_ms", hub.send_timeout_ms);
    validate_nonzero(errors, "hub.keepalive_interval_ms", hub.keepalive_interval_ms);

    if hub.server_timeout_ms <= hub.keepalive_interval_ms {
        errors.push(format!(
            "hub.server_timeout_ms = {} must exceed hub.keepalive_interval_ms = {}",
            hub.server_timeout_ms, hub.keepalive_interval_ms
        ));
    }

    if hub.transports.is_empty() {
        errors.push("hub.transports must list at least one transport".into());
    }
}

/// Validate the reconnect policy.
pub(crate) fn validate_reconnect(errors: &mut Vec<String>, config: &GeolinkConfig) {
    let reconnect = &config.reconnect;
    validate_range(
        errors,
        "reconnect.max_attempts",
        u64::from(reconnect.max_attempts),
        0,
        20,
    );
    if reconnect.max_delay_ms <= reconnect.min_delay_ms {
        errors.push(format!(
            "reconnect.max_delay_ms = {} must exceed reconnect.min_delay_ms = {}",
            reconnect.max_delay_ms, reconnect.min_delay_ms
        ));
    }
}
