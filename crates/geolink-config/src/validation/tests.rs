//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    let config = GeolinkConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_empty_hub_url() {
    let mut config = GeolinkConfig::default();
    config.hub.url = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("hub.url"));
}

#[test]
fn catches_non_http_hub_url() {
    let mut config = GeolinkConfig::default();
    config.hub.url = "ftp://example.com/hub".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must use http or https"));
}

#[test]
fn catches_server_timeout_below_keepalive() {
    let mut config = GeolinkConfig::default();
    config.hub.server_timeout_ms = 10_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("hub.server_timeout_ms"));
}

#[test]
fn catches_empty_transport_list() {
    let mut config = GeolinkConfig::default();
    config.hub.transports.clear();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("hub.transports"));
}

#[test]
fn catches_inverted_reconnect_window() {
    let mut config = GeolinkConfig::default();
    config.reconnect.min_delay_ms = 5_000;
    config.reconnect.max_delay_ms = 5_000;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("reconnect.max_delay_ms"));
}

#[test]
fn catches_too_many_reconnect_attempts() {
    let mut config = GeolinkConfig::default();
    config.reconnect.max_attempts = 21;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("reconnect.max_attempts"));
}

#[test]
fn catches_reference_point_out_of_range() {
    let mut config = GeolinkConfig::default();
    config.mock.reference_lat = 91.0;
    config.mock.reference_lon = -181.0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("mock.reference_lat"));
    assert!(err.contains("mock.reference_lon"));
}

#[test]
fn catches_zero_intervals() {
    let mut config = GeolinkConfig::default();
    config.mock.interval_ms = 0;
    config.presence.expiry_ms = 0;
    config.sharing.interval_ms = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("mock.interval_ms"));
    assert!(err.contains("presence.expiry_ms"));
    assert!(err.contains("sharing.interval_ms"));
}

#[test]
fn collects_multiple_errors_into_one() {
    let mut config = GeolinkConfig::default();
    config.hub.url = String::new();
    config.mock.peer_id = String::new();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("hub.url"));
    assert!(err.contains("mock.peer_id"));
    assert!(err.contains("; "));
}
