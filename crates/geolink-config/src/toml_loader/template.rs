//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Geolink Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[hub]
url = "https://tech-test.raintor.com/Hub"
# probe_timeout_ms = 15000
# connect_timeout_ms = 15000
# send_timeout_ms = 15000
# keepalive_interval_ms = 15000
# server_timeout_ms = 30000      # must exceed keepalive_interval_ms
# transports = ["web_sockets", "server_sent_events", "long_polling"]

[reconnect]
# max_attempts = 3               # 0-20
# min_delay_ms = 2000
# max_delay_ms = 12000           # exclusive, must exceed min_delay_ms

[mock]
# enabled = false
# fallback_delay_ms = 2000
# interval_ms = 3000
# peer_id = "mock.user@example.com"
# reference_lat = 25.73736464    # -90..90
# reference_lon = 90.3644747     # -180..180
# jitter = 0.01                  # 0..1 degrees

[presence]
# expiry_ms = 30000

[sharing]
# interval_ms = 2000

[logging]
# level = "info"                 # trace, debug, info, warn, error
"##
    .to_string()
}
