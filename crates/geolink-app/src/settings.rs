//! Maps the on-disk config schema plus CLI overrides onto core settings.

use std::time::Duration;

use geolink_config::schema::TransportName;
use geolink_config::GeolinkConfig;
use geolink_hub::{
    HubConfig, MockConfig, PresenceConfig, ReconnectPolicy, SharingConfig, TransportKind,
};

use crate::cli::Args;

/// Everything the binary needs to run one session.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub hub: HubConfig,
    pub presence: PresenceConfig,
    pub sharing: SharingConfig,
}

fn transport_kind(name: TransportName) -> TransportKind {
    match name {
        TransportName::WebSockets => TransportKind::WebSockets,
        TransportName::ServerSentEvents => TransportKind::ServerSentEvents,
        TransportName::LongPolling => TransportKind::LongPolling,
    }
}

impl Settings {
    pub fn resolve(config: &GeolinkConfig, args: &Args) -> Self {
        let ms = Duration::from_millis;
        let mut transports: Vec<TransportKind> = Vec::new();
        for kind in config.hub.transports.iter().copied().map(transport_kind) {
            if !transports.contains(&kind) {
                transports.push(kind);
            }
        }

        let hub = HubConfig {
            probe_timeout: ms(config.hub.probe_timeout_ms),
            connect_timeout: ms(config.hub.connect_timeout_ms),
            send_timeout: ms(config.hub.send_timeout_ms),
            keepalive_interval: ms(config.hub.keepalive_interval_ms),
            server_timeout: ms(config.hub.server_timeout_ms),
            transports,
            reconnect: ReconnectPolicy {
                max_attempts: config.reconnect.max_attempts,
                min_delay: ms(config.reconnect.min_delay_ms),
                max_delay: ms(config.reconnect.max_delay_ms),
            },
            mock: MockConfig {
                fallback_delay: ms(config.mock.fallback_delay_ms),
                interval: ms(config.mock.interval_ms),
                peer_id: config.mock.peer_id.clone(),
                reference_lat: config.mock.reference_lat,
                reference_lon: config.mock.reference_lon,
                jitter: config.mock.jitter,
            },
            start_in_mock_mode: args.mock || config.mock.enabled,
        };

        Self {
            endpoint: args
                .hub_url
                .clone()
                .unwrap_or_else(|| config.hub.url.clone()),
            hub,
            presence: PresenceConfig {
                expiry: ms(config.presence.expiry_ms),
            },
            sharing: SharingConfig {
                interval: ms(config.sharing.interval_ms),
            },
        }
    }

    /// Filter directive for the subscriber: CLI flag first, then config.
    pub fn log_directive(config: &GeolinkConfig, args: &Args) -> String {
        args.log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.as_directive().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["geolink"];
        argv.extend_from_slice(extra);
        argv.push("receive");
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_core_defaults() {
        let settings = Settings::resolve(&GeolinkConfig::default(), &args(&[]));
        assert_eq!(settings.endpoint, "https://tech-test.raintor.com/Hub");
        assert_eq!(settings.hub, HubConfig::default());
        assert_eq!(settings.presence, PresenceConfig::default());
        assert_eq!(settings.sharing, SharingConfig::default());
    }

    #[test]
    fn cli_overrides_url_and_mock() {
        let settings = Settings::resolve(
            &GeolinkConfig::default(),
            &args(&["--hub-url", "http://localhost:5000/hub", "--mock"]),
        );
        assert_eq!(settings.endpoint, "http://localhost:5000/hub");
        assert!(settings.hub.start_in_mock_mode);
    }

    #[test]
    fn transports_keep_order_and_drop_duplicates() {
        let mut config = GeolinkConfig::default();
        config.hub.transports = vec![
            TransportName::LongPolling,
            TransportName::WebSockets,
            TransportName::LongPolling,
        ];
        let settings = Settings::resolve(&config, &args(&[]));
        assert_eq!(
            settings.hub.transports,
            vec![TransportKind::LongPolling, TransportKind::WebSockets]
        );
    }

    #[test]
    fn log_directive_prefers_cli() {
        let config = GeolinkConfig::default();
        assert_eq!(Settings::log_directive(&config, &args(&[])), "info");
        assert_eq!(
            Settings::log_directive(&config, &args(&["--log-level", "geolink_hub=trace"])),
            "geolink_hub=trace"
        );
    }
}
