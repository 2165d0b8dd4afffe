//! Geolink configuration system.
//!
//! TOML-based configuration for the hub connection, reconnect policy,
//! mock fallback, presence expiry and location sharing. Every section
//! uses serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geolink_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{GeolinkConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;

use geolink_common::ConfigError;

/// Load config from an explicit path, or from the platform default path
/// when `path` is `None` (creating a documented default file if missing).
pub fn load_config(path: Option<&Path>) -> Result<GeolinkConfig, ConfigError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            toml_loader::load_from_path(path)
        }
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &GeolinkConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&GeolinkConfig::default());
        assert!(json.contains("\"hub\""));
        assert!(json.contains("\"reconnect\""));
        assert!(json.contains("\"mock\""));
        assert!(json.contains("\"presence\""));
        assert!(json.contains("\"sharing\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn explicit_missing_path_is_file_not_found() {
        let err = load_config(Some(Path::new("/tmp/geolink_missing_config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&GeolinkConfig::default());
        let parsed: GeolinkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.reconnect.max_attempts, 3);
        assert_eq!(parsed.presence.expiry_ms, 30_000);
        assert_eq!(parsed.mock.peer_id, "mock.user@example.com");
    }
}
