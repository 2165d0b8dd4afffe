//! Full configuration validation.
//!
//! Each domain has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod hub;
mod mock;

#[cfg(test)]
mod tests;

use crate::schema::GeolinkConfig;
use geolink_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &GeolinkConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    hub::validate_hub(&mut errors, config);
    hub::validate_reconnect(&mut errors, config);
    mock::validate_mock(&mut errors, config);
    mock::validate_timers(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
