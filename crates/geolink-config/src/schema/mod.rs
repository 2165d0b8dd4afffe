//! Configuration schema types for Geolink.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the hub client ships with.

mod hub;
mod mock;
mod presence;
mod system;

pub use hub::*;
pub use mock::*;
pub use presence::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Geolink.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct GeolinkConfig {
    pub hub: HubConfig,
    pub reconnect: ReconnectConfig,
    pub mock: MockConfig,
    pub presence: PresenceConfig,
    pub sharing: SharingConfig,
    pub logging: LoggingConfig,
}
