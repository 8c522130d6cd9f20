//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod presence;
mod rooms;

pub use logging::*;
pub use presence::*;
pub use rooms::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Huddle.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub presence: PresenceConfig,
    pub rooms: RoomsConfig,
    pub logging: LoggingConfig,
}
