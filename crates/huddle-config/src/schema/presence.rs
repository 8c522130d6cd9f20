//! Presence tracking configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence heartbeat and stale-record reaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Seconds between `lastSeen` refreshes. 0 disables heartbeats and,
    /// with them, the reaper (valid range: 0-3600).
    pub heartbeat_interval_secs: u32,
    /// A record not refreshed for this long is stale (valid range: 10-86400).
    pub stale_after_secs: u32,
    /// Seconds between reaper sweeps (valid range: 5-3600).
    pub reap_interval_secs: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 0,
            stale_after_secs: 120,
            reap_interval_secs: 60,
        }
    }
}

impl PresenceConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(u64::from(self.stale_after_secs))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.reap_interval_secs))
    }
}
