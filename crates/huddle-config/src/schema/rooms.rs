//! Room and chat limits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Rooms one owner may hold at once (valid range: 1-100).
    pub max_rooms_per_owner: u32,
    /// Longest accepted chat message in characters (valid range: 1-10000).
    pub max_message_length: u32,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_rooms_per_owner: 3,
            max_message_length: 1000,
        }
    }
}
