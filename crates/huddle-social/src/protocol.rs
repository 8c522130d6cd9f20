//! Persisted document layout.
//!
//! Collection names, field names and path builders for the documents the
//! presence and room layers read and write. The bodies themselves are the
//! serde types in `huddle_common::types`.

use huddle_common::{RoomId, SessionId};
use huddle_store::DocPath;

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Top-level and nested collection names.
pub mod collections {
    pub const ROOMS: &str = "rooms";
    pub const PRESENCE: &str = "presence";
    pub const MESSAGES: &str = "messages";
}

/// Field names referenced by queries and partial updates.
pub mod fields {
    pub const ONLINE_COUNT: &str = "onlineCount";
    pub const ACTIVE: &str = "isActive";
    pub const CREATED_AT: &str = "createdAt";
    pub const OWNER_ID: &str = "ownerId";
    pub const NAME: &str = "name";
    pub const ADMIN_NAME: &str = "adminName";
    pub const ADMIN_PASSWORD: &str = "adminPassword";
    pub const JOINED_AT: &str = "joinedAt";
    pub const LAST_SEEN: &str = "lastSeen";
    pub const ROOM_ID: &str = "roomId";
    pub const TIMESTAMP: &str = "timestamp";
    pub const POLL: &str = "poll";
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

pub fn room_path(room: &RoomId) -> DocPath {
    DocPath::new(collections::ROOMS, room.as_str())
}

/// Collection holding one presence record per connected session.
pub fn presence_collection(room: &RoomId) -> String {
    room_path(room).sub_collection(collections::PRESENCE)
}

pub fn presence_path(room: &RoomId, session: &SessionId) -> DocPath {
    room_path(room).child(collections::PRESENCE, session.as_str())
}

pub fn message_path(id: &str) -> DocPath {
    DocPath::new(collections::MESSAGES, id)
}
