//! Persisted data model shared by the store, presence and room crates.
//!
//! Documents are stored as camelCase JSON. Document ids are not part of the
//! stored body; they are filled in from the document key after decoding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{new_correlation_id, RoomId, SessionId};

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A chat room document (`rooms/{id}`).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(skip)]
    pub id: RoomId,
    pub name: String,
    /// Opaque admin credential.
    pub admin_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(rename = "isActive", default = "default_true")]
    pub active: bool,
    /// Denormalised count of presence children.
    #[serde(default)]
    pub online_count: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_display_name: Option<String>,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("admin_password", &"[REDACTED]")
            .field("admin_name", &self.admin_name)
            .field("active", &self.active)
            .field("online_count", &self.online_count)
            .field("created_at", &self.created_at)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
}

/// Live signal that a session is connected to a room
/// (`rooms/{room}/presence/{session}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub nickname: String,
    pub session_id: SessionId,
    #[serde(default)]
    pub status: PresenceStatus,
    #[serde(default)]
    pub joined_at: i64,
    /// Last heartbeat; equals `joined_at` until the first refresh.
    #[serde(default)]
    pub last_seen: i64,
}

/// A room member as seen by the client: display name plus the tab session
/// it joined from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub session_id: SessionId,
    pub is_admin: bool,
}

impl Participant {
    /// A participant with a freshly generated session id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: SessionId::new(),
            is_admin: false,
        }
    }

    pub fn with_session(name: impl Into<String>, session_id: impl Into<SessionId>) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Messages & polls
// ---------------------------------------------------------------------------

/// A chat message document (`messages/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: String,
    pub room_id: RoomId,
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollKind {
    #[default]
    MultipleChoice,
    WordCloud,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub votes: u32,
    #[serde(default)]
    pub voters: Vec<String>,
}

/// A poll embedded in a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub question: String,
    #[serde(rename = "type", default)]
    pub kind: PollKind,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub word_cloud_responses: Vec<String>,
    #[serde(rename = "isActive", default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl Poll {
    pub fn multiple_choice(question: impl Into<String>, options: &[&str]) -> Self {
        Self {
            id: format!("poll_{}", new_correlation_id()),
            question: question.into(),
            kind: PollKind::MultipleChoice,
            options: options
                .iter()
                .enumerate()
                .map(|(i, text)| PollOption {
                    id: format!("opt_{i}"),
                    text: (*text).to_string(),
                    votes: 0,
                    voters: Vec::new(),
                })
                .collect(),
            word_cloud_responses: Vec::new(),
            active: true,
            created_at: 0,
        }
    }

    pub fn word_cloud(question: impl Into<String>) -> Self {
        Self {
            id: format!("poll_{}", new_correlation_id()),
            question: question.into(),
            kind: PollKind::WordCloud,
            options: Vec::new(),
            word_cloud_responses: Vec::new(),
            active: true,
            created_at: 0,
        }
    }
}
