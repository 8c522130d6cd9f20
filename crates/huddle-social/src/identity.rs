//! Who is in a room: authenticated owners and room participants.

use serde::{Deserialize, Serialize};

pub use huddle_common::Participant;

/// An authenticated room owner.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Bearer token of the auth session, never persisted.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
            access_token: None,
        }
    }

    /// Create an identity from an auth session.
    pub fn from_auth(
        user_id: String,
        email: Option<String>,
        display_name: Option<String>,
        access_token: String,
    ) -> Self {
        Self {
            user_id,
            email,
            display_name,
            access_token: Some(access_token),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown for the owner: display name, else email, else user id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.user_id)
    }

    /// Returns a public view of this identity without sensitive fields.
    pub fn to_public(&self) -> PublicIdentity {
        PublicIdentity {
            user_id: self.user_id.clone(),
            display_name: self.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub user_id: String,
    pub display_name: String,
}
