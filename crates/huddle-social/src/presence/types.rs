//! Error types for presence tracking.

use huddle_common::StoreError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A join that could not be completed. Never fatal: the manager is back in
/// `Idle` and the caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("presence store error: {0}")]
    Store(#[from] StoreError),
}

impl PresenceError {
    /// Whether retrying the join later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
        }
    }
}
