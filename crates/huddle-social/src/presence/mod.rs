//! Presence tracking backed by a document store.
//!
//! Each session that joins a room owns one record under
//! `rooms/{room}/presence/{session}`; creating or deleting it moves the
//! room's `onlineCount` in the same transactional batch. The lifecycle is
//! the explicit state machine in [`state`], driven by [`PresenceManager`].

mod manager;
mod reaper;
pub mod state;
mod types;


pub use manager::PresenceManager;
pub use reaper::{reap_stale, spawn_reaper};
pub use state::{transition, Effect, PresenceInput, PresenceState};
pub use types::PresenceError;
