//! Live-room presence and chat over a document store.

pub mod chat;
pub mod identity;
pub mod network;
pub mod presence;
pub mod protocol;
pub mod room;
pub mod rooms;

pub use chat::{ChatService, DEFAULT_MAX_MESSAGE_LENGTH};
pub use identity::{Identity, Participant, PublicIdentity};
pub use network::{NetworkMonitor, NetworkStatus};
pub use presence::{reap_stale, spawn_reaper, PresenceError, PresenceManager, PresenceState};
pub use room::{RoomEvent, RoomSubscriber, RoomSubscription, SubscribeOptions};
pub use rooms::{NewRoom, RoomError, RoomService, RoomUpdate, DEFAULT_MAX_ROOMS_PER_OWNER};
