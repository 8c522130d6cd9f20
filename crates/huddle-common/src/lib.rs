pub mod errors;
pub mod id;
pub mod time;
pub mod types;

pub use errors::{ConfigError, HuddleError, StoreError};
pub use id::{new_correlation_id, new_id, RoomId, SessionId};
pub use time::now_millis;
pub use types::{
    ChatMessage, Participant, Poll, PollKind, PollOption, PresenceRecord, PresenceStatus, Room,
};

pub type Result<T> = std::result::Result<T, HuddleError>;
