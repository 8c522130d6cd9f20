//! Options and events for room subscriptions.

use std::time::Duration;

use huddle_common::ChatMessage;
use tokio::sync::watch;

use crate::network::NetworkStatus;

/// Optional behaviour attached to a room subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Connectivity feed; offline leaves, online rejoins.
    pub network: Option<watch::Receiver<NetworkStatus>>,
    /// Refresh `lastSeen` on this interval while active.
    pub heartbeat_interval: Option<Duration>,
}

/// State slices delivered to the UI. Each is a full replacement snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Messages of the room in ascending timestamp order.
    Messages(Vec<ChatMessage>),
    OnlineCount(i64),
    /// Nicknames of every present session, oldest join first. A name
    /// appears once per session.
    OnlineUsers(Vec<String>),
    /// The room document no longer exists.
    RoomDeleted,
    Error(String),
}
