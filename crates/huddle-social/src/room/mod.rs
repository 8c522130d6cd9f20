//! Room sync subscriber.
//!
//! A UI subscribes once per open room and renders the [`RoomEvent`]s it
//! receives. The subscription owns the session's presence: it joins on
//! subscribe and leaves when unsubscribed or dropped.

mod subscriber;
mod types;

#[cfg(test)]
mod tests;

pub use subscriber::{RoomSubscriber, RoomSubscription};
pub use types::{RoomEvent, SubscribeOptions};
