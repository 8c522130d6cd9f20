//! Live room sync: fans store subscriptions out into [`RoomEvent`]s and ties
//! presence to the lifetime of the subscription.

use std::sync::Arc;

use huddle_common::{ChatMessage, Participant, PresenceRecord, Room, RoomId, StoreError};
use huddle_store::{Direction, Document, DocumentStore, Query, Watch};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::network::NetworkStatus;
use crate::presence::{PresenceError, PresenceManager};
use crate::protocol::{collections, fields, presence_collection, room_path};

use super::types::{RoomEvent, SubscribeOptions};

/// Opens live room subscriptions against a document store.
#[derive(Clone)]
pub struct RoomSubscriber {
    store: Arc<dyn DocumentStore>,
}

impl RoomSubscriber {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Subscribe to `room` as `participant`.
    ///
    /// Opens the room, presence and message feeds, then starts the presence
    /// join. Every feed delivers its current snapshot first. Returns the
    /// subscription handle and a receiver for room events.
    pub async fn subscribe(
        &self,
        room: RoomId,
        participant: Participant,
        options: SubscribeOptions,
    ) -> Result<(RoomSubscription, mpsc::Receiver<RoomEvent>), StoreError> {
        let (event_tx, event_rx) = mpsc::channel(256);

        let room_feed = self.store.watch_document(&room_path(&room)).await?;
        let presence_feed = self
            .store
            .watch_query(
                &Query::new(presence_collection(&room))
                    .order_by(fields::JOINED_AT, Direction::Ascending),
            )
            .await?;
        let message_feed = self
            .store
            .watch_query(
                &Query::new(collections::MESSAGES)
                    .where_eq(fields::ROOM_ID, room.as_str())
                    .order_by(fields::TIMESTAMP, Direction::Ascending),
            )
            .await?;

        let mut tasks = vec![
            tokio::spawn(forward_room(room.clone(), room_feed, event_tx.clone())),
            tokio::spawn(forward_presence(room.clone(), presence_feed, event_tx.clone())),
            tokio::spawn(forward_messages(room.clone(), message_feed, event_tx.clone())),
        ];

        let presence = PresenceManager::new(Arc::clone(&self.store), room.clone(), participant);

        // Pending before anything else can run; the join task itself is
        // never aborted and teardown waits for it before leaving.
        let join = {
            let joining = presence.begin_join();
            let tx = event_tx.clone();
            tokio::spawn(async move {
                let result = joining.await;
                if let Err(e) = &result {
                    // Teardown waits on this task; never block on a full channel.
                    let _ = tx.try_send(RoomEvent::Error(e.to_string()));
                }
                result
            })
        };

        if let Some(network) = options.network {
            tasks.push(tokio::spawn(follow_network(
                presence.clone(),
                network,
                event_tx.clone(),
            )));
        }
        if let Some(interval) = options.heartbeat_interval {
            tasks.push(presence.spawn_heartbeat(interval));
        }

        debug!(room = %room, session = %presence.participant().session_id, "room subscribed");

        let subscription = RoomSubscription {
            presence,
            tasks,
            join: Some(join),
            left: false,
        };
        Ok((subscription, event_rx))
    }
}

impl std::fmt::Debug for RoomSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSubscriber").finish_non_exhaustive()
    }
}

/// Handle to a live room subscription.
///
/// Unsubscribing, explicitly or by dropping the handle, stops every feed and
/// leaves the room exactly once.
pub struct RoomSubscription {
    presence: PresenceManager,
    tasks: Vec<JoinHandle<()>>,
    join: Option<JoinHandle<Result<(), PresenceError>>>,
    left: bool,
}

impl RoomSubscription {
    pub fn presence(&self) -> &PresenceManager {
        &self.presence
    }

    pub fn room(&self) -> &RoomId {
        self.presence.room()
    }

    /// Wait for the initial join to settle and return its outcome.
    /// Later calls return `Ok(())`.
    pub async fn ready(&mut self) -> Result<(), PresenceError> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        match join.await {
            Ok(result) => result,
            Err(e) => {
                warn!(room = %self.room(), error = %e, "join task did not complete");
                Ok(())
            }
        }
    }

    /// Stop all feeds and leave the room.
    ///
    /// Returns immediately; the returned handle resolves once the initial
    /// join has settled and the leave has been committed. `None` when no
    /// runtime is available to run it.
    pub fn unsubscribe(mut self) -> Option<JoinHandle<()>> {
        self.teardown()
    }

    fn teardown(&mut self) -> Option<JoinHandle<()>> {
        // Network transitions spawned but not yet run must not rejoin.
        self.presence.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if self.left {
            return None;
        }
        self.left = true;

        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let presence = self.presence.clone();
        let join = self.join.take();
        debug!(room = %presence.room(), "room unsubscribed");
        Some(runtime.spawn(async move {
            if let Some(join) = join {
                let _ = join.await;
            }
            presence.leave().await;
        }))
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for RoomSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSubscription")
            .field("presence", &self.presence)
            .field("tasks", &self.tasks.len())
            .field("left", &self.left)
            .finish()
    }
}

// -- forwarding tasks ------------------------------------------------------

async fn forward_room(
    room: RoomId,
    mut feed: Watch<Option<Document>>,
    tx: mpsc::Sender<RoomEvent>,
) {
    while let Some(snapshot) = feed.recv().await {
        let event = match snapshot {
            Some(doc) => match doc.decode::<Room>() {
                Ok(data) => RoomEvent::OnlineCount(data.online_count),
                Err(e) => decode_error(&room, &e),
            },
            None => RoomEvent::RoomDeleted,
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
    feed_closed(&room, "room", &tx).await;
}

async fn forward_presence(
    room: RoomId,
    mut feed: Watch<Vec<Document>>,
    tx: mpsc::Sender<RoomEvent>,
) {
    while let Some(docs) = feed.recv().await {
        let mut names = Vec::with_capacity(docs.len());
        for doc in &docs {
            match doc.decode::<PresenceRecord>() {
                Ok(record) => names.push(record.nickname),
                Err(e) => {
                    if tx.send(decode_error(&room, &e)).await.is_err() {
                        return;
                    }
                }
            }
        }
        if tx.send(RoomEvent::OnlineUsers(names)).await.is_err() {
            return;
        }
    }
    feed_closed(&room, "presence", &tx).await;
}

async fn forward_messages(
    room: RoomId,
    mut feed: Watch<Vec<Document>>,
    tx: mpsc::Sender<RoomEvent>,
) {
    while let Some(docs) = feed.recv().await {
        let mut messages = Vec::with_capacity(docs.len());
        for doc in &docs {
            match doc.decode::<ChatMessage>() {
                Ok(mut message) => {
                    message.id = doc.id().to_string();
                    messages.push(message);
                }
                Err(e) => {
                    if tx.send(decode_error(&room, &e)).await.is_err() {
                        return;
                    }
                }
            }
        }
        if tx.send(RoomEvent::Messages(messages)).await.is_err() {
            return;
        }
    }
    feed_closed(&room, "messages", &tx).await;
}

/// Forward connectivity changes to the presence manager, in order.
///
/// Each transition runs in its own task and is awaited before the next, so
/// aborting this loop never cancels backend work already started.
async fn follow_network(
    presence: PresenceManager,
    mut network: watch::Receiver<NetworkStatus>,
    tx: mpsc::Sender<RoomEvent>,
) {
    network.borrow_and_update();
    while network.changed().await.is_ok() {
        let status = *network.borrow_and_update();
        debug!(room = %presence.room(), ?status, "network status changed");

        let presence = presence.clone();
        let outcome = tokio::spawn(async move { presence.handle_network(status).await }).await;
        if let Ok(Err(e)) = outcome {
            let _ = tx.send(RoomEvent::Error(e.to_string())).await;
        }
    }
}

fn decode_error(room: &RoomId, error: &StoreError) -> RoomEvent {
    warn!(room = %room, error = %error, "dropping undecodable document");
    RoomEvent::Error(error.to_string())
}

async fn feed_closed(room: &RoomId, feed: &str, tx: &mpsc::Sender<RoomEvent>) {
    warn!(room = %room, feed, "subscription closed by store");
    let _ = tx
        .send(RoomEvent::Error(format!("{feed} subscription closed")))
        .await;
}
