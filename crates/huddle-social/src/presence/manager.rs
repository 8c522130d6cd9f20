//! Presence manager: drives the state machine against a document store.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use huddle_common::{Participant, PresenceRecord, PresenceStatus, RoomId, StoreError};
use huddle_store::{encode, DocPath, DocumentStore, FieldUpdate, WriteBatch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::network::NetworkStatus;
use crate::protocol::{fields, presence_path, room_path};

use super::state::{transition, Effect, PresenceInput, PresenceState};
use super::types::PresenceError;

struct Inner {
    store: Arc<dyn DocumentStore>,
    room: RoomId,
    participant: Participant,
    state: Mutex<PresenceState>,
    /// Set once the owner is done with this session; no further joins.
    closed: AtomicBool,
    /// Serialises backend work so a leave followed by a rapid join observes
    /// the committed delete.
    ops: tokio::sync::Mutex<()>,
}

/// Tracks one session's membership in one room's presence set.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PresenceManager {
    inner: Arc<Inner>,
}

impl PresenceManager {
    pub fn new(store: Arc<dyn DocumentStore>, room: RoomId, participant: Participant) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                room,
                participant,
                state: Mutex::new(PresenceState::Idle),
                closed: AtomicBool::new(false),
                ops: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.inner.room
    }

    pub fn participant(&self) -> &Participant {
        &self.inner.participant
    }

    pub fn state(&self) -> PresenceState {
        *self.lock_state()
    }

    /// Whether the unload hook is armed, i.e. a departure would have to be
    /// signalled if the process went away now.
    pub fn unload_armed(&self) -> bool {
        self.state() == PresenceState::Active
    }

    /// Join the room's presence set.
    ///
    /// Idempotent: a second call while a join is pending or active does
    /// nothing. On failure the manager is back in `Idle` and the error is
    /// returned for the caller to log or retry.
    pub async fn join(&self) -> Result<(), PresenceError> {
        self.begin_join().await
    }

    /// Record the join request now and return the backend work to run.
    ///
    /// The state is `Pending` as soon as this returns, so a leave issued
    /// before the returned future is first polled is deferred, not lost.
    pub fn begin_join(
        &self,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send + 'static {
        let effect = self.apply(PresenceInput::Join);
        let this = self.clone();
        async move {
            match effect {
                Effect::StartJoin => this.run_join().await,
                _ => Ok(()),
            }
        }
    }

    /// Leave the room's presence set.
    ///
    /// Safe to call repeatedly and before a join has settled; in the latter
    /// case the leave runs as soon as the join completes.
    pub async fn leave(&self) {
        if let Effect::StartLeave = self.apply(PresenceInput::Leave) {
            self.run_leave().await;
        }
    }

    /// React to a connectivity transition.
    pub async fn handle_network(&self, status: NetworkStatus) -> Result<(), PresenceError> {
        let input = match status {
            NetworkStatus::Online => PresenceInput::NetworkOnline,
            NetworkStatus::Offline => PresenceInput::NetworkOffline,
        };
        match self.apply(input) {
            Effect::StartJoin => self.run_join().await,
            Effect::StartLeave => {
                self.run_leave().await;
                Ok(())
            }
            Effect::None => Ok(()),
        }
    }

    /// Refuse every later join, whether requested, network-triggered or a
    /// heartbeat recovery. Leaves still run.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(
                room = %self.inner.room,
                session = %self.inner.participant.session_id,
                "presence closed"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Best-effort departure signal for process or tab teardown.
    ///
    /// Does not wait: the leave is spawned on the current runtime and may
    /// not finish before the process exits.
    pub fn signal_unload(&self) -> Option<JoinHandle<()>> {
        if !self.unload_armed() {
            return None;
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let this = self.clone();
        debug!(room = %self.inner.room, "unload signalled, leaving");
        Some(runtime.spawn(async move { this.leave().await }))
    }

    /// Refresh `lastSeen` every `interval` while active.
    pub fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if this.state() == PresenceState::Active {
                    this.heartbeat().await;
                }
            }
        })
    }

    /// Stamp `lastSeen` on our record.
    ///
    /// If the record was removed under an active session (reaped after a
    /// stall), the session joins again: record and count come back in one
    /// batch. A record gone because we left is never recreated.
    pub async fn heartbeat(&self) {
        let path = self.record_path();
        let update = vec![(fields::LAST_SEEN.to_string(), FieldUpdate::ServerTimestamp)];
        match self.inner.store.update(&path, update).await {
            Ok(()) => debug!(record = %path, "presence heartbeat"),
            Err(StoreError::NotFound(_)) => {
                if let Effect::StartJoin = self.apply(PresenceInput::RecordLost) {
                    info!(record = %path, "presence record lost while active, rejoining");
                    // Failures are logged by the join itself.
                    let _ = self.run_join().await;
                } else {
                    debug!(record = %path, "heartbeat skipped, record gone");
                }
            }
            Err(e) => warn!(record = %path, error = %e, "presence heartbeat failed"),
        }
    }

    // -- internals ---------------------------------------------------------

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PresenceState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, input: PresenceInput) -> Effect {
        let starts_join = matches!(
            input,
            PresenceInput::Join | PresenceInput::NetworkOnline | PresenceInput::RecordLost
        );
        if starts_join && self.is_closed() {
            debug!(room = %self.inner.room, input = ?input, "presence closed, input dropped");
            return Effect::None;
        }

        let mut state = self.lock_state();
        let (next, effect) = transition(*state, input);
        if next != *state {
            debug!(
                room = %self.inner.room,
                session = %self.inner.participant.session_id,
                from = ?*state,
                to = ?next,
                input = ?input,
                "presence transition"
            );
        }
        *state = next;
        effect
    }

    fn record_path(&self) -> DocPath {
        presence_path(&self.inner.room, &self.inner.participant.session_id)
    }

    async fn run_join(&self) -> Result<(), PresenceError> {
        let _ops = self.inner.ops.lock().await;
        let result = self.write_record().await;

        if let Err(e) = &result {
            warn!(
                room = %self.inner.room,
                session = %self.inner.participant.session_id,
                error = %e,
                transient = e.is_transient(),
                "presence join failed"
            );
        }

        if let Effect::StartLeave = self.apply(PresenceInput::JoinSettled {
            ok: result.is_ok(),
        }) {
            self.remove_record().await;
        }
        result
    }

    async fn run_leave(&self) {
        let _ops = self.inner.ops.lock().await;
        self.remove_record().await;
    }

    /// Create our record and bump the count in one batch, unless the record
    /// is already there.
    async fn write_record(&self) -> Result<(), PresenceError> {
        let path = self.record_path();
        if self.inner.store.get(&path).await?.is_some() {
            debug!(record = %path, "presence record already present");
            return Ok(());
        }

        let record = PresenceRecord {
            nickname: self.inner.participant.name.clone(),
            session_id: self.inner.participant.session_id.clone(),
            status: PresenceStatus::Online,
            joined_at: 0,
            last_seen: 0,
        };
        let batch = WriteBatch::new()
            .create_stamped(
                path.clone(),
                encode(&record)?,
                &[fields::JOINED_AT, fields::LAST_SEEN],
            )
            .increment(room_path(&self.inner.room), fields::ONLINE_COUNT, 1);

        match self.inner.store.commit(batch).await {
            Ok(_) => {
                info!(
                    room = %self.inner.room,
                    nickname = %record.nickname,
                    session = %record.session_id,
                    "joined room"
                );
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(record = %path, "presence record created concurrently");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete our record and decrement the count in one batch. A missing
    /// record means we already left.
    async fn remove_record(&self) {
        let path = self.record_path();
        let batch = WriteBatch::new()
            .delete_existing(path.clone())
            .increment(room_path(&self.inner.room), fields::ONLINE_COUNT, -1);

        match self.inner.store.commit(batch).await {
            Ok(_) => info!(
                room = %self.inner.room,
                session = %self.inner.participant.session_id,
                "left room"
            ),
            Err(StoreError::NotFound(_)) => debug!(record = %path, "presence already removed"),
            Err(e) => warn!(record = %path, error = %e, "presence leave failed"),
        }
    }
}

impl std::fmt::Debug for PresenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceManager")
            .field("room", &self.inner.room)
            .field("participant", &self.inner.participant)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
