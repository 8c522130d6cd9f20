//! Stale presence reaping.
//!
//! A tab that disappears without running its leave leaves a record behind.
//! With heartbeats enabled such records stop refreshing `lastSeen`; the
//! reaper removes them together with their share of the online-count.

use std::sync::Arc;
use std::time::Duration;

use huddle_common::{now_millis, PresenceRecord, RoomId, StoreError};
use huddle_store::{Document, DocumentStore, Query, WriteBatch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{collections, fields, presence_collection, room_path};

/// Remove presence records in `room` whose `lastSeen` is older than
/// `max_age`. Returns how many were removed.
pub async fn reap_stale(
    store: &dyn DocumentStore,
    room: &RoomId,
    max_age: Duration,
) -> Result<usize, StoreError> {
    let cutoff = now_millis() - i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    let records = store.query(&Query::new(presence_collection(room))).await?;

    let mut reaped = 0;
    for doc in records.iter().filter(|d| is_stale(d, cutoff)) {
        let batch = WriteBatch::new()
            .delete_existing(doc.path.clone())
            .increment(room_path(room), fields::ONLINE_COUNT, -1);
        match store.commit(batch).await {
            Ok(_) => {
                info!(room = %room, session = %doc.id(), "reaped stale presence");
                reaped += 1;
            }
            // Left on its own between the query and the delete.
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(reaped)
}

/// Reap every room on a fixed interval.
pub fn spawn_reaper(
    store: Arc<dyn DocumentStore>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let rooms = match store.query(&Query::new(collections::ROOMS)).await {
                Ok(rooms) => rooms,
                Err(e) => {
                    warn!(error = %e, "reaper could not list rooms");
                    continue;
                }
            };
            let mut total = 0;
            for room in &rooms {
                let id = RoomId::from(room.id());
                match reap_stale(store.as_ref(), &id, max_age).await {
                    Ok(n) => total += n,
                    Err(e) => warn!(room = %id, error = %e, "reaping failed"),
                }
            }
            debug!(rooms = rooms.len(), reaped = total, "Reaper tick");
        }
    })
}

fn is_stale(doc: &Document, cutoff: i64) -> bool {
    match doc.decode::<PresenceRecord>() {
        Ok(record) => record.last_seen.max(record.joined_at) < cutoff,
        Err(e) => {
            warn!(record = %doc.path, error = %e, "undecodable presence record");
            false
        }
    }
}
