//! Room subscription tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use huddle_common::{Participant, RoomId};
use huddle_store::{DocPath, DocumentStore, MemoryStore};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::*;
use crate::network::{NetworkMonitor, NetworkStatus};
use crate::presence::PresenceState;
use crate::protocol::{collections, fields, presence_collection, room_path};

fn room() -> RoomId {
    RoomId::from("R1")
}

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

async fn store_with_room() -> (MemoryStore, Arc<dyn DocumentStore>) {
    let mem = MemoryStore::new();
    let store: Arc<dyn DocumentStore> = Arc::new(mem.clone());
    let body = json!({ "name": "R1", "adminPassword": "pw", "isActive": true, "onlineCount": 0 });
    store.set(&room_path(&room()), object(body)).await.unwrap();
    (mem, store)
}

async fn put_message(store: &Arc<dyn DocumentStore>, id: &str, room: &str, text: &str, ts: i64) {
    let body = json!({
        "roomId": room,
        "userName": "Alice",
        "message": text,
        "timestamp": ts,
        "isAdmin": false,
    });
    store
        .set(&DocPath::new(collections::MESSAGES, id), object(body))
        .await
        .unwrap();
}

async fn online_count(store: &Arc<dyn DocumentStore>) -> i64 {
    store
        .get(&room_path(&room()))
        .await
        .unwrap()
        .and_then(|d| d.get(fields::ONLINE_COUNT).and_then(|v| v.as_i64()))
        .unwrap_or_default()
}

fn record_count(mem: &MemoryStore) -> usize {
    mem.document_count(&presence_collection(&room()))
}

/// Receive events until one matches, returning it.
async fn wait_for_event(
    rx: &mut mpsc::Receiver<RoomEvent>,
    mut pred: impl FnMut(&RoomEvent) -> bool,
) -> RoomEvent {
    let deadline = Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for room event")
}

async fn wait_for_count(store: &Arc<dyn DocumentStore>, want: i64) {
    for _ in 0..200 {
        if online_count(store).await == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("online count stuck at {}", online_count(store).await);
}

fn message_texts(event: &RoomEvent) -> Vec<String> {
    match event {
        RoomEvent::Messages(messages) => messages.iter().map(|m| m.message.clone()).collect(),
        other => panic!("expected messages, got {other:?}"),
    }
}

#[tokio::test]
async fn initial_snapshot_is_ordered_by_timestamp() {
    let (_mem, store) = store_with_room().await;
    put_message(&store, "m1", "R1", "third", 300).await;
    put_message(&store, "m2", "R1", "first", 100).await;
    put_message(&store, "m3", "R1", "second", 200).await;

    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (_sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    let event = wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Messages(_))).await;
    assert_eq!(message_texts(&event), ["first", "second", "third"]);
    let RoomEvent::Messages(messages) = event else {
        unreachable!()
    };
    assert_eq!(messages[0].id, "m2");
}

#[tokio::test]
async fn new_messages_arrive_as_full_snapshots() {
    let (_mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (_sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    let initial = wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Messages(_))).await;
    assert!(message_texts(&initial).is_empty());

    put_message(&store, "a", "R1", "later", 20).await;
    put_message(&store, "b", "R1", "earlier", 10).await;

    let event = wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Messages(m) if m.len() == 2)).await;
    assert_eq!(message_texts(&event), ["earlier", "later"]);
}

#[tokio::test]
async fn messages_from_other_rooms_are_filtered() {
    let (_mem, store) = store_with_room().await;
    put_message(&store, "x", "R2", "elsewhere", 1).await;
    put_message(&store, "y", "R1", "here", 2).await;

    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (_sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    let event = wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Messages(_))).await;
    assert_eq!(message_texts(&event), ["here"]);
}

#[tokio::test]
async fn undecodable_message_is_reported_and_skipped() {
    let (_mem, store) = store_with_room().await;
    put_message(&store, "ok", "R1", "fine", 1).await;
    store
        .set(
            &DocPath::new(collections::MESSAGES, "bad"),
            object(json!({ "roomId": "R1", "timestamp": 2 })),
        )
        .await
        .unwrap();

    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (_sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Error(msg) if msg.contains("messages/bad"))).await;
    let event = wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Messages(_))).await;
    assert_eq!(message_texts(&event), ["fine"]);
}

#[tokio::test]
async fn single_client_join_and_leave() {
    let (mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (mut sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    sub.ready().await.unwrap();
    assert_eq!(sub.presence().state(), PresenceState::Active);
    wait_for_event(&mut rx, |e| *e == RoomEvent::OnlineCount(1)).await;
    wait_for_event(&mut rx, |e| *e == RoomEvent::OnlineUsers(vec!["Alice".into()])).await;

    sub.unsubscribe().unwrap().await.unwrap();
    assert_eq!(online_count(&store).await, 0);
    assert_eq!(record_count(&mem), 0);
}

#[tokio::test]
async fn same_name_in_two_sessions_counts_twice() {
    let (mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));

    let (mut first, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    let (mut second, _rx2) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    first.ready().await.unwrap();
    second.ready().await.unwrap();

    assert_eq!(online_count(&store).await, 2);
    wait_for_event(&mut rx, |e| {
        *e == RoomEvent::OnlineUsers(vec!["Alice".into(), "Alice".into()])
    })
    .await;

    second.unsubscribe().unwrap().await.unwrap();
    assert_eq!(online_count(&store).await, 1);
    assert_eq!(record_count(&mem), 1);
    wait_for_event(&mut rx, |e| *e == RoomEvent::OnlineUsers(vec!["Alice".into()])).await;
}

#[tokio::test]
async fn dropping_the_subscription_leaves_once() {
    let (mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (mut sub, _rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    sub.ready().await.unwrap();
    let presence = sub.presence().clone();
    let commits_before = mem.commit_count();

    drop(sub);
    wait_for_count(&store, 0).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(presence.state(), PresenceState::Idle);
    assert_eq!(record_count(&mem), 0);
    assert_eq!(mem.commit_count(), commits_before + 1);
}

#[tokio::test]
async fn unsubscribe_before_join_settles_still_cleans_up() {
    let (mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));

    let hold = mem.hold_commits();
    let (sub, _rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    let presence = sub.presence().clone();
    assert_eq!(presence.state(), PresenceState::Pending);

    let leaving = sub.unsubscribe().unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The leave waits for the held join instead of running against nothing.
    assert!(!leaving.is_finished());
    assert_eq!(presence.state(), PresenceState::Pending);

    hold.release();
    leaving.await.unwrap();
    assert_eq!(presence.state(), PresenceState::Idle);
    assert_eq!(record_count(&mem), 0);
    assert_eq!(online_count(&store).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn immediate_unsubscribe_leaves_no_record() {
    for _ in 0..100 {
        let (mem, store) = store_with_room().await;
        let subscriber = RoomSubscriber::new(Arc::clone(&store));

        let presence = tokio::spawn(async move {
            let (sub, _rx) = subscriber
                .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
                .await
                .unwrap();
            let presence = sub.presence().clone();
            sub.unsubscribe().unwrap().await.unwrap();
            presence
        })
        .await
        .unwrap();

        assert_eq!(presence.state(), PresenceState::Idle);
        assert_eq!(record_count(&mem), 0);
        assert_eq!(online_count(&store).await, 0);
    }
}

#[tokio::test]
async fn network_cycle_leaves_and_rejoins() {
    let (mem, store) = store_with_room().await;
    let monitor = NetworkMonitor::new();
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let options = SubscribeOptions {
        network: Some(monitor.subscribe()),
        ..Default::default()
    };
    let (mut sub, _rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), options)
        .await
        .unwrap();
    sub.ready().await.unwrap();

    monitor.set(NetworkStatus::Offline);
    wait_for_count(&store, 0).await;
    assert_eq!(record_count(&mem), 0);

    monitor.set(NetworkStatus::Online);
    wait_for_count(&store, 1).await;
    assert_eq!(record_count(&mem), 1);
    assert_eq!(sub.presence().state(), PresenceState::Active);
}

#[tokio::test]
async fn network_changes_after_unsubscribe_are_ignored() {
    let (mem, store) = store_with_room().await;
    let monitor = NetworkMonitor::new();
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let options = SubscribeOptions {
        network: Some(monitor.subscribe()),
        ..Default::default()
    };
    let (mut sub, _rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), options)
        .await
        .unwrap();
    sub.ready().await.unwrap();
    sub.unsubscribe().unwrap().await.unwrap();

    monitor.set(NetworkStatus::Offline);
    monitor.set(NetworkStatus::Online);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(online_count(&store).await, 0);
    assert_eq!(record_count(&mem), 0);
}

#[tokio::test]
async fn unsubscribe_releases_store_watchers() {
    let (mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (mut sub, _rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    sub.ready().await.unwrap();
    assert_eq!(mem.watcher_count(), 3);

    sub.unsubscribe().unwrap().await.unwrap();
    for _ in 0..100 {
        if mem.watcher_count() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(mem.watcher_count(), 0);
}

#[tokio::test]
async fn deleted_room_is_reported() {
    let (_mem, store) = store_with_room().await;
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (_sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();
    wait_for_event(&mut rx, |e| matches!(e, RoomEvent::OnlineCount(_))).await;

    store.delete(&room_path(&room())).await.unwrap();
    wait_for_event(&mut rx, |e| *e == RoomEvent::RoomDeleted).await;
}

#[tokio::test]
async fn join_into_missing_room_reports_error() {
    let mem = MemoryStore::new();
    let store: Arc<dyn DocumentStore> = Arc::new(mem.clone());
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let (mut sub, mut rx) = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await
        .unwrap();

    assert!(sub.ready().await.is_err());
    assert_eq!(sub.presence().state(), PresenceState::Idle);
    assert_eq!(record_count(&mem), 0);
    wait_for_event(&mut rx, |e| matches!(e, RoomEvent::Error(_))).await;
}

#[tokio::test]
async fn subscribe_fails_when_store_is_down() {
    let mem = MemoryStore::new();
    mem.set_available(false);
    let store: Arc<dyn DocumentStore> = Arc::new(mem);
    let subscriber = RoomSubscriber::new(store);
    let result = subscriber
        .subscribe(room(), Participant::new("Alice"), SubscribeOptions::default())
        .await;
    assert!(result.is_err());
}
