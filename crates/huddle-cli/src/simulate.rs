//! Scripted room session.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use futures_util::future::join_all;
use huddle_common::{HuddleError, Participant, Poll, RoomId};
use huddle_config::HuddleConfig;
use huddle_social::{
    spawn_reaper, ChatService, Identity, NetworkMonitor, NetworkStatus, NewRoom, RoomError,
    RoomEvent, RoomService, RoomSubscriber, RoomSubscription, SubscribeOptions,
};
use huddle_store::{DocumentStore, MemoryStore};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of participants joining the room (the first one is admin).
    #[arg(short, long, default_value_t = 3)]
    participants: usize,

    /// Chat messages each participant sends.
    #[arg(short, long, default_value_t = 2)]
    messages: usize,

    /// Room name.
    #[arg(long, default_value = "Demo room")]
    room: String,

    /// Drop and restore the network halfway through.
    #[arg(long)]
    flaky_network: bool,

    /// Milliseconds to pause between steps.
    #[arg(long, default_value_t = 50)]
    step_ms: u64,
}

pub async fn run(config: &HuddleConfig, args: SimulateArgs) -> Result<(), HuddleError> {
    let mem = MemoryStore::new();
    let store: Arc<dyn DocumentStore> = Arc::new(mem.clone());
    let step = Duration::from_millis(args.step_ms);

    let rooms = RoomService::new(Arc::clone(&store))
        .with_room_limit(config.rooms.max_rooms_per_owner as usize);
    let chat = ChatService::new(Arc::clone(&store))
        .with_max_message_length(config.rooms.max_message_length as usize);

    let owner = Identity::new("demo-owner").with_display_name("Host");
    let room = rooms
        .create_room(
            NewRoom {
                name: args.room.clone(),
                admin_name: Some("Host".into()),
                admin_password: huddle_common::new_id(),
            },
            Some(&owner),
        )
        .await
        .map_err(room_error)?;
    rooms.open_room(&room).await.map_err(room_error)?;

    let heartbeat = config.presence.heartbeat_interval();
    let reaper = heartbeat.map(|_| {
        info!(
            stale_after = ?config.presence.stale_after(),
            "stale presence reaper enabled"
        );
        spawn_reaper(
            Arc::clone(&store),
            config.presence.reap_interval(),
            config.presence.stale_after(),
        )
    });

    let network = NetworkMonitor::new();
    let subscriber = RoomSubscriber::new(Arc::clone(&store));
    let mut sessions = Vec::with_capacity(args.participants);
    for i in 0..args.participants {
        let participant = if i == 0 {
            Participant::new("Host").admin()
        } else {
            Participant::new(format!("guest-{i}"))
        };
        let options = SubscribeOptions {
            network: Some(network.subscribe()),
            heartbeat_interval: heartbeat,
        };
        let (sub, events) = subscriber
            .subscribe(room.clone(), participant.clone(), options)
            .await?;
        tokio::spawn(follow_events(participant.name.clone(), events, i == 0));
        sessions.push((participant, sub));
    }

    for outcome in join_all(sessions.iter_mut().map(|(_, sub)| sub.ready())).await {
        if let Err(e) = outcome {
            warn!(error = %e, "participant failed to join");
        }
    }
    info!(room = %room, participants = sessions.len(), "everyone joined");

    tokio::select! {
        result = script(&chat, &room, &sessions, &network, &args, step) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, signalling departure");
            for (_, sub) in &sessions {
                sub.presence().signal_unload();
            }
            return Ok(());
        }
    }

    let leaving: Vec<_> = sessions
        .into_iter()
        .filter_map(|(_, sub)| sub.unsubscribe())
        .collect();
    join_all(leaving).await;
    if let Some(reaper) = reaper {
        reaper.abort();
    }

    let room_doc = rooms.get_room(&room).await.map_err(room_error)?;
    let summary = serde_json::json!({
        "room": room.as_str(),
        "name": room_doc.name,
        "onlineCount": room_doc.online_count,
        "messages": chat.messages(&room).await.map_err(room_error)?.len(),
        "commits": mem.commit_count(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(|e| HuddleError::Other(e.to_string()))?
    );
    Ok(())
}

async fn script(
    chat: &ChatService,
    room: &RoomId,
    sessions: &[(Participant, RoomSubscription)],
    network: &NetworkMonitor,
    args: &SimulateArgs,
    step: Duration,
) -> Result<(), HuddleError> {
    for round in 0..args.messages {
        for (participant, _) in sessions {
            let text = format!("hello #{round} from {}", participant.name);
            chat.send_message(room, participant, &text, None)
                .await
                .map_err(room_error)?;
        }
        tokio::time::sleep(step).await;
    }

    if let Some((host, _)) = sessions.first() {
        let poll = Poll::multiple_choice("Ready for the next topic?", &["yes", "not yet"]);
        let id = chat.post_poll(room, host, poll).await.map_err(room_error)?;
        tokio::time::sleep(step).await;
        chat.close_poll(&id).await.map_err(room_error)?;
    }

    if args.flaky_network {
        info!("network going offline");
        network.set(NetworkStatus::Offline);
        tokio::time::sleep(step).await;
        info!("network back online");
        network.set(NetworkStatus::Online);
    }
    tokio::time::sleep(step).await;
    Ok(())
}

async fn follow_events(name: String, mut events: mpsc::Receiver<RoomEvent>, verbose: bool) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::OnlineCount(count) if verbose => {
                info!(viewer = %name, online = count, "online count")
            }
            RoomEvent::OnlineUsers(users) if verbose => {
                info!(viewer = %name, users = ?users, "online users")
            }
            RoomEvent::Messages(messages) if verbose => {
                if let Some(last) = messages.last() {
                    info!(
                        viewer = %name,
                        total = messages.len(),
                        from = %last.user_name,
                        text = %last.message,
                        "messages"
                    );
                }
            }
            RoomEvent::RoomDeleted => warn!(viewer = %name, "room deleted"),
            RoomEvent::Error(e) => warn!(viewer = %name, error = %e, "room feed error"),
            other => debug!(viewer = %name, event = ?other, "room event"),
        }
    }
}

fn room_error(e: RoomError) -> HuddleError {
    match e {
        RoomError::Store(e) => HuddleError::Store(e),
        other => HuddleError::Room(other.to_string()),
    }
}
