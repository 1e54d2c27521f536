//! End-to-end session scenarios against an in-process stand-in for the
//! swarm task. The stand-in speaks the real command/notification protocol,
//! records publishes, and answers with a scripted acknowledgement, so
//! everything above the overlay (sessions, directory, router, commands)
//! runs exactly as in production.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use whisper_core::{
    ChatDirectory, ChatSession, RouterHub, UiEvent, WhisperConfig,
};
use whisper_net::{PublishAck, SwarmCommand, SwarmNotification};
use whisper_shared::{ChatMessage, Identity};

struct TestWorld {
    hub: Arc<RouterHub>,
    directory: Arc<ChatDirectory>,
    config: Arc<WhisperConfig>,
    notif_tx: mpsc::Sender<SwarmNotification>,
    published: Arc<Mutex<Vec<(String, ChatMessage)>>>,
}

impl TestWorld {
    /// Wire a directory and router hub to a fake swarm task.
    fn new(config: WhisperConfig, ack: PublishAck) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SwarmCommand>(64);
        let (notif_tx, notif_rx) = mpsc::channel::<SwarmNotification>(64);
        let published = Arc::new(Mutex::new(Vec::new()));

        let log = published.clone();
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    SwarmCommand::Publish { topic, data, reply } => {
                        if let Ok(message) = ChatMessage::decode(&data) {
                            log.lock().unwrap().push((topic, message));
                        }
                        let _ = reply.send(ack.clone());
                    }
                    SwarmCommand::GetPeers(reply) => {
                        let _ = reply.send(Vec::new());
                    }
                    SwarmCommand::GetTopicPeers { reply, .. } => {
                        let _ = reply.send(Vec::new());
                    }
                    _ => {}
                }
            }
        });

        let directory = Arc::new(ChatDirectory::new(config.max_messages_in_memory));
        let hub = RouterHub::spawn(cmd_tx, notif_rx, directory.clone());

        Self {
            hub,
            directory,
            config: Arc::new(config),
            notif_tx,
            published,
        }
    }

    async fn open_session(&self) -> (ChatSession, mpsc::UnboundedReceiver<UiEvent>) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let identity = Identity::generate();
        let mut session = ChatSession::new(
            &identity,
            self.hub.clone(),
            self.directory.clone(),
            self.config.clone(),
            ui_tx,
        );
        session.start().await;
        (session, ui_rx)
    }

    /// Deliver a message as if it arrived from a remote peer.
    async fn inject_remote(&self, message: &ChatMessage) {
        self.notif_tx
            .send(SwarmNotification::MessageReceived {
                source: None,
                topic: format!("/whisper/room/{}", message.room),
                data: message.encode().unwrap(),
            })
            .await
            .unwrap();
    }

    fn published_kinds(&self, room: &str) -> Vec<whisper_shared::MessageType> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _)| topic == &format!("/whisper/room/{room}"))
            .map(|(_, m)| m.kind)
            .collect()
    }
}

/// Let background tasks (broadcast listeners, hub dispatch) settle, then
/// drain everything the UI received.
async fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    tokio::time::sleep(Duration::from_millis(40)).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn rendered(events: &[UiEvent], content: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, UiEvent::Message(m) if m.content == content))
        .count()
}

fn systems(events: &[UiEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            UiEvent::System(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn single_user_isolated_publish() {
    // No peers anywhere: publish reports NoPeers, which is not a failure
    let world = TestWorld::new(
        WhisperConfig::default(),
        Err(whisper_net::PublishFailure::NoPeers),
    );
    let (mut session, mut ui) = world.open_session().await;
    drain(&mut ui).await;

    session.handle_input("hi").await;
    let events = drain(&mut ui).await;

    assert_eq!(rendered(&events, "hi"), 1);
    assert!(systems(&events).iter().all(|s| !s.contains("Failed")));

    let history = world.directory.get_recent_messages("lobby", None);
    assert!(history.iter().any(|m| m.content == "hi"));
}

#[tokio::test]
async fn two_sessions_one_room_exactly_once_delivery() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    let (b, mut b_ui) = world.open_session().await;

    drain(&mut a_ui).await;
    drain(&mut b_ui).await;

    a.handle_input("hi").await;

    let a_events = drain(&mut a_ui).await;
    let b_events = drain(&mut b_ui).await;

    // Sender sees its own echo once; the co-located peer sees it once
    assert_eq!(rendered(&a_events, "hi"), 1);
    assert_eq!(rendered(&b_events, "hi"), 1);

    let history = world.directory.get_recent_messages("lobby", None);
    assert_eq!(
        history.iter().filter(|m| m.content == "hi").count(),
        1
    );
    drop(b);
}

#[tokio::test]
async fn remote_message_rendered_once_per_session() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (_a, mut a_ui) = world.open_session().await;
    let (_b, mut b_ui) = world.open_session().await;
    drain(&mut a_ui).await;
    drain(&mut b_ui).await;

    let remote = ChatMessage::text("lobby", "carol", "0BADF00D", "from afar");
    world.inject_remote(&remote).await;

    let a_events = drain(&mut a_ui).await;
    let b_events = drain(&mut b_ui).await;

    assert_eq!(rendered(&a_events, "from afar"), 1);
    assert_eq!(rendered(&b_events, "from afar"), 1);
    assert_eq!(
        world
            .directory
            .get_recent_messages("lobby", None)
            .iter()
            .filter(|m| m.content == "from afar")
            .count(),
        1
    );
}

#[tokio::test]
async fn nickname_collision_rejected() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    let (mut b, mut b_ui) = world.open_session().await;
    drain(&mut a_ui).await;
    drain(&mut b_ui).await;

    a.handle_input("/nick alice").await;
    drain(&mut a_ui).await;
    assert_eq!(a.nick(), "alice");

    let b_before = b.nick();
    b.handle_input("/nick alice").await;
    let b_events = drain(&mut b_ui).await;

    assert_eq!(b.nick(), b_before);
    assert!(systems(&b_events)
        .iter()
        .any(|s| s.contains("already taken")));
    assert_eq!(
        world.directory.get_user(b.session_id()).unwrap().nick,
        b_before
    );
}

#[tokio::test]
async fn case_insensitive_collision_across_case() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    let (mut b, mut b_ui) = world.open_session().await;
    drain(&mut a_ui).await;
    drain(&mut b_ui).await;

    a.handle_input("/nick Alice").await;
    b.handle_input("/nick ALICE").await;
    let b_events = drain(&mut b_ui).await;

    assert!(systems(&b_events)
        .iter()
        .any(|s| s.contains("already taken")));
}

#[tokio::test]
async fn room_switch_replays_history() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));

    // `quiet` already holds history from a remote sender
    world.directory.add_message(
        ChatMessage::text("quiet", "carol", "0BADF00D", "earlier talk"),
        whisper_core::MessageOrigin::Remote,
    );

    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    for i in 0..5 {
        a.handle_input(&format!("msg {i}")).await;
    }
    drain(&mut a_ui).await;

    a.handle_input("/join quiet").await;
    let events = drain(&mut a_ui).await;

    let sys = systems(&events);
    assert!(sys.iter().any(|s| s.contains("Joined #quiet")));
    let start = sys.iter().position(|s| s == "--- Recent messages ---");
    let end = sys.iter().position(|s| s == "--- End of history ---");
    assert!(start.is_some() && end.is_some());
    assert!(start.unwrap() < end.unwrap());
    // Replay contains the remote message, never A's own traffic
    assert_eq!(rendered(&events, "earlier talk"), 1);
    assert_eq!(rendered(&events, "msg 0"), 0);

    assert_eq!(
        world.directory.get_user(a.session_id()).unwrap().room,
        "quiet"
    );
    assert!(world
        .directory
        .get_users_in_room("lobby")
        .iter()
        .all(|u| u.session_id != a.session_id()));
}

#[tokio::test]
async fn join_current_room_is_a_noop() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    a.handle_input("/join lobby").await;
    let events = drain(&mut a_ui).await;
    assert!(systems(&events)
        .iter()
        .any(|s| s.contains("already in #lobby")));
}

#[tokio::test]
async fn rate_limit_discards_excess_sends() {
    let config = WhisperConfig {
        rate_limit: 3,
        ..WhisperConfig::default()
    };
    let world = TestWorld::new(config, Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    for i in 0..4 {
        a.handle_input(&format!("burst {i}")).await;
    }
    let events = drain(&mut a_ui).await;

    for i in 0..3 {
        assert_eq!(rendered(&events, &format!("burst {i}")), 1);
    }
    // The fourth is neither echoed nor recorded
    assert_eq!(rendered(&events, "burst 3"), 0);
    assert!(systems(&events).iter().any(|s| s.contains("Rate limit")));

    let history = world.directory.get_recent_messages("lobby", None);
    assert!(history.iter().all(|m| m.content != "burst 3"));
}

#[tokio::test]
async fn oversized_message_rejected_at_byte_boundary() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    let exactly = "x".repeat(4096);
    a.handle_input(&exactly).await;
    let events = drain(&mut a_ui).await;
    assert_eq!(rendered(&events, &exactly), 1);

    let over = "y".repeat(4097);
    a.handle_input(&over).await;
    let events = drain(&mut a_ui).await;
    assert_eq!(rendered(&events, &over), 0);
    assert!(systems(&events).iter().any(|s| s.contains("too long")));
}

#[tokio::test]
async fn disconnect_cleans_up_and_notifies_peers() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    let (b, mut b_ui) = world.open_session().await;
    drain(&mut a_ui).await;
    drain(&mut b_ui).await;

    let a_id = a.session_id();
    a.disconnect().await;
    let a_events = drain(&mut a_ui).await;
    let b_events = drain(&mut b_ui).await;

    assert!(a_events
        .iter()
        .any(|e| matches!(e, UiEvent::Disconnected)));
    assert!(world.directory.get_user(a_id).is_none());

    // A leave went out over the overlay
    let kinds = world.published_kinds("lobby");
    assert!(kinds.contains(&whisper_shared::MessageType::Leave));

    // B's user list lost A
    let lists: Vec<_> = b_events
        .iter()
        .filter_map(|e| match e {
            UiEvent::UserList(users) => Some(users),
            _ => None,
        })
        .collect();
    assert!(!lists.is_empty());
    assert!(lists
        .last()
        .unwrap()
        .iter()
        .all(|u| u.session_id != a_id));

    // Idempotent
    a.disconnect().await;
    drop(b);
}

#[tokio::test]
async fn quit_command_disconnects() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    a.handle_input("/quit").await;
    let events = drain(&mut a_ui).await;

    assert!(!a.is_connected());
    assert!(systems(&events).iter().any(|s| s == "Goodbye!"));
    assert!(events.iter().any(|e| matches!(e, UiEvent::Disconnected)));
}

#[tokio::test]
async fn unknown_command_and_help() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    a.handle_input("/frobnicate now").await;
    a.handle_input("/help").await;
    let events = drain(&mut a_ui).await;

    let sys = systems(&events);
    assert!(sys
        .iter()
        .any(|s| s.contains("Unknown command: /frobnicate")));
    assert!(sys.iter().any(|s| s.contains("/nick <name>")));
}

#[tokio::test]
async fn action_messages_skip_size_check() {
    let world = TestWorld::new(WhisperConfig::default(), Ok(()));
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    let long_action = format!("/me {}", "z".repeat(5000));
    a.handle_input(&long_action).await;
    let events = drain(&mut a_ui).await;

    // Actions are not size checked; the emote goes out
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(
                e,
                UiEvent::Message(m) if m.kind == whisper_shared::MessageType::Action
            ))
            .count(),
        1
    );
}

#[tokio::test]
async fn publish_failure_surfaces_without_rollback() {
    let world = TestWorld::new(
        WhisperConfig::default(),
        Err(whisper_net::PublishFailure::Other("mesh on fire".into())),
    );
    let (mut a, mut a_ui) = world.open_session().await;
    drain(&mut a_ui).await;

    a.handle_input("hello?").await;
    let events = drain(&mut a_ui).await;

    // No echo, no history, a failure notice
    assert_eq!(rendered(&events, "hello?"), 0);
    assert!(systems(&events)
        .iter()
        .any(|s| s.contains("Failed to send message")));

    // Nick changes persist even when the announcement cannot be published
    a.handle_input("/nick stubborn").await;
    drain(&mut a_ui).await;
    assert_eq!(a.nick(), "stubborn");
    assert_eq!(
        world.directory.get_user(a.session_id()).unwrap().nick,
        "stubborn"
    );
}
