//! Room pub/sub over the gossip overlay.
//!
//! A single [`RouterHub`] fronts the process-wide swarm: it reference-counts
//! topic subscriptions across sessions, runs the inbound dispatch task, and
//! owns the publish path. Each session holds a [`RoomRouter`] view with its
//! own room → handler map, torn down with the session.
//!
//! Publishing into a room nobody else subscribes to is not an error: the
//! sender has already seen its own echo, so an isolated overlay degrades to
//! a single-server chat rather than failing sends.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use libp2p::PeerId;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use whisper_net::{PublishFailure, SwarmCommand, SwarmNotification};
use whisper_shared::constants::ROOM_TOPIC_PREFIX;
use whisper_shared::{ChatMessage, CodecError, SessionId};

use crate::directory::{ChatDirectory, MessageOrigin};

/// Invoked for every inbound overlay message on a subscribed room.
pub type InboundHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("failed to publish: {0}")]
    Publish(String),

    #[error("overlay task is gone")]
    ChannelClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn topic_for_room(room: &str) -> String {
    format!("{ROOM_TOPIC_PREFIX}{room}")
}

fn room_for_topic(topic: &str) -> Option<&str> {
    topic.strip_prefix(ROOM_TOPIC_PREFIX)
}

/// Shared half of the router: one per process.
pub struct RouterHub {
    cmd_tx: mpsc::Sender<SwarmCommand>,
    directory: Arc<ChatDirectory>,
    rooms: Mutex<HashMap<String, HashMap<SessionId, InboundHandler>>>,
}

impl RouterHub {
    /// Construct the hub and start its inbound dispatch task.
    pub fn spawn(
        cmd_tx: mpsc::Sender<SwarmCommand>,
        mut notif_rx: mpsc::Receiver<SwarmNotification>,
        directory: Arc<ChatDirectory>,
    ) -> Arc<Self> {
        let hub = Arc::new(Self {
            cmd_tx,
            directory,
            rooms: Mutex::new(HashMap::new()),
        });

        let dispatch_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(notification) = notif_rx.recv().await {
                match notification {
                    SwarmNotification::MessageReceived { topic, data, .. } => {
                        dispatch_hub.dispatch(&topic, &data);
                    }
                    SwarmNotification::PeerConnected { peer_id, .. } => {
                        debug!(peer = %peer_id, "Overlay peer connected");
                    }
                    SwarmNotification::PeerDisconnected { peer_id } => {
                        debug!(peer = %peer_id, "Overlay peer disconnected");
                    }
                }
            }
            debug!("Router dispatch loop terminated");
        });

        hub
    }

    /// Route one inbound payload: topic → room, decode, record once,
    /// fan out to every session handler registered for the room.
    fn dispatch(&self, topic: &str, data: &[u8]) {
        let Some(room) = room_for_topic(topic) else {
            debug!(topic = %topic, "Ignoring message on foreign topic");
            return;
        };

        let message = match ChatMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(room = %room, error = %e, "Dropping undecodable message");
                return;
            }
        };

        // Snapshot handlers so none run under the lock
        let handlers: Vec<InboundHandler> = {
            let rooms = self.rooms.lock().expect("router lock poisoned");
            match rooms.get(room) {
                Some(sessions) => sessions.values().cloned().collect(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            debug!(room = %room, "No local subscribers, dropping message");
            return;
        }

        // Recorded exactly once regardless of how many sessions share the
        // room; handlers render, the directory remembers.
        self.directory
            .add_message(message.clone(), MessageOrigin::Remote);

        for handler in handlers {
            handler(message.clone());
        }
    }

    async fn register(
        &self,
        session_id: SessionId,
        room: &str,
        handler: InboundHandler,
    ) {
        let first_subscriber = {
            let mut rooms = self.rooms.lock().expect("router lock poisoned");
            let sessions = rooms.entry(room.to_string()).or_default();
            let was_empty = sessions.is_empty();
            sessions.insert(session_id, handler);
            was_empty
        };

        if first_subscriber {
            let topic = topic_for_room(room);
            debug!(room = %room, topic = %topic, "Subscribing to room topic");
            if self
                .cmd_tx
                .send(SwarmCommand::Subscribe(topic))
                .await
                .is_err()
            {
                warn!(room = %room, "Overlay task gone, subscribe dropped");
            }
        }
    }

    async fn unregister(&self, session_id: SessionId, room: &str) {
        let last_subscriber = {
            let mut rooms = self.rooms.lock().expect("router lock poisoned");
            match rooms.get_mut(room) {
                Some(sessions) => {
                    sessions.remove(&session_id);
                    if sessions.is_empty() {
                        rooms.remove(room);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if last_subscriber {
            let topic = topic_for_room(room);
            debug!(room = %room, topic = %topic, "Unsubscribing from room topic");
            if self
                .cmd_tx
                .send(SwarmCommand::Unsubscribe(topic))
                .await
                .is_err()
            {
                warn!(room = %room, "Overlay task gone, unsubscribe dropped");
            }
        }
    }

    async fn publish(&self, room: &str, message: &ChatMessage) -> Result<(), RouterError> {
        let data = message.encode()?;
        let topic = topic_for_room(room);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SwarmCommand::Publish {
                topic,
                data,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RouterError::ChannelClosed)?;

        match reply_rx.await.map_err(|_| RouterError::ChannelClosed)? {
            Ok(()) => Ok(()),
            Err(PublishFailure::NoPeers) => {
                // Isolated overlay: the local echo already happened
                debug!(room = %room, "Published to empty room topic");
                Ok(())
            }
            Err(PublishFailure::Other(e)) => Err(RouterError::Publish(e)),
        }
    }

    async fn topic_peers(&self, room: &str) -> Vec<PeerId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SwarmCommand::GetTopicPeers {
                topic: topic_for_room(room),
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// One session's view of the router.
pub struct RoomRouter {
    session_id: SessionId,
    hub: Arc<RouterHub>,
    subscriptions: HashSet<String>,
}

impl RoomRouter {
    pub fn new(session_id: SessionId, hub: Arc<RouterHub>) -> Self {
        Self {
            session_id,
            hub,
            subscriptions: HashSet::new(),
        }
    }

    /// Subscribe this session to a room. No-op (with a warning) when the
    /// view is already subscribed.
    pub async fn join_room(&mut self, room: &str, handler: InboundHandler) {
        if !self.subscriptions.insert(room.to_string()) {
            warn!(room = %room, session = %self.session_id, "Already subscribed to room");
            return;
        }
        self.hub.register(self.session_id, room, handler).await;
    }

    /// Drop this session's handler for a room. Idempotent.
    pub async fn leave_room(&mut self, room: &str) {
        if self.subscriptions.remove(room) {
            self.hub.unregister(self.session_id, room).await;
        }
    }

    /// Encode and publish into a room's topic.
    pub async fn send_message(&self, room: &str, message: &ChatMessage) -> Result<(), RouterError> {
        self.hub.publish(room, message).await
    }

    pub fn get_subscribed_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.subscriptions.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    /// The overlay's current view of remote subscribers for a room.
    pub async fn get_room_peers(&self, room: &str) -> Vec<PeerId> {
        self.hub.topic_peers(room).await
    }

    /// Unsubscribe from every room this view holds.
    pub async fn destroy(&mut self) {
        let rooms: Vec<String> = self.subscriptions.drain().collect();
        for room in rooms {
            self.hub.unregister(self.session_id, &room).await;
        }
    }
}
