//! Process-wide wiring: one overlay node, one directory, one router hub.
//!
//! The transport collaborator (SSH server + terminal UI) holds a
//! [`ChatServer`] and calls [`ChatServer::open_session`] once per accepted
//! connection, then drives the returned session with input lines.

use std::sync::Arc;

use libp2p::PeerId;
use tokio::sync::mpsc;
use tracing::info;

use whisper_net::{parse_bootstrap_nodes, spawn_swarm, SwarmCommand, SwarmConfig};
use whisper_shared::Identity;

use crate::config::WhisperConfig;
use crate::directory::ChatDirectory;
use crate::events::UiEvent;
use crate::router::RouterHub;
use crate::session::ChatSession;

pub struct ChatServer {
    config: Arc<WhisperConfig>,
    directory: Arc<ChatDirectory>,
    hub: Arc<RouterHub>,
    cmd_tx: mpsc::Sender<SwarmCommand>,
    local_peer_id: PeerId,
}

impl ChatServer {
    /// Start the overlay and the chat core. Fails only on overlay startup
    /// errors, which are fatal to the process.
    pub async fn start(config: WhisperConfig) -> anyhow::Result<Self> {
        let keypair = libp2p::identity::Keypair::generate_ed25519();

        let swarm_config = SwarmConfig {
            listen_port: config.p2p_port,
            bootstrap_nodes: parse_bootstrap_nodes(&config.bootstrap_nodes),
        };
        let (cmd_tx, notif_rx, local_peer_id) = spawn_swarm(keypair, swarm_config).await?;

        let directory = Arc::new(ChatDirectory::new(config.max_messages_in_memory));
        let hub = RouterHub::spawn(cmd_tx.clone(), notif_rx, directory.clone());

        info!(
            peer_id = %local_peer_id,
            default_room = %config.default_room,
            "Chat server ready"
        );

        Ok(Self {
            config: Arc::new(config),
            directory,
            hub,
            cmd_tx,
            local_peer_id,
        })
    }

    /// Create a session for a freshly accepted connection. The caller
    /// keeps the receiving half of `ui` and must `start()` the session.
    pub fn open_session(&self, ui: mpsc::UnboundedSender<UiEvent>) -> ChatSession {
        let identity = Identity::generate();
        ChatSession::new(
            &identity,
            self.hub.clone(),
            self.directory.clone(),
            self.config.clone(),
            ui,
        )
    }

    pub fn directory(&self) -> &Arc<ChatDirectory> {
        &self.directory
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Ask the overlay task to stop.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SwarmCommand::Shutdown).await;
    }
}
