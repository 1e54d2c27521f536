//! Main swarm orchestration with tokio mpsc command/notification pattern.
//!
//! The swarm event loop runs in a dedicated tokio task. External code
//! communicates with it through typed command and notification channels,
//! keeping the networking layer fully asynchronous and decoupled.

use futures::StreamExt;
use libp2p::{
    gossipsub, identify, kad,
    multiaddr::Protocol,
    relay,
    swarm::SwarmEvent,
    Multiaddr, PeerId,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use whisper_shared::constants::DEFAULT_P2P_PORT;

use crate::behaviour::WhisperEvent;
use crate::peers::PeerTracker;
use crate::transport::build_swarm;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Outcome of a publish, reported back to the caller.
///
/// "No peers subscribed" is distinguished structurally so the room layer
/// can treat an isolated overlay as success instead of matching on error
/// strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishFailure {
    /// GossipSub had no remote subscribers for the topic.
    NoPeers,
    /// Any other publish failure.
    Other(String),
}

impl std::fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishFailure::NoPeers => write!(f, "no peers subscribed to topic"),
            PublishFailure::Other(e) => write!(f, "{e}"),
        }
    }
}

pub type PublishAck = Result<(), PublishFailure>;

/// Commands sent *into* the swarm task.
#[derive(Debug)]
pub enum SwarmCommand {
    /// Dial a remote peer at the given multiaddr.
    Dial(Multiaddr),
    /// Publish a payload on a GossipSub topic and acknowledge the outcome.
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: oneshot::Sender<PublishAck>,
    },
    /// Subscribe to a GossipSub topic.
    Subscribe(String),
    /// Unsubscribe from a GossipSub topic.
    Unsubscribe(String),
    /// Request a snapshot of currently connected peers.
    GetPeers(oneshot::Sender<Vec<PeerId>>),
    /// Request the overlay's view of remote subscribers for a topic.
    GetTopicPeers {
        topic: String,
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    /// Gracefully shut down the swarm.
    Shutdown,
}

/// Notifications sent *from* the swarm task to the application.
#[derive(Debug, Clone)]
pub enum SwarmNotification {
    /// A new peer connected.
    PeerConnected {
        peer_id: PeerId,
        address: Multiaddr,
    },
    /// A peer disconnected.
    PeerDisconnected {
        peer_id: PeerId,
    },
    /// A GossipSub message was received.
    MessageReceived {
        source: Option<PeerId>,
        topic: String,
        data: Vec<u8>,
    },
}

/// Configuration for spawning the chat-node swarm.
pub struct SwarmConfig {
    /// WebSocket listen port.
    pub listen_port: u16,
    /// Bootstrap nodes to dial and seed Kademlia with on startup.
    pub bootstrap_nodes: Vec<Multiaddr>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_P2P_PORT,
            bootstrap_nodes: Vec::new(),
        }
    }
}

/// Spawn the libp2p swarm in a background tokio task.
///
/// Returns channels for sending commands and receiving notifications,
/// plus the local `PeerId`.
pub async fn spawn_swarm(
    keypair: libp2p::identity::Keypair,
    config: SwarmConfig,
) -> anyhow::Result<(
    mpsc::Sender<SwarmCommand>,
    mpsc::Receiver<SwarmNotification>,
    PeerId,
)> {
    let mut swarm = build_swarm(keypair).await?;
    let local_peer_id = *swarm.local_peer_id();

    let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}/ws", config.listen_port)
        .parse()
        .expect("valid multiaddr");
    swarm.listen_on(listen_addr)?;

    info!(peer_id = %local_peer_id, port = config.listen_port, "Swarm listening");

    // Dial bootstrap nodes and seed the routing table
    for addr in &config.bootstrap_nodes {
        if let Err(e) = swarm.dial(addr.clone()) {
            warn!(addr = %addr, error = %e, "Failed to dial bootstrap node");
        } else {
            if let Some(peer_id) = extract_peer_id(addr) {
                swarm
                    .behaviour_mut()
                    .kademlia
                    .add_address(&peer_id, addr.clone());
            }
            debug!(addr = %addr, "Dialing bootstrap node");
        }
    }
    if !config.bootstrap_nodes.is_empty() {
        if let Err(e) = swarm.behaviour_mut().kademlia.bootstrap() {
            warn!(error = %e, "Kademlia bootstrap failed to start");
        }
    }

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SwarmCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<SwarmNotification>(256);

    tokio::spawn(async move {
        let mut peer_tracker = PeerTracker::new();

        loop {
            tokio::select! {
                // --- Incoming commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SwarmCommand::Dial(addr)) => {
                            if let Err(e) = swarm.dial(addr.clone()) {
                                error!(addr = %addr, error = %e, "Dial failed");
                            }
                        }
                        Some(SwarmCommand::Publish { topic, data, reply }) => {
                            let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                            let ack = match swarm
                                .behaviour_mut()
                                .gossipsub
                                .publish(gossipsub_topic, data)
                            {
                                Ok(_) => Ok(()),
                                Err(gossipsub::PublishError::InsufficientPeers) => {
                                    debug!(topic = %topic, "Publish with no subscribed peers");
                                    Err(PublishFailure::NoPeers)
                                }
                                Err(e) => {
                                    error!(topic = %topic, error = %e, "Publish failed");
                                    Err(PublishFailure::Other(e.to_string()))
                                }
                            };
                            let _ = reply.send(ack);
                        }
                        Some(SwarmCommand::Subscribe(topic)) => {
                            let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                            if let Err(e) = swarm
                                .behaviour_mut()
                                .gossipsub
                                .subscribe(&gossipsub_topic)
                            {
                                error!(topic = %topic, error = %e, "Subscribe failed");
                            }
                        }
                        Some(SwarmCommand::Unsubscribe(topic)) => {
                            let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                            let _ = swarm.behaviour_mut().gossipsub.unsubscribe(&gossipsub_topic);
                            debug!(topic = %topic, "Unsubscribed from topic");
                        }
                        Some(SwarmCommand::GetPeers(reply)) => {
                            let peers = peer_tracker.connected_peers();
                            let _ = reply.send(peers);
                        }
                        Some(SwarmCommand::GetTopicPeers { topic, reply }) => {
                            let hash = gossipsub::IdentTopic::new(&topic).hash();
                            let peers: Vec<PeerId> = swarm
                                .behaviour()
                                .gossipsub
                                .all_peers()
                                .filter(|(_, topics)| topics.iter().any(|t| **t == hash))
                                .map(|(peer_id, _)| *peer_id)
                                .collect();
                            let _ = reply.send(peers);
                        }
                        Some(SwarmCommand::Shutdown) => {
                            info!("Swarm shutdown requested");
                            break;
                        }
                        None => {
                            // All senders dropped
                            info!("Command channel closed, shutting down swarm");
                            break;
                        }
                    }
                }

                // --- Swarm events ---
                event = swarm.select_next_some() => {
                    match event {
                        SwarmEvent::Behaviour(WhisperEvent::Gossipsub(
                            gossipsub::Event::Message {
                                propagation_source: _,
                                message_id: _,
                                message,
                            },
                        )) => {
                            let topic = message.topic.to_string();
                            debug!(
                                topic = %topic,
                                source = ?message.source,
                                len = message.data.len(),
                                "GossipSub message received"
                            );
                            let _ = notif_tx
                                .send(SwarmNotification::MessageReceived {
                                    source: message.source,
                                    topic,
                                    data: message.data,
                                })
                                .await;
                        }

                        SwarmEvent::Behaviour(WhisperEvent::Kademlia(
                            kad::Event::OutboundQueryProgressed { result, .. },
                        )) => {
                            debug!(result = ?result, "Kademlia query progressed");
                        }

                        SwarmEvent::Behaviour(WhisperEvent::Identify(event)) => {
                            if let identify::Event::Received { peer_id, info, .. } = *event {
                                debug!(
                                    peer = %peer_id,
                                    protocol = ?info.protocol_version,
                                    "Identify: received info from peer"
                                );
                                // Feed observed addresses into Kademlia
                                for addr in &info.listen_addrs {
                                    swarm
                                        .behaviour_mut()
                                        .kademlia
                                        .add_address(&peer_id, addr.clone());
                                }
                            }
                        }

                        SwarmEvent::Behaviour(WhisperEvent::RelayClient(
                            relay::client::Event::ReservationReqAccepted {
                                relay_peer_id,
                                ..
                            },
                        )) => {
                            info!(relay = %relay_peer_id, "Relay reservation accepted");
                        }

                        SwarmEvent::ConnectionEstablished {
                            peer_id, endpoint, ..
                        } => {
                            let addr = endpoint.get_remote_address().clone();
                            let is_relayed = addr.iter().any(|p| matches!(p, Protocol::P2pCircuit));
                            peer_tracker.on_connected(peer_id, addr.clone(), is_relayed);

                            info!(
                                peer = %peer_id,
                                addr = %addr,
                                relayed = is_relayed,
                                "Peer connected"
                            );
                            let _ = notif_tx
                                .send(SwarmNotification::PeerConnected {
                                    peer_id,
                                    address: addr,
                                })
                                .await;
                        }

                        SwarmEvent::ConnectionClosed {
                            peer_id,
                            num_established,
                            ..
                        } => {
                            if num_established == 0 {
                                peer_tracker.on_disconnected(&peer_id);
                                info!(peer = %peer_id, "Peer disconnected");
                                let _ = notif_tx
                                    .send(SwarmNotification::PeerDisconnected { peer_id })
                                    .await;
                            }
                        }

                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "Listening on new address");
                        }

                        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                            warn!(
                                peer = ?peer_id,
                                error = %error,
                                "Outgoing connection error"
                            );
                        }

                        SwarmEvent::IncomingConnectionError { error, .. } => {
                            warn!(error = %error, "Incoming connection error");
                        }

                        _ => {}
                    }
                }
            }
        }

        info!("Swarm event loop terminated");
    });

    Ok((cmd_tx, notif_rx, local_peer_id))
}

/// Extract a `PeerId` from a multiaddr, if one is present.
fn extract_peer_id(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|p| {
        if let Protocol::P2p(peer_id) = p {
            Some(peer_id)
        } else {
            None
        }
    })
}
