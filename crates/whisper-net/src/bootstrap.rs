//! Bootstrap/relay node mode.
//!
//! Runs the overlay alone: no SSH, no sessions. The node serves DHT
//! queries in server mode, accepts circuit-relay reservations from
//! NAT-bound chat nodes, and participates in gossip so room meshes can
//! form through it. Identity is persistent when a key path is configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    connection_limits::{self, ConnectionLimits},
    gossipsub, identify,
    identity::Keypair,
    kad::{self, store::MemoryStore},
    multiaddr::Protocol,
    relay,
    swarm::{NetworkBehaviour, SwarmEvent},
    Multiaddr, SwarmBuilder,
};
use tracing::{debug, info, warn};

use whisper_shared::constants::{
    CONNECTION_HEARTBEAT_SECS, MAX_CONNECTIONS, MAX_RELAY_RESERVATIONS,
};

use crate::peers::PeerTracker;
use crate::transport::{build_gossipsub, build_identify};

#[derive(NetworkBehaviour)]
pub struct BootstrapBehaviour {
    pub relay: relay::Behaviour,
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<MemoryStore>,
    pub identify: identify::Behaviour,
    pub limits: connection_limits::Behaviour,
}

/// Configuration for a bootstrap node.
pub struct BootstrapConfig {
    /// WebSocket listen port.
    pub listen_port: u16,
    /// Where the node's ed25519 secret key lives. `None` means a fresh
    /// identity every start.
    pub key_path: Option<PathBuf>,
    /// Other bootstrap nodes to mesh with.
    pub bootstrap_nodes: Vec<Multiaddr>,
}

/// Load the node identity from `path`, or generate one.
///
/// A freshly generated key is persisted as the raw 32-byte ed25519 secret
/// when a path is given, so the peer id survives restarts.
pub fn load_or_generate_keypair(path: Option<&Path>) -> anyhow::Result<Keypair> {
    if let Some(path) = path {
        if path.exists() {
            let mut bytes = std::fs::read(path)?;
            let keypair = Keypair::ed25519_from_bytes(&mut bytes).map_err(|e| {
                anyhow::anyhow!("invalid key file {}: {e}", path.display())
            })?;
            info!(
                path = %path.display(),
                peer_id = %keypair.public().to_peer_id(),
                "Loaded persistent node identity"
            );
            return Ok(keypair);
        }
    }

    let keypair = Keypair::generate_ed25519();
    if let Some(path) = path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ed = keypair
            .clone()
            .try_into_ed25519()
            .map_err(|_| anyhow::anyhow!("generated keypair is not ed25519"))?;
        std::fs::write(path, ed.secret().as_ref())?;
        info!(
            path = %path.display(),
            peer_id = %keypair.public().to_peer_id(),
            "Generated and persisted node identity"
        );
    }
    Ok(keypair)
}

async fn build_bootstrap_swarm(
    keypair: Keypair,
) -> anyhow::Result<libp2p::Swarm<BootstrapBehaviour>> {
    use libp2p::{noise, tcp, yamux};

    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default().nodelay(true),
            noise::Config::new,
            yamux::Config::default,
        )?
        .with_websocket(noise::Config::new, yamux::Config::default)
        .await?
        .with_behaviour(|key| -> std::result::Result<BootstrapBehaviour, Box<dyn std::error::Error + Send + Sync>> {
            let local_peer_id = key.public().to_peer_id();

            let relay_config = relay::Config {
                max_reservations: MAX_RELAY_RESERVATIONS,
                ..Default::default()
            };
            let relay = relay::Behaviour::new(local_peer_id, relay_config);

            let gossipsub = build_gossipsub(key)?;

            let store = MemoryStore::new(local_peer_id);
            let mut kademlia = kad::Behaviour::new(local_peer_id, store);
            kademlia.set_mode(Some(kad::Mode::Server));

            let identify = build_identify(key);

            let limits = connection_limits::Behaviour::new(
                ConnectionLimits::default().with_max_established(Some(MAX_CONNECTIONS)),
            );

            Ok(BootstrapBehaviour {
                relay,
                gossipsub,
                kademlia,
                identify,
                limits,
            })
        })?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(120)))
        .build();

    Ok(swarm)
}

/// Run a bootstrap node until a termination signal arrives.
pub async fn run_bootstrap(config: BootstrapConfig) -> anyhow::Result<()> {
    let keypair = load_or_generate_keypair(config.key_path.as_deref())?;
    let local_peer_id = keypair.public().to_peer_id();

    info!(peer_id = %local_peer_id, "Starting bootstrap node");

    let mut swarm = build_bootstrap_swarm(keypair).await?;

    let listen_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}/ws", config.listen_port)
        .parse()
        .expect("valid multiaddr");
    swarm.listen_on(listen_addr.clone())?;
    info!(addr = %listen_addr, "Bootstrap node listening");

    for addr in &config.bootstrap_nodes {
        if let Err(e) = swarm.dial(addr.clone()) {
            warn!(addr = %addr, error = %e, "Failed to dial peer bootstrap node");
        }
    }

    let mut peer_tracker = PeerTracker::new();
    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(CONNECTION_HEARTBEAT_SECS));

    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down bootstrap node");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down bootstrap node");
                break;
            }

            _ = heartbeat.tick() => {
                info!(
                    connections = peer_tracker.peer_count(),
                    relayed = peer_tracker.relayed_count(),
                    "Bootstrap heartbeat"
                );
            }

            event = swarm.select_next_some() => match event {
                SwarmEvent::Behaviour(BootstrapBehaviourEvent::Relay(event)) => match &event {
                    relay::Event::ReservationReqAccepted { src_peer_id, .. } => {
                        info!(peer = %src_peer_id, "Relay reservation accepted");
                    }
                    relay::Event::ReservationTimedOut { src_peer_id, .. } => {
                        debug!(peer = %src_peer_id, "Relay reservation timed out");
                    }
                    relay::Event::CircuitReqAccepted { src_peer_id, dst_peer_id, .. } => {
                        info!(
                            src = %src_peer_id,
                            dst = %dst_peer_id,
                            "Circuit relay established"
                        );
                    }
                    relay::Event::CircuitClosed { src_peer_id, dst_peer_id, .. } => {
                        debug!(
                            src = %src_peer_id,
                            dst = %dst_peer_id,
                            "Circuit relay closed"
                        );
                    }
                    _ => {
                        debug!(event = ?event, "Relay event");
                    }
                },

                SwarmEvent::Behaviour(BootstrapBehaviourEvent::Identify(event)) => {
                    if let identify::Event::Received { peer_id, info, .. } = event {
                        debug!(
                            peer = %peer_id,
                            protocol = ?info.protocol_version,
                            "Identify: received info from peer"
                        );
                        for addr in &info.listen_addrs {
                            swarm
                                .behaviour_mut()
                                .kademlia
                                .add_address(&peer_id, addr.clone());
                        }
                    }
                }

                SwarmEvent::Behaviour(BootstrapBehaviourEvent::Kademlia(event)) => {
                    debug!(event = ?event, "Kademlia event");
                }

                SwarmEvent::Behaviour(BootstrapBehaviourEvent::Gossipsub(event)) => {
                    // Bootstrap nodes forward gossip but never consume it
                    debug!(event = ?event, "Gossipsub event");
                }

                SwarmEvent::NewListenAddr { address, .. } => {
                    info!(addr = %address, "Bootstrap node listening on new address");
                }

                SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                    let addr = endpoint.get_remote_address().clone();
                    let relayed = addr.iter().any(|p| matches!(p, Protocol::P2pCircuit));
                    peer_tracker.on_connected(peer_id, addr.clone(), relayed);
                    info!(peer = %peer_id, addr = %addr, "Peer connected");
                }

                SwarmEvent::ConnectionClosed { peer_id, num_established, .. } => {
                    if num_established == 0 {
                        peer_tracker.on_disconnected(&peer_id);
                        info!(peer = %peer_id, "Peer disconnected");
                    }
                }

                SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                    warn!(peer = ?peer_id, error = %error, "Outgoing connection error");
                }

                SwarmEvent::IncomingConnectionError { error, .. } => {
                    warn!(error = %error, "Incoming connection error");
                }

                _ => {}
            }
        }
    }

    Ok(())
}
