use libp2p::identity::Keypair;
use tracing::info;

/// Build the gossipsub behaviour shared by chat and bootstrap nodes.
///
/// Flood publish and explicit-peering PX keep small meshes connected;
/// floodsub fallback lets minimal peers participate. Messages are
/// deduplicated on a content + source hash.
pub(crate) fn build_gossipsub(
    keypair: &Keypair,
) -> Result<libp2p::gossipsub::Behaviour, Box<dyn std::error::Error + Send + Sync>> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::time::Duration;

    use libp2p::gossipsub::{self, MessageAuthenticity, MessageId, ValidationMode};

    use whisper_shared::constants::{GOSSIPSUB_HEARTBEAT_SECS, MAX_TRANSMIT_SIZE};

    let message_id_fn = |message: &gossipsub::Message| {
        let mut hasher = DefaultHasher::new();
        message.data.hash(&mut hasher);
        if let Some(ref source) = message.source {
            source.hash(&mut hasher);
        }
        MessageId::from(hasher.finish().to_string())
    };

    let mut builder = gossipsub::ConfigBuilder::default();
    builder
        .heartbeat_interval(Duration::from_secs(GOSSIPSUB_HEARTBEAT_SECS))
        .validation_mode(ValidationMode::Strict)
        .max_transmit_size(MAX_TRANSMIT_SIZE)
        .message_id_fn(message_id_fn)
        .flood_publish(true)
        .do_px()
        .support_floodsub();
    let config = builder
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            format!("GossipSub config: {e}").into()
        })?;

    gossipsub::Behaviour::new(MessageAuthenticity::Signed(keypair.clone()), config).map_err(
        |e| -> Box<dyn std::error::Error + Send + Sync> { format!("GossipSub init: {e}").into() },
    )
}

pub(crate) fn build_identify(keypair: &Keypair) -> libp2p::identify::Behaviour {
    use std::time::Duration;

    use libp2p::identify;
    use whisper_shared::constants::PROTOCOL_VERSION;

    let config = identify::Config::new(PROTOCOL_VERSION.to_string(), keypair.public())
        .with_push_listen_addr_updates(true)
        .with_interval(Duration::from_secs(60));
    identify::Behaviour::new(config)
}

/// Build a chat-node swarm: WebSocket transport over TCP, Noise encryption,
/// yamux muxing, relay client, and the composed [`WhisperBehaviour`] with
/// Kademlia in client mode.
pub async fn build_swarm(
    keypair: Keypair,
) -> anyhow::Result<libp2p::Swarm<super::behaviour::WhisperBehaviour>> {
    use std::time::Duration;

    use libp2p::kad::{self, store::MemoryStore};
    use libp2p::{noise, tcp, yamux, SwarmBuilder};

    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default().nodelay(true),
            noise::Config::new,
            yamux::Config::default,
        )?
        .with_websocket(noise::Config::new, yamux::Config::default)
        .await?
        .with_relay_client(noise::Config::new, yamux::Config::default)?
        .with_behaviour(|key, relay_client| -> std::result::Result<super::behaviour::WhisperBehaviour, Box<dyn std::error::Error + Send + Sync>> {
            let local_peer_id = key.public().to_peer_id();

            let gossipsub = build_gossipsub(key)?;

            let store = MemoryStore::new(local_peer_id);
            let mut kademlia = kad::Behaviour::new(local_peer_id, store);
            kademlia.set_mode(Some(kad::Mode::Client));

            let identify = build_identify(key);

            Ok(super::behaviour::WhisperBehaviour {
                gossipsub,
                kademlia,
                identify,
                relay_client,
            })
        })?
        .with_swarm_config(|cfg| {
            cfg.with_idle_connection_timeout(Duration::from_secs(60))
        })
        .build();

    info!(
        peer_id = %swarm.local_peer_id(),
        "Built Whisper swarm with WebSocket + Relay transport"
    );

    Ok(swarm)
}
