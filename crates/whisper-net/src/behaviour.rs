//! Composed libp2p `NetworkBehaviour` for Whisper chat nodes.
//!
//! Combines GossipSub (room pub/sub), Kademlia (peer discovery, client
//! mode), Identify (protocol negotiation), and the circuit relay v2 client
//! (NAT traversal via bootstrap relays).

use libp2p::{
    gossipsub, identify,
    kad::{self, store::MemoryStore},
    relay,
    swarm::NetworkBehaviour,
};

/// Composed network behaviour for chat-serving nodes.
///
/// All sub-behaviours are driven by the single swarm event loop.
/// Construction is handled by [`super::transport::build_swarm`] via
/// `SwarmBuilder`.
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "WhisperEvent")]
pub struct WhisperBehaviour {
    /// Room message pub/sub
    pub gossipsub: gossipsub::Behaviour,
    /// Distributed hash table for peer discovery
    pub kademlia: kad::Behaviour<MemoryStore>,
    /// Protocol identification and capability advertisement
    pub identify: identify::Behaviour,
    /// Circuit relay v2 client for NAT traversal
    pub relay_client: relay::client::Behaviour,
}

/// Events emitted by the composed behaviour, one variant per sub-behaviour.
#[derive(Debug)]
pub enum WhisperEvent {
    Gossipsub(gossipsub::Event),
    Kademlia(kad::Event),
    Identify(Box<identify::Event>),
    RelayClient(relay::client::Event),
}

impl From<gossipsub::Event> for WhisperEvent {
    fn from(event: gossipsub::Event) -> Self {
        WhisperEvent::Gossipsub(event)
    }
}

impl From<kad::Event> for WhisperEvent {
    fn from(event: kad::Event) -> Self {
        WhisperEvent::Kademlia(event)
    }
}

impl From<identify::Event> for WhisperEvent {
    fn from(event: identify::Event) -> Self {
        WhisperEvent::Identify(Box::new(event))
    }
}

impl From<relay::client::Event> for WhisperEvent {
    fn from(event: relay::client::Event) -> Self {
        WhisperEvent::RelayClient(event)
    }
}
