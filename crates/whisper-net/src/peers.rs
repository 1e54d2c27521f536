use std::collections::HashMap;

use libp2p::{Multiaddr, PeerId};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer_id: PeerId,
    pub address: Multiaddr,
    pub relayed: bool,
    pub connected_at: u64,
}

/// Tracks currently established connections for peer snapshots and the
/// bootstrap heartbeat.
#[derive(Debug, Clone, Default)]
pub struct PeerTracker {
    peers: HashMap<PeerId, ConnectionInfo>,
}

impl PeerTracker {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    pub fn on_connected(&mut self, peer_id: PeerId, address: Multiaddr, relayed: bool) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        debug!(
            peer = %peer_id,
            addr = %address,
            relayed,
            "Tracking new peer connection"
        );

        self.peers.insert(
            peer_id,
            ConnectionInfo {
                peer_id,
                address,
                relayed,
                connected_at: now,
            },
        );
    }

    pub fn on_disconnected(&mut self, peer_id: &PeerId) {
        if self.peers.remove(peer_id).is_some() {
            debug!(peer = %peer_id, "Removed peer from tracker");
        }
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn relayed_count(&self) -> usize {
        self.peers.values().filter(|info| info.relayed).count()
    }
}
