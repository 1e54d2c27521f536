// P2P overlay layer built on libp2p with WebSocket transport and Noise
// encryption. Chat nodes run gossipsub + Kademlia (client) + identify +
// relay client; bootstrap nodes run the relay server side.

pub mod behaviour;
pub mod bootstrap;
pub mod discovery;
pub mod peers;
pub mod swarm;
pub mod transport;

pub use behaviour::{WhisperBehaviour, WhisperEvent};
pub use bootstrap::{run_bootstrap, BootstrapConfig};
pub use discovery::parse_bootstrap_nodes;
pub use peers::{ConnectionInfo, PeerTracker};
pub use swarm::{spawn_swarm, PublishAck, PublishFailure, SwarmCommand, SwarmConfig, SwarmNotification};
