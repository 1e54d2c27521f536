/// Protocol version string for libp2p identify
pub const PROTOCOL_VERSION: &str = "/whisper/1.0.0";

/// GossipSub topic prefix; a room `R` lives on `"/whisper/room/" + R`
pub const ROOM_TOPIC_PREFIX: &str = "/whisper/room/";

/// Fingerprint length in hex characters (4 bytes of SHA-256)
pub const FINGERPRINT_LEN: usize = 8;

/// Default room new sessions land in
pub const DEFAULT_ROOM: &str = "lobby";

/// Default SSH listen port (consumed by the transport collaborator)
pub const DEFAULT_SSH_PORT: u16 = 2222;

/// Default P2P listen port
pub const DEFAULT_P2P_PORT: u16 = 4001;

/// Maximum chat message content size in UTF-8 bytes
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Per-room in-memory history bound
pub const MAX_MESSAGES_IN_MEMORY: usize = 100;

/// Text/action sends allowed per second per session
pub const RATE_LIMIT: u32 = 10;

/// Maximum nickname length after sanitization
pub const MAX_NICK_LENGTH: usize = 32;

/// Maximum room name length after sanitization
pub const MAX_ROOM_NAME_LENGTH: usize = 32;

/// GossipSub heartbeat interval in seconds
pub const GOSSIPSUB_HEARTBEAT_SECS: u64 = 1;

/// GossipSub transmit cap; leaves headroom over `MAX_MESSAGE_SIZE`
/// for the JSON envelope around the content
pub const MAX_TRANSMIT_SIZE: usize = 65_536;

/// Circuit relay reservations accepted by a bootstrap node
pub const MAX_RELAY_RESERVATIONS: usize = 128;

/// Connection cap on a bootstrap node
pub const MAX_CONNECTIONS: u32 = 1000;

/// Bootstrap heartbeat interval for the connection-count log line
pub const CONNECTION_HEARTBEAT_SECS: u64 = 60;
