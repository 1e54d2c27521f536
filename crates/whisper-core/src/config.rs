use std::path::PathBuf;

use whisper_shared::constants::{
    DEFAULT_P2P_PORT, DEFAULT_ROOM, DEFAULT_SSH_PORT, MAX_MESSAGES_IN_MEMORY, MAX_MESSAGE_SIZE,
    MAX_NICK_LENGTH, MAX_ROOM_NAME_LENGTH, RATE_LIMIT,
};

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// SSH listen port (consumed by the transport collaborator).
    pub ssh_port: u16,
    /// SSH host key location (consumed by the transport collaborator).
    pub ssh_host_key_path: PathBuf,
    /// P2P WebSocket listen port.
    pub p2p_port: u16,
    /// Comma-separated bootstrap multiaddrs, raw form.
    pub bootstrap_nodes: String,
    /// Room new sessions land in.
    pub default_room: String,
    /// Message content cap in UTF-8 bytes.
    pub max_message_size: usize,
    /// Per-room history bound.
    pub max_messages_in_memory: usize,
    /// Text/action sends per second per session.
    pub rate_limit: u32,
    pub max_nick_length: usize,
    pub max_room_name_length: usize,
    /// Run as a bootstrap/relay node instead of a chat server.
    pub is_bootstrap: bool,
    /// Persistent identity for bootstrap mode; unset means ephemeral.
    pub p2p_key_path: Option<PathBuf>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            ssh_port: DEFAULT_SSH_PORT,
            ssh_host_key_path: PathBuf::from("./keys/host.key"),
            p2p_port: DEFAULT_P2P_PORT,
            bootstrap_nodes: String::new(),
            default_room: DEFAULT_ROOM.to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            max_messages_in_memory: MAX_MESSAGES_IN_MEMORY,
            rate_limit: RATE_LIMIT,
            max_nick_length: MAX_NICK_LENGTH,
            max_room_name_length: MAX_ROOM_NAME_LENGTH,
            is_bootstrap: false,
            p2p_key_path: None,
        }
    }
}

impl WhisperConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("SSH_PORT") {
            config.ssh_port = port;
        }

        if let Ok(path) = std::env::var("SSH_HOST_KEY_PATH") {
            config.ssh_host_key_path = PathBuf::from(path);
        }

        if let Some(port) = env_parse::<u16>("P2P_PORT") {
            config.p2p_port = port;
        }

        if let Ok(nodes) = std::env::var("BOOTSTRAP_NODES") {
            config.bootstrap_nodes = nodes;
        }

        if let Ok(room) = std::env::var("DEFAULT_ROOM") {
            if !room.is_empty() {
                config.default_room = room.to_lowercase();
            }
        }

        if let Some(size) = env_parse::<usize>("MAX_MESSAGE_SIZE") {
            config.max_message_size = size;
        }

        if let Some(count) = env_parse::<usize>("MAX_MESSAGES_IN_MEMORY") {
            config.max_messages_in_memory = count;
        }

        if let Some(limit) = env_parse::<u32>("RATE_LIMIT") {
            config.rate_limit = limit;
        }

        if let Some(len) = env_parse::<usize>("MAX_NICK_LENGTH") {
            config.max_nick_length = len;
        }

        if let Some(len) = env_parse::<usize>("MAX_ROOM_NAME_LENGTH") {
            config.max_room_name_length = len;
        }

        if let Ok(val) = std::env::var("IS_BOOTSTRAP") {
            config.is_bootstrap = val != "false" && val != "0" && !val.is_empty();
        }

        if let Ok(path) = std::env::var("P2P_KEY_PATH") {
            if !path.is_empty() {
                config.p2p_key_path = Some(PathBuf::from(path));
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WhisperConfig::default();
        assert_eq!(config.ssh_port, 2222);
        assert_eq!(config.p2p_port, 4001);
        assert_eq!(config.default_room, "lobby");
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.max_messages_in_memory, 100);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.max_nick_length, 32);
        assert_eq!(config.max_room_name_length, 32);
        assert!(!config.is_bootstrap);
        assert!(config.p2p_key_path.is_none());
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("WHISPER_TEST_PORT_GARBAGE", "not-a-number");
        assert_eq!(env_parse::<u16>("WHISPER_TEST_PORT_GARBAGE"), None);
        std::env::remove_var("WHISPER_TEST_PORT_GARBAGE");
    }

    #[test]
    fn test_env_parse_accepts_valid() {
        std::env::set_var("WHISPER_TEST_PORT_OK", "2022");
        assert_eq!(env_parse::<u16>("WHISPER_TEST_PORT_OK"), Some(2022));
        std::env::remove_var("WHISPER_TEST_PORT_OK");
    }
}
