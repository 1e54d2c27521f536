use serde::{Deserialize, Serialize};
use uuid::Uuid;

// One connected user = one session id, minted at connection time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire-level message kind. Structural kinds (`join`, `leave`, `nick`)
/// carry a human-readable phrasing in `content`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Join,
    Leave,
    Nick,
    Action,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Nick => "nick",
            MessageType::Action => "action",
        };
        write!(f, "{s}")
    }
}
