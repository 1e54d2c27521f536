//! The chat message record and its wire codec.
//!
//! Every published payload is the UTF-8 JSON encoding of one message.
//! Field names are fixed by the wire format (`type`, `oldNick`); structural
//! kinds carry their rendered phrasing in `content` so receivers never need
//! to re-derive it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodecError;
use crate::types::MessageType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// 128-bit unique id, string form
    pub id: String,
    /// Milliseconds since epoch, producer clock
    pub timestamp: i64,
    pub room: String,
    /// Sender nick at send time
    pub nick: String,
    /// Sender key digest
    pub fingerprint: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    /// Present iff `kind == Nick`
    #[serde(rename = "oldNick", default, skip_serializing_if = "Option::is_none")]
    pub old_nick: Option<String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl ChatMessage {
    fn base(room: &str, nick: &str, fingerprint: &str, kind: MessageType, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            room: room.to_string(),
            nick: nick.to_string(),
            fingerprint: fingerprint.to_string(),
            kind,
            content,
            old_nick: None,
        }
    }

    pub fn text(room: &str, nick: &str, fingerprint: &str, content: &str) -> Self {
        Self::base(room, nick, fingerprint, MessageType::Text, content.to_string())
    }

    pub fn join(room: &str, nick: &str, fingerprint: &str) -> Self {
        let content = format!("{nick} has joined the room");
        Self::base(room, nick, fingerprint, MessageType::Join, content)
    }

    pub fn leave(room: &str, nick: &str, fingerprint: &str) -> Self {
        let content = format!("{nick} has left the room");
        Self::base(room, nick, fingerprint, MessageType::Leave, content)
    }

    pub fn nick(room: &str, old_nick: &str, new_nick: &str, fingerprint: &str) -> Self {
        let content = format!("{old_nick} is now known as {new_nick}");
        let mut message = Self::base(room, new_nick, fingerprint, MessageType::Nick, content);
        message.old_nick = Some(old_nick.to_string());
        message
    }

    pub fn action(room: &str, nick: &str, fingerprint: &str, action: &str) -> Self {
        Self::base(room, nick, fingerprint, MessageType::Action, action.to_string())
    }

    /// Serialize to the UTF-8 wire form.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a received payload. Fails on malformed JSON or missing fields.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Checks the UTF-8 byte length of message *content* (not the full
    /// record) against the configured cap.
    pub fn size_valid(content: &str, max: usize) -> bool {
        content.len() <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip() {
        let msg = ChatMessage::text("lobby", "alice", "A1B2C3D4", "hello there");
        let bytes = msg.encode().unwrap();
        let restored = ChatMessage::decode(&bytes).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_nick_roundtrip_keeps_old_nick() {
        let msg = ChatMessage::nick("lobby", "alice", "alicia", "A1B2C3D4");
        assert_eq!(msg.nick, "alicia");
        assert_eq!(msg.old_nick.as_deref(), Some("alice"));
        assert_eq!(msg.content, "alice is now known as alicia");

        let restored = ChatMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(msg, restored);
    }

    #[test]
    fn test_structural_phrasings() {
        let join = ChatMessage::join("lobby", "bob", "00FF00FF");
        assert_eq!(join.content, "bob has joined the room");
        assert_eq!(join.kind, MessageType::Join);

        let leave = ChatMessage::leave("lobby", "bob", "00FF00FF");
        assert_eq!(leave.content, "bob has left the room");
        assert_eq!(leave.kind, MessageType::Leave);
    }

    #[test]
    fn test_wire_field_names() {
        let msg = ChatMessage::nick("lobby", "a", "b", "A1B2C3D4");
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "nick");
        assert_eq!(json["oldNick"], "a");
        assert!(json.get("old_nick").is_none());
    }

    #[test]
    fn test_old_nick_omitted_for_text() {
        let msg = ChatMessage::text("lobby", "a", "A1B2C3D4", "hi");
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert!(json.get("oldNick").is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ChatMessage::decode(b"not json at all").is_err());
        assert!(ChatMessage::decode(b"{\"id\":\"x\"}").is_err());
        assert!(ChatMessage::decode(b"").is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ChatMessage::text("lobby", "a", "A1B2C3D4", "hi");
        let b = ChatMessage::text("lobby", "a", "A1B2C3D4", "hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_size_valid_byte_boundary() {
        let exactly = "x".repeat(4096);
        assert!(ChatMessage::size_valid(&exactly, 4096));
        let over = "x".repeat(4097);
        assert!(!ChatMessage::size_valid(&over, 4096));
        // Multi-byte characters count in bytes, not chars
        let snowman = "\u{2603}".repeat(1366); // 3 bytes each = 4098
        assert!(!ChatMessage::size_valid(&snowman, 4096));
    }
}
