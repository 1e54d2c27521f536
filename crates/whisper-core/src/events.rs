//! Events crossing the UI boundary.
//!
//! The SSH/terminal collaborator owns rendering; the core hands it a
//! stream of typed events through the unbounded sender supplied at
//! session construction.

use whisper_shared::ChatMessage;

use crate::directory::UserInfo;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A chat message to render (someone else's, or the local echo).
    Message(ChatMessage),
    /// Out-of-band notice for this user only.
    System(String),
    /// The current room's user list changed.
    UserList(Vec<UserInfo>),
    /// This session moved to another room.
    RoomChanged { room: String },
    /// Wipe the message area.
    Clear,
    /// The session ended; the transport should close.
    Disconnected,
}
