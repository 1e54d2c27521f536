//! The process-wide chat directory.
//!
//! Single authority for who is connected, which room they are in, and the
//! bounded per-room message history. Every session subscribes to the
//! directory's broadcast channel and filters events by its own room; the
//! channel is the in-process fan-out path between co-located sessions.
//!
//! Locking discipline: one mutex over users and histories, held only for
//! the mutation itself. Events are sent after the lock is released, so
//! subscribers observe the committed state and may call back into
//! read-only operations freely.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::warn;

use whisper_shared::{ChatMessage, SessionId};

use crate::buffer::BoundedBuffer;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One connected user, as the directory sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub session_id: SessionId,
    pub nick: String,
    pub fingerprint: String,
    pub room: String,
    /// Milliseconds since epoch
    pub joined_at: i64,
}

/// Where a recorded message came from.
///
/// `Local` messages were sent by a session in this process and are
/// rendered to other co-located sessions through directory events;
/// `Remote` messages arrived over the overlay and are rendered by the
/// router's inbound dispatch instead, so listeners skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Local(SessionId),
    Remote,
}

#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    UserJoined(UserInfo),
    UserLeft(UserInfo),
    NickChanged { user: UserInfo, old_nick: String },
    RoomChanged { user: UserInfo, old_room: String },
    Message { message: ChatMessage, origin: MessageOrigin },
}

#[derive(Default)]
struct DirectoryInner {
    users: HashMap<SessionId, UserInfo>,
    room_messages: HashMap<String, BoundedBuffer<ChatMessage>>,
}

pub struct ChatDirectory {
    inner: Mutex<DirectoryInner>,
    events: broadcast::Sender<DirectoryEvent>,
    max_messages_per_room: usize,
}

impl ChatDirectory {
    pub fn new(max_messages_per_room: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(DirectoryInner::default()),
            events,
            max_messages_per_room,
        }
    }

    /// Subscribe to directory events. Slow consumers that lag behind the
    /// channel capacity miss events and should refresh their view.
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: DirectoryEvent) {
        // Err just means no session is listening right now
        let _ = self.events.send(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryInner> {
        self.inner.lock().expect("directory lock poisoned")
    }

    /// Register a connected user. The session id must be fresh; reusing a
    /// live id is a caller bug and replaces the previous entry.
    pub fn add_user(
        &self,
        session_id: SessionId,
        nick: &str,
        fingerprint: &str,
        room: &str,
    ) -> UserInfo {
        let user = UserInfo {
            session_id,
            nick: nick.to_string(),
            fingerprint: fingerprint.to_string(),
            room: room.to_string(),
            joined_at: Utc::now().timestamp_millis(),
        };
        {
            let mut inner = self.lock();
            if inner.users.insert(session_id, user.clone()).is_some() {
                warn!(session = %session_id, "Replaced existing directory entry");
            }
        }
        self.emit(DirectoryEvent::UserJoined(user.clone()));
        user
    }

    pub fn remove_user(&self, session_id: SessionId) -> Option<UserInfo> {
        let removed = {
            let mut inner = self.lock();
            inner.users.remove(&session_id)
        };
        if let Some(ref user) = removed {
            self.emit(DirectoryEvent::UserLeft(user.clone()));
        }
        removed
    }

    /// Update a user's nick in place. Uniqueness is the caller's concern
    /// (see [`ChatDirectory::is_nick_taken`]).
    pub fn set_nick(&self, session_id: SessionId, new_nick: &str) -> bool {
        let updated = {
            let mut inner = self.lock();
            match inner.users.get_mut(&session_id) {
                Some(user) => {
                    let old_nick = std::mem::replace(&mut user.nick, new_nick.to_string());
                    Some((user.clone(), old_nick))
                }
                None => None,
            }
        };
        match updated {
            Some((user, old_nick)) => {
                self.emit(DirectoryEvent::NickChanged { user, old_nick });
                true
            }
            None => false,
        }
    }

    pub fn set_room(&self, session_id: SessionId, new_room: &str) -> bool {
        let updated = {
            let mut inner = self.lock();
            match inner.users.get_mut(&session_id) {
                Some(user) => {
                    let old_room = std::mem::replace(&mut user.room, new_room.to_string());
                    Some((user.clone(), old_room))
                }
                None => None,
            }
        };
        match updated {
            Some((user, old_room)) => {
                self.emit(DirectoryEvent::RoomChanged { user, old_room });
                true
            }
            None => false,
        }
    }

    pub fn get_user(&self, session_id: SessionId) -> Option<UserInfo> {
        self.lock().users.get(&session_id).cloned()
    }

    /// First user carrying this fingerprint. Fingerprints are not unique;
    /// display surfaces only.
    pub fn get_user_by_fingerprint(&self, fingerprint: &str) -> Option<UserInfo> {
        self.lock()
            .users
            .values()
            .find(|u| u.fingerprint == fingerprint)
            .cloned()
    }

    /// Snapshot of the users currently in `room`.
    pub fn get_users_in_room(&self, room: &str) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self
            .lock()
            .users
            .values()
            .filter(|u| u.room == room)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        users
    }

    /// Rooms that are occupied or hold recorded history.
    pub fn get_known_rooms(&self) -> Vec<String> {
        let inner = self.lock();
        let mut rooms: HashSet<String> = inner.room_messages.keys().cloned().collect();
        rooms.extend(inner.users.values().map(|u| u.room.clone()));
        let mut rooms: Vec<String> = rooms.into_iter().collect();
        rooms.sort();
        rooms
    }

    pub fn get_user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Record a message in its room's bounded history (created lazily).
    /// The event fires after the insertion is committed, so subscribers
    /// already see the message in `get_recent_messages`.
    pub fn add_message(&self, message: ChatMessage, origin: MessageOrigin) {
        let max = self.max_messages_per_room;
        {
            let mut inner = self.lock();
            inner
                .room_messages
                .entry(message.room.clone())
                .or_insert_with(|| BoundedBuffer::new(max))
                .push(message.clone());
        }
        self.emit(DirectoryEvent::Message { message, origin });
    }

    /// Snapshot of a room's recent history, oldest first. Empty for
    /// unknown rooms. `count` of `None` returns the whole buffer.
    pub fn get_recent_messages(&self, room: &str, count: Option<usize>) -> Vec<ChatMessage> {
        let inner = self.lock();
        match inner.room_messages.get(room) {
            Some(buffer) => match count {
                Some(n) => buffer.get_last(n),
                None => buffer.get_all(),
            },
            None => Vec::new(),
        }
    }

    /// Case-insensitive nick collision check scoped to one room.
    /// `exclude` lets a session re-assert its own nick.
    pub fn is_nick_taken(&self, nick: &str, room: &str, exclude: Option<SessionId>) -> bool {
        let wanted = nick.to_lowercase();
        self.lock().users.values().any(|u| {
            u.room == room
                && u.nick.to_lowercase() == wanted
                && Some(u.session_id) != exclude
        })
    }
}
