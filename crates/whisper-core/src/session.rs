//! The per-user session state machine.
//!
//! A session binds one connected user's ephemeral identity, nick, current
//! room, and rate limiter to the shared directory and the room router. The
//! transport collaborator feeds it input lines and consumes [`UiEvent`]s;
//! everything else happens here.
//!
//! Input handling within one session is serialized by construction: the
//! transport calls `handle_input` one line at a time through `&mut self`.
//! The directory listener and the inbound room handler run on their own
//! tasks and only touch the small shared view (id, fingerprint, nick,
//! room, UI sender).

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use whisper_shared::fingerprint::short_fingerprint;
use whisper_shared::{ChatMessage, Identity, SessionId};

use crate::command;
use crate::config::WhisperConfig;
use crate::directory::{ChatDirectory, DirectoryEvent, MessageOrigin};
use crate::events::UiEvent;
use crate::rate_limit::RateLimiter;
use crate::router::{InboundHandler, RoomRouter, RouterHub};

/// The slice of session state visible to background tasks.
pub(crate) struct SessionShared {
    id: SessionId,
    fingerprint: String,
    nick: Mutex<String>,
    room: Mutex<String>,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl SessionShared {
    fn send_ui(&self, event: UiEvent) {
        // A closed receiver means the transport is gone; cleanup follows
        // through disconnect, nothing to do here.
        let _ = self.ui.send(event);
    }

    fn system(&self, text: impl Into<String>) {
        self.send_ui(UiEvent::System(text.into()));
    }

    fn current_room(&self) -> String {
        self.room.lock().expect("session lock poisoned").clone()
    }

    fn set_room(&self, room: &str) {
        *self.room.lock().expect("session lock poisoned") = room.to_string();
    }

    fn current_nick(&self) -> String {
        self.nick.lock().expect("session lock poisoned").clone()
    }

    fn set_nick(&self, nick: &str) {
        *self.nick.lock().expect("session lock poisoned") = nick.to_string();
    }
}

pub struct ChatSession {
    shared: Arc<SessionShared>,
    directory: Arc<ChatDirectory>,
    config: Arc<WhisperConfig>,
    router: RoomRouter,
    rate_limiter: RateLimiter,
    connected: bool,
    listener: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(
        identity: &Identity,
        hub: Arc<RouterHub>,
        directory: Arc<ChatDirectory>,
        config: Arc<WhisperConfig>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let id = SessionId::new();
        let fingerprint = identity.fingerprint();
        let nick = format!("anon_{}", &fingerprint[..6]);

        let shared = Arc::new(SessionShared {
            id,
            fingerprint,
            nick: Mutex::new(nick),
            room: Mutex::new(config.default_room.clone()),
            ui,
        });

        Self {
            shared,
            directory,
            rate_limiter: RateLimiter::new(config.rate_limit),
            router: RoomRouter::new(id, hub),
            config,
            connected: false,
            listener: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.shared.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.shared.fingerprint
    }

    pub fn nick(&self) -> String {
        self.shared.current_nick()
    }

    pub fn room(&self) -> String {
        self.shared.current_room()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    /// Register with the directory, attach listeners, join the default
    /// room, and greet the user.
    pub async fn start(&mut self) {
        let nick = self.shared.current_nick();
        let room = self.shared.current_room();

        self.directory
            .add_user(self.shared.id, &nick, &self.shared.fingerprint, &room);
        self.spawn_directory_listener();

        self.join_room(&room).await;
        self.connected = true;

        self.shared
            .system(format!("Welcome to Whisper! You are {nick}"));
        self.shared.system(format!(
            "Your fingerprint is {}. Messages are ephemeral and never stored.",
            self.shared.fingerprint
        ));
        self.shared.system("Type /help for available commands");
    }

    /// One line of user input: empty lines are dropped, slash lines go to
    /// the command processor, everything else is a text send.
    pub async fn handle_input(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }
        if line.starts_with('/') {
            command::dispatch(self, line).await;
        } else {
            self.send_message(line).await;
        }
    }

    /// Publish a text message: rate limit, size check, publish, then echo
    /// and record. Echo and history happen only on a successful publish.
    pub async fn send_message(&mut self, text: &str) {
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }
        if !self.rate_limiter.record() {
            self.shared.system("Rate limit exceeded, slow down");
            return;
        }
        if !ChatMessage::size_valid(text, self.config.max_message_size) {
            self.shared.system(format!(
                "Message too long (maximum {} bytes)",
                self.config.max_message_size
            ));
            return;
        }

        let room = self.shared.current_room();
        let message = ChatMessage::text(
            &room,
            &self.shared.current_nick(),
            &self.shared.fingerprint,
            text,
        );

        match self.router.send_message(&room, &message).await {
            Ok(()) => {
                self.shared.send_ui(UiEvent::Message(message.clone()));
                self.directory
                    .add_message(message, MessageOrigin::Local(self.shared.id));
            }
            Err(e) => {
                warn!(room = %room, error = %e, "Failed to publish message");
                self.shared.system("Failed to send message");
            }
        }
    }

    /// `/me` emotes. Rate limited like text, but not size checked.
    pub async fn send_action(&mut self, text: &str) {
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }
        if !self.rate_limiter.record() {
            self.shared.system("Rate limit exceeded, slow down");
            return;
        }

        let room = self.shared.current_room();
        let message = ChatMessage::action(
            &room,
            &self.shared.current_nick(),
            &self.shared.fingerprint,
            text,
        );

        match self.router.send_message(&room, &message).await {
            Ok(()) => {
                self.shared.send_ui(UiEvent::Message(message.clone()));
                self.directory
                    .add_message(message, MessageOrigin::Local(self.shared.id));
            }
            Err(e) => {
                warn!(room = %room, error = %e, "Failed to publish action");
                self.shared.system("Failed to send message");
            }
        }
    }

    /// Rename this user. Room-scoped uniqueness is enforced here; a failed
    /// publish does not roll the rename back.
    pub async fn change_nick(&mut self, new_nick: &str) {
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }

        let old_nick = self.shared.current_nick();
        if new_nick == old_nick {
            self.shared
                .system(format!("You are already known as {new_nick}"));
            return;
        }

        let room = self.shared.current_room();
        if self
            .directory
            .is_nick_taken(new_nick, &room, Some(self.shared.id))
        {
            self.shared.system(format!(
                "Nickname '{new_nick}' is already taken in this room"
            ));
            return;
        }

        self.shared.set_nick(new_nick);
        self.directory.set_nick(self.shared.id, new_nick);

        let message =
            ChatMessage::nick(&room, &old_nick, new_nick, &self.shared.fingerprint);
        if let Err(e) = self.router.send_message(&room, &message).await {
            warn!(room = %room, error = %e, "Failed to publish nick change");
        }
        self.directory
            .add_message(message, MessageOrigin::Local(self.shared.id));

        self.shared
            .system(format!("You are now known as {new_nick}"));
    }

    /// Move to another room: leave the old one, subscribe to the new one,
    /// announce, and replay its recent history.
    pub async fn join_room(&mut self, new_room: &str) {
        let current = self.shared.current_room();
        if self.connected && new_room == current {
            self.shared
                .system(format!("You are already in #{new_room}"));
            return;
        }

        let nick = self.shared.current_nick();
        if self.connected {
            let leave = ChatMessage::leave(&current, &nick, &self.shared.fingerprint);
            if let Err(e) = self.router.send_message(&current, &leave).await {
                warn!(room = %current, error = %e, "Failed to publish leave");
            }
            self.router.leave_room(&current).await;
        }

        self.shared.set_room(new_room);
        self.directory.set_room(self.shared.id, new_room);

        let handler: InboundHandler = {
            let shared = self.shared.clone();
            Arc::new(move |message: ChatMessage| {
                if message.fingerprint == shared.fingerprint {
                    return;
                }
                shared.send_ui(UiEvent::Message(message));
            })
        };
        self.router.join_room(new_room, handler).await;

        let join = ChatMessage::join(new_room, &nick, &self.shared.fingerprint);
        if let Err(e) = self.router.send_message(new_room, &join).await {
            warn!(room = %new_room, error = %e, "Failed to publish join");
        }
        self.directory
            .add_message(join, MessageOrigin::Local(self.shared.id));

        self.shared.send_ui(UiEvent::RoomChanged {
            room: new_room.to_string(),
        });
        self.refresh_user_list();
        self.shared.system(format!("Joined #{new_room}"));

        let recent: Vec<ChatMessage> = self
            .directory
            .get_recent_messages(new_room, None)
            .into_iter()
            .filter(|m| m.fingerprint != self.shared.fingerprint)
            .collect();
        if !recent.is_empty() {
            self.shared.system("--- Recent messages ---");
            for message in recent {
                self.shared.send_ui(UiEvent::Message(message));
            }
            self.shared.system("--- End of history ---");
        }
    }

    pub fn show_user_list(&self) {
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }
        let room = self.shared.current_room();
        let users = self.directory.get_users_in_room(&room);
        let mut lines = vec![format!("Users in #{room} ({}):", users.len())];
        for user in users {
            lines.push(format!(
                "  {} [{}]",
                user.nick,
                short_fingerprint(&user.fingerprint)
            ));
        }
        self.shared.system(lines.join("\n"));
    }

    pub fn show_room_list(&self) {
        if !self.connected {
            self.shared.system("Not connected");
            return;
        }
        let current = self.shared.current_room();
        let rooms = self.directory.get_known_rooms();
        let mut lines = vec![format!("Rooms ({}):", rooms.len())];
        for room in rooms {
            let count = self.directory.get_users_in_room(&room).len();
            let marker = if room == current { "*" } else { " " };
            lines.push(format!("{marker} #{room} ({count} users)"));
        }
        self.shared.system(lines.join("\n"));
    }

    pub fn clear_messages(&self) {
        self.shared.send_ui(UiEvent::Clear);
    }

    pub fn show_system_message(&self, text: &str) {
        self.shared.system(text);
    }

    /// Leave the overlay and the directory. Idempotent; safe to call from
    /// any exit path, including transport errors.
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let room = self.shared.current_room();
        let leave = ChatMessage::leave(
            &room,
            &self.shared.current_nick(),
            &self.shared.fingerprint,
        );
        if let Err(e) = self.router.send_message(&room, &leave).await {
            warn!(room = %room, error = %e, "Failed to publish leave on disconnect");
        }

        self.router.destroy().await;
        self.directory.remove_user(self.shared.id);
        self.shared.send_ui(UiEvent::Disconnected);
        debug!(session = %self.shared.id, "Session disconnected");
    }

    /// Disconnect and detach the directory listener.
    pub async fn destroy(&mut self) {
        self.disconnect().await;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    fn refresh_user_list(&self) {
        let room = self.shared.current_room();
        self.shared
            .send_ui(UiEvent::UserList(self.directory.get_users_in_room(&room)));
    }

    fn spawn_directory_listener(&mut self) {
        let shared = self.shared.clone();
        let directory = self.directory.clone();
        let mut rx = self.directory.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handle_directory_event(&shared, &directory, event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            session = %shared.id,
                            missed,
                            "Directory listener lagged, refreshing user list"
                        );
                        let room = shared.current_room();
                        shared.send_ui(UiEvent::UserList(
                            directory.get_users_in_room(&room),
                        ));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.listener = Some(handle);
    }
}

/// Directory listener discipline: render co-located traffic for the
/// current room, refresh the user list on membership churn.
fn handle_directory_event(
    shared: &Arc<SessionShared>,
    directory: &Arc<ChatDirectory>,
    event: DirectoryEvent,
) {
    let room = shared.current_room();
    let refresh = |why: &str| {
        debug!(session = %shared.id, why, "Refreshing user list");
        shared.send_ui(UiEvent::UserList(directory.get_users_in_room(&room)));
    };

    match event {
        DirectoryEvent::Message { message, origin } => {
            if message.room != room || message.fingerprint == shared.fingerprint {
                return;
            }
            // Remote messages were already rendered by the room handler
            if let MessageOrigin::Local(sender) = origin {
                if sender != shared.id {
                    shared.send_ui(UiEvent::Message(message));
                }
            }
        }
        DirectoryEvent::UserJoined(user) => {
            if user.room == room && user.session_id != shared.id {
                refresh("user joined");
            }
        }
        DirectoryEvent::UserLeft(user) => {
            if user.room == room && user.session_id != shared.id {
                refresh("user left");
            }
        }
        DirectoryEvent::NickChanged { user, .. } => {
            if user.room == room && user.session_id != shared.id {
                refresh("nick changed");
            }
        }
        DirectoryEvent::RoomChanged { user, old_room } => {
            if user.session_id == shared.id {
                return;
            }
            if user.room == room || old_room == room {
                refresh("room changed");
            }
        }
    }
}
