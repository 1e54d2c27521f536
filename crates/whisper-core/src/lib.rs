// The chat core: directory, room routing, per-session state machines and
// the command surface. Everything here is transport-agnostic; the SSH/TUI
// collaborator drives it through `ChatServer::open_session` and `UiEvent`.

pub mod buffer;
pub mod command;
pub mod config;
pub mod directory;
pub mod events;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod session;

pub use buffer::BoundedBuffer;
pub use config::WhisperConfig;
pub use directory::{ChatDirectory, DirectoryEvent, MessageOrigin, UserInfo};
pub use events::UiEvent;
pub use rate_limit::RateLimiter;
pub use router::{RoomRouter, RouterError, RouterHub};
pub use server::ChatServer;
pub use session::ChatSession;
