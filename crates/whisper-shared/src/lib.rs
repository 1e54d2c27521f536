// Types shared across the Whisper crates: wire messages, identities,
// fingerprints, constants.

pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod message;
pub mod types;

pub use error::CodecError;
pub use fingerprint::{fingerprint, is_valid_fingerprint, short_fingerprint};
pub use identity::Identity;
pub use message::ChatMessage;
pub use types::{MessageType, SessionId};
