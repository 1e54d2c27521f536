use thiserror::Error;

/// Failures decoding an overlay payload into a [`crate::ChatMessage`].
///
/// These are logged and dropped at the router; they never reach a user.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed message payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
