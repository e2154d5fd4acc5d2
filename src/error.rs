//! Error types for chatcast

use thiserror::Error;

/// Errors that can occur while serving chat sessions
#[derive(Debug, Error)]
pub enum ChatError {
    /// Read or write failure on a session's connection
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// No free color left in the identity pool
    #[error("identity pool exhausted: all {0} colors are in use")]
    IdentityPoolExhausted(usize),

    /// Session is not (or no longer) registered with the hub
    #[error("session not registered: {0}")]
    UnknownSession(uuid::Uuid),

    /// Outbound event could not be serialized
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;
