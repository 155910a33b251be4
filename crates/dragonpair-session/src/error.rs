//! Session error types

use thiserror::Error;

/// Errors raised while driving the messaging client
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to spawn bridge '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Messaging client is already running")]
    AlreadyRunning,

    #[error("Messaging client failed to initialize: {0}")]
    Initialize(String),

    #[error("Messaging client exited: {0}")]
    Exited(String),

    #[error("Event receiver closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
