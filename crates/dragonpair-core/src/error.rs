//! Error types for dragonpair

use thiserror::Error;

/// Main error type for dragonpair core operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using dragonpair's Error
pub type Result<T> = std::result::Result<T, Error>;
