//! Error types for the voxlink session client

use thiserror::Error;

/// Result type alias for voxlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voxlink session client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing endpoint/credential, bad values)
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/connection error
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error (malformed or unexpected wire data)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Audio error (codec, sink, scheduling)
    #[error("audio error: {0}")]
    Audio(String),

    /// Avatar peer negotiation error
    #[error("avatar error: {0}")]
    Avatar(String),

    /// Tool execution error
    #[error("tool error: {0}")]
    Tool(String),

    /// Session is not connected
    #[error("session not connected")]
    NotConnected,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
