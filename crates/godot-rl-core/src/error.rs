//! Error types for Godot RL

use std::io;
use thiserror::Error;

/// Result type for Godot RL operations
pub type Result<T> = std::result::Result<T, GodotRlError>;

/// Godot RL error types
#[derive(Debug, Error)]
pub enum GodotRlError {
    /// Listening address unavailable
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Payload is not valid UTF-8 JSON or carries no recognized type
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Peer went away
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation attempted after close()
    #[error("Session closed")]
    SessionClosed,

    /// Operation attempted before the handshake and env-info exchange completed
    #[error("Session not ready (state: {state})")]
    NotReady { state: String },

    /// Peer speaks an incompatible protocol version
    #[error("Protocol version mismatch: expected major {expected}, got {found}")]
    VersionMismatch { expected: String, found: String },

    /// No data arrived within the configured idle retry budget
    #[error("Idle timeout after {retries} empty reads")]
    IdleTimeout { retries: u32 },

    /// Declared frame length exceeds the configured limit
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Tuple space cannot be flattened into a single space
    #[error("Unsupported space shape: {0}")]
    UnsupportedSpaceShape(String),

    /// Bundle path has no unique base name
    #[error("Invalid path format: {0}")]
    InvalidPathFormat(String),

    /// Action does not fit the action space
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Other transport failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for GodotRlError {
    fn from(err: serde_json::Error) -> Self {
        GodotRlError::MalformedMessage(err.to_string())
    }
}

impl GodotRlError {
    /// Whether the error means the peer is gone for good
    pub fn is_disconnect(&self) -> bool {
        matches!(self, GodotRlError::ConnectionClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_malformed() {
        let err: GodotRlError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, GodotRlError::MalformedMessage(_)));
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(GodotRlError::ConnectionClosed("eof".into()).is_disconnect());
        assert!(!GodotRlError::SessionClosed.is_disconnect());
        assert!(!GodotRlError::IdleTimeout { retries: 3 }.is_disconnect());
    }
}
