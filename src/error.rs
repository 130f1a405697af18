//! # Error Types
//!
//! Error handling for the peer wire protocol.
//!
//! Two layers are defined here:
//! - [`DecodeError`]: a single frame or handshake could not be turned into a
//!   message. Returned by the codec functions directly.
//! - [`ProtocolError`]: everything a connection can run into, from transport
//!   I/O failures to framing violations and use-after-close.
//!
//! ## Propagation
//! Decode errors and protocol violations are fatal to the connection that
//! produced them and to nothing else. [`ProtocolError::ConnectionClosed`] and
//! [`ProtocolError::Backpressure`] are returned to the caller of a send and do
//! not tear anything down.
//!
//! ## Example Usage
//! ```rust
//! use peer_wire::error::{DecodeError, ProtocolError};
//! use peer_wire::protocol::message::Message;
//!
//! let err = Message::decode(&[0, 0, 0, 5, 4, 0]).unwrap_err();
//! assert!(matches!(err, DecodeError::InvalidLength { .. }));
//! assert!(ProtocolError::from(err).is_fatal());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by error paths and log lines.
pub mod constants {
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_INACTIVITY_TIMEOUT: &str = "Connection timed out (no activity)";
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
}

/// Failure to decode one frame or handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is shorter than its declared or required size.
    #[error("Invalid length: expected at least {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A specific message type was requested but the frame carries another tag.
    #[error("Message id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: u8, actual: u8 },

    /// A tagged message was requested but the frame is a keep-alive.
    #[error("Frame has no message id (keep-alive)")]
    EmptyFrame,
}

/// ProtocolError is the primary error type for all connection operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol violation: frame length {length} exceeds maximum {max}")]
    ProtocolViolation { length: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Outbound queue full ({limit} pending writes)")]
    Backpressure { limit: usize },

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether this error ends the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::Decode(_) | ProtocolError::ProtocolViolation { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ProtocolError::from(DecodeError::EmptyFrame).is_fatal());
        assert!(ProtocolError::ProtocolViolation { length: 10, max: 5 }.is_fatal());
        assert!(ProtocolError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!ProtocolError::ConnectionClosed.is_fatal());
        assert!(!ProtocolError::Backpressure { limit: 1 }.is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = DecodeError::IdMismatch {
            expected: 4,
            actual: 7,
        };
        assert_eq!(err.to_string(), "Message id mismatch: expected 4, got 7");

        let err = ProtocolError::ProtocolViolation {
            length: 2_000_000,
            max: 1_048_576,
        };
        assert!(err.to_string().contains("2000000"));
    }
}
