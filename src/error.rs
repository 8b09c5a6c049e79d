//! # Error Types
//!
//! Comprehensive error handling for the framing core.
//!
//! This module defines all error variants that can occur during session
//! operations, from low-level I/O failures to frame-level protocol violations.
//!
//! ## Error Categories
//! - **Transport errors**: I/O failures on read or write; fatal for the
//!   session that hit them, invisible to every other session
//! - **Framing errors**: malformed or oversized declared lengths; fatal for
//!   the session, the offending frame is never dispatched
//! - **Handler errors**: failures raised inside a dispatched handler; caught
//!   at the dispatch site, the session stays open
//! - **Configuration errors**: invalid or unreadable configuration
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Primary error type for all framing and session operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes remained unread than the caller asked for. This is the
    /// buffer's hard contract: never a silent short read.
    #[error("buffer underflow: requested {requested} bytes, {available} unread")]
    BufferUnderflow { requested: usize, available: usize },

    /// A frame header declared a negative payload length.
    #[error("malformed frame length: {0}")]
    MalformedLength(i32),

    /// A frame header declared a payload larger than the configured maximum.
    #[error("oversized frame: declared {declared} bytes, maximum {max}")]
    OversizedFrame { declared: usize, max: usize },

    /// An outgoing payload is too large to describe with an i32 length field.
    #[error("payload too large to frame: {0} bytes")]
    OversizedPayload(usize),

    /// A dispatched handler failed. Contained per-dispatch.
    #[error("handler failed for command {command_id}: {reason}")]
    Handler { command_id: i32, reason: String },

    /// No handler bound for the parsed command id.
    #[error("no handler registered for command {0}")]
    UnregisteredCommand(i32),

    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue for a session is at capacity.
    #[error("send queue full")]
    SendQueueFull,

    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Failure reported by the persistence collaborator.
    #[error("store error: {0}")]
    StoreError(String),
}

impl ProtocolError {
    /// Whether this error ends the session that produced it.
    ///
    /// Handler and unregistered-command errors are contained per-dispatch;
    /// everything transport- or framing-shaped is fatal for the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::Handler { .. } | ProtocolError::UnregisteredCommand(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting_is_never_empty() {
        let errors = vec![
            ProtocolError::BufferUnderflow {
                requested: 8,
                available: 3,
            },
            ProtocolError::MalformedLength(-1),
            ProtocolError::OversizedFrame {
                declared: 20_000_000,
                max: 16_777_216,
            },
            ProtocolError::Handler {
                command_id: 7,
                reason: "boom".into(),
            },
            ProtocolError::UnregisteredCommand(42),
            ProtocolError::ConnectionClosed,
            ProtocolError::SendQueueFull,
            ProtocolError::Io(std::io::Error::other("test error")),
        ];

        for err in errors {
            assert!(!format!("{err}").is_empty());
        }
    }

    #[test]
    fn fatality_split_matches_taxonomy() {
        assert!(ProtocolError::MalformedLength(-5).is_fatal());
        assert!(ProtocolError::Io(std::io::Error::other("x")).is_fatal());
        assert!(!ProtocolError::UnregisteredCommand(9).is_fatal());
        assert!(!ProtocolError::Handler {
            command_id: 1,
            reason: "bad payload".into()
        }
        .is_fatal());
    }
}
