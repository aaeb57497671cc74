//! Error types for the protocol layer.
//!
//! This module defines errors for line framing, IRC message parsing and
//! PubSub envelope encoding/decoding.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error surfaced through a codec.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Outgoing line exceeded the maximum allowed length (terminator included).
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Actual line length, including the CRLF terminator.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Outgoing line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Outgoing line contained a character that would break framing.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// A subscription request ended up with no topics after de-duplication.
    #[error("subscription request has no topics")]
    NoTopics,

    /// JSON encoding or decoding of a PubSub envelope failed.
    #[error("invalid pubsub payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Invalid message prefix.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// Parse failure with position context.
    #[error("parse error at position {position}: {context}")]
    ParseContext {
        /// Byte offset where parsing failed.
        position: usize,
        /// Description of what was expected.
        context: String,
    },
}
