//! Unified error handling for twitchlink.
//!
//! Each layer has its own error enum; [`ClientError`] wraps them for callers
//! that only care about setup failures.

use std::time::Duration;

use thiserror::Error;
use twitchlink_proto::ProtocolError;

use crate::config::ConfigError;

// ============================================================================
// Transport Errors (opening and driving a byte stream)
// ============================================================================

/// Errors raised while opening or using a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

// ============================================================================
// Send Errors (outgoing line preconditions)
// ============================================================================

/// Reasons a send was refused or failed. Nothing reaches the wire for any
/// variant except [`SendError::Transport`], where the sink itself failed.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("message is empty")]
    Empty,

    #[error("message too long: {actual} bytes (limit: {limit})")]
    TooLong { actual: usize, limit: usize },

    #[error("message contains illegal character {0:?}")]
    IllegalCharacter(char),

    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
}

impl SendError {
    /// Map a framing error to the matching precondition failure.
    pub fn from_protocol(err: ProtocolError) -> Self {
        match err {
            ProtocolError::EmptyMessage => Self::Empty,
            ProtocolError::MessageTooLong { actual, limit } => Self::TooLong { actual, limit },
            ProtocolError::IllegalControlChar(ch) => Self::IllegalCharacter(ch),
            other => Self::Transport(TransportError::Protocol(other)),
        }
    }

    /// Static reason label for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Empty => "empty",
            Self::TooLong { .. } => "too_long",
            Self::IllegalCharacter(_) => "illegal_character",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Protocol(p) => Self::from_protocol(p),
            other => Self::Transport(other),
        }
    }
}

// ============================================================================
// PubSub Errors
// ============================================================================

/// Errors from LISTEN/UNLISTEN requests.
#[derive(Debug, Error)]
pub enum PubSubError {
    /// Nothing left to send after de-duplication; no request was made.
    #[error("no topics to send")]
    NoTopics,

    #[error("failed to encode request: {0}")]
    Encode(#[source] ProtocolError),

    #[error("failed to send request: {0}")]
    Send(#[from] SendError),
}

impl From<ProtocolError> for PubSubError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::NoTopics => Self::NoTopics,
            other => Self::Encode(other),
        }
    }
}

// ============================================================================
// API Errors (REST collaborator)
// ============================================================================

/// Errors from the REST collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

// ============================================================================
// Client Errors (setup)
// ============================================================================

/// Errors that abort client construction or the binary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("api error: {0}")]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("send error: {0}")]
    Send(#[from] SendError),

    #[error("pubsub error: {0}")]
    PubSub(#[from] PubSubError),
}

impl ClientError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Api(ApiError::NotFound(_)) => "identity_not_found",
            Self::Api(_) => "api_error",
            Self::Transport(TransportError::Timeout(_)) => "connect_timeout",
            Self::Transport(_) => "transport_error",
            Self::Send(e) => e.reason(),
            Self::PubSub(PubSubError::NoTopics) => "no_topics",
            Self::PubSub(_) => "pubsub_error",
        }
    }
}
