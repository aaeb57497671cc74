//! Transports that carry protocol lines.
//!
//! A [`Connector`] opens a fresh byte stream and hands back a pair of
//! type-erased halves: a stream of decoded lines and a sink of outgoing
//! lines. The connection layer never sees sockets directly, so chat (TCP,
//! optionally TLS) and PubSub (WebSocket) share one lifecycle.

mod tcp;
mod websocket;

pub use tcp::TcpConnector;
pub use websocket::WebSocketConnector;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

use crate::error::TransportError;

/// Inbound half: one item per complete line, terminator stripped.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Outbound half: accepts one line at a time, terminator added by the transport.
pub type LineSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// The two halves of an open transport.
pub struct TransportParts {
    pub reader: LineStream,
    pub writer: LineSink,
}

impl TransportParts {
    pub fn new(reader: LineStream, writer: LineSink) -> Self {
        Self { reader, writer }
    }
}

/// Opens transports to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Endpoint identity for logs and events.
    fn endpoint(&self) -> String;

    /// Open a new transport. Any partially acquired resources are released
    /// before an error is returned.
    async fn connect(&self) -> Result<TransportParts, TransportError>;
}
