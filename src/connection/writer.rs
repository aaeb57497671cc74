//! Serialized access to the outgoing half of a transport.

use futures_util::SinkExt;
use tokio::sync::Mutex;
use twitchlink_proto::LineCodec;

use crate::error::{SendError, TransportError};
use crate::transport::LineSink;

/// The single writer of a connection. Every line is validated before the
/// sink lock is taken, so a refused line never reaches the wire.
pub struct Outbound {
    sink: Mutex<Option<LineSink>>,
    max_line_len: Option<usize>,
}

impl Outbound {
    pub fn new(max_line_len: Option<usize>) -> Self {
        Self {
            sink: Mutex::new(None),
            max_line_len,
        }
    }

    /// Check send preconditions that do not depend on the transport.
    pub fn validate(&self, line: &str) -> Result<(), SendError> {
        LineCodec::validate_outgoing(line, self.max_line_len.unwrap_or(usize::MAX))
            .map_err(SendError::from_protocol)
    }

    pub async fn install(&self, sink: LineSink) {
        *self.sink.lock().await = Some(sink);
    }

    /// Remove the sink, leaving the writer disconnected.
    pub async fn take(&self) -> Option<LineSink> {
        self.sink.lock().await.take()
    }

    pub async fn is_attached(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Validate and write one line.
    pub async fn send(&self, line: String) -> Result<(), SendError> {
        self.validate(&line)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(SendError::NotConnected)?;
        sink.send(line).await.map_err(SendError::from)
    }
}

/// Close `sink`, flushing anything buffered.
pub async fn close_sink(sink: &mut LineSink) -> Result<(), TransportError> {
    sink.close().await
}
