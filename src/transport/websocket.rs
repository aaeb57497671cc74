//! PubSub transport: one JSON envelope per WebSocket text frame.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future, stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use super::{Connector, TransportParts};
use crate::error::TransportError;

/// Connects to a WebSocket endpoint and exposes text frames as lines.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    async fn connect(&self) -> Result<TransportParts, TransportError> {
        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;
        debug!(url = %self.url, status = %response.status(), "websocket handshake completed");

        let (sink, source) = ws.split();

        // A text frame normally holds one envelope, but tolerate several
        // newline-separated ones.
        let reader = source
            .take_while(|msg| future::ready(!matches!(msg, Ok(WsMessage::Close(_)))))
            .flat_map(|msg| {
                let lines: Vec<Result<String, TransportError>> = match msg {
                    Ok(WsMessage::Text(text)) => text
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(|l| Ok(l.to_owned()))
                        .collect(),
                    Ok(WsMessage::Binary(data)) => {
                        warn!(len = data.len(), "ignoring binary websocket frame");
                        Vec::new()
                    }
                    Ok(_) => Vec::new(),
                    Err(e) => vec![Err(TransportError::from(e))],
                };
                stream::iter(lines)
            });

        let writer = sink.with(|line: String| {
            future::ready(Ok::<_, TransportError>(WsMessage::Text(line)))
        });

        Ok(TransportParts::new(Box::pin(reader), Box::pin(writer)))
    }
}
