//! In-memory transport.
//!
//! Every successful `connect` hands a fresh [`RemoteEnd`] to the test
//! through [`Remotes`], so the test plays the server for each transport
//! the client opens.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, stream};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;
use twitchlink::error::TransportError;
use twitchlink::transport::{Connector, TransportParts};

use super::WAIT;

struct Shared {
    accepted: mpsc::UnboundedSender<RemoteEnd>,
    attempts: AtomicUsize,
    failures: AtomicUsize,
}

/// Connector whose transports are channel pairs.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    pub fn new() -> (Self, Remotes) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                accepted: tx,
                attempts: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
            }),
        };
        (connector, Remotes { rx })
    }

    /// Make the next `n` connects fail.
    #[allow(dead_code)]
    pub fn fail_next(&self, n: usize) {
        self.shared.failures.store(n, Ordering::SeqCst);
    }

    /// Connect attempts so far, failed ones included.
    #[allow(dead_code)]
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn endpoint(&self) -> String {
        "memory://test".to_string()
    }

    async fn connect(&self) -> Result<TransportParts, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .shared
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Io(
                std::io::ErrorKind::ConnectionRefused.into(),
            ));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel::<Result<String, TransportError>>();
        let (client_tx, from_client) = mpsc::channel::<String>(256);

        let reader = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let writer = PollSender::new(client_tx)
            .sink_map_err(|_| TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));

        let _ = self.shared.accepted.send(RemoteEnd {
            to_client,
            from_client,
        });
        Ok(TransportParts::new(Box::pin(reader), Box::pin(writer)))
    }
}

/// Transports accepted by a [`MemoryConnector`], in connect order.
pub struct Remotes {
    rx: mpsc::UnboundedReceiver<RemoteEnd>,
}

impl Remotes {
    /// The next opened transport.
    pub async fn next(&mut self) -> RemoteEnd {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Whether a transport was opened within `window`.
    #[allow(dead_code)]
    pub async fn opened_within(&mut self, window: Duration) -> bool {
        matches!(tokio::time::timeout(window, self.rx.recv()).await, Ok(Some(_)))
    }
}

/// The server side of one in-memory transport. Dropping it closes the
/// client's read stream.
pub struct RemoteEnd {
    to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: mpsc::Receiver<String>,
}

#[allow(dead_code)]
impl RemoteEnd {
    /// Deliver one line to the client.
    pub fn send(&self, line: &str) {
        let _ = self.to_client.send(Ok(line.to_string()));
    }

    /// Fail the client's read stream.
    pub fn fail(&self, kind: std::io::ErrorKind) {
        let _ = self.to_client.send(Err(TransportError::Io(kind.into())));
    }

    /// Next line from the client; `None` once the client closed its sink.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client line")
    }

    /// Next line, which must be present.
    pub async fn expect_line(&mut self) -> String {
        self.recv().await.expect("client closed the transport")
    }

    /// Whether the client sent anything within `window`.
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.from_client.recv())
            .await
            .is_err()
    }

    /// Read the chat handshake up to `NICK` without answering it.
    pub async fn read_handshake(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.expect_line().await;
            let done = line.starts_with("NICK ");
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    /// Play the chat server: read the handshake and accept it.
    /// Returns the handshake lines.
    pub async fn accept_chat(&mut self) -> Vec<String> {
        let lines = self.read_handshake().await;
        self.send(":tmi.twitch.tv 001 ronni :Welcome, GLHF!");
        lines
    }
}
