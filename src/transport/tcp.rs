//! Chat transport: TCP, optionally wrapped in TLS, framed into lines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use twitchlink_proto::LineCodec;

use super::{Connector, TransportParts};
use crate::error::TransportError;

/// Connects to a chat server over TCP.
#[derive(Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Plain TCP connector.
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// TLS connector trusting the platform's native roots.
    pub fn tls(host: impl Into<String>, port: u16) -> Self {
        Self {
            tls: Some(Arc::new(native_client_config())),
            ..Self::plain(host, port)
        }
    }

    /// TLS connector with a caller-supplied rustls config.
    pub fn with_tls_config(host: impl Into<String>, port: u16, config: Arc<ClientConfig>) -> Self {
        Self {
            tls: Some(config),
            ..Self::plain(host, port)
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn open(&self) -> Result<TransportParts, TransportError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!("failed to set TCP_NODELAY: {}", e);
        }

        match &self.tls {
            None => Ok(framed_parts(stream)),
            Some(config) => {
                let server_name = ServerName::try_from(self.host.clone())
                    .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
                let tls_stream = TlsConnector::from(config.clone())
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                info!(host = %self.host, "TLS handshake completed");
                Ok(framed_parts(tls_stream))
            }
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    fn endpoint(&self) -> String {
        let scheme = if self.tls.is_some() { "ircs" } else { "irc" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    async fn connect(&self) -> Result<TransportParts, TransportError> {
        match tokio::time::timeout(self.connect_timeout, self.open()).await {
            Ok(result) => result,
            // The in-flight socket is dropped with the timed-out future
            Err(_) => Err(TransportError::Timeout(self.connect_timeout)),
        }
    }
}

fn framed_parts<S>(stream: S) -> TransportParts
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (sink, stream) = Framed::new(stream, LineCodec::new()).split();
    TransportParts::new(
        Box::pin(stream.map(|item| item.map_err(TransportError::from))),
        Box::pin(sink.sink_map_err(TransportError::from)),
    )
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

fn native_client_config() -> ClientConfig {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("Error loading native certs: {}", e);
    }

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn plain_connector_frames_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"PING :tmi.twitch.tv\r\nPRIVMSG #a :hi\nPAR")
                .await
                .unwrap();
            let mut buf = vec![0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let connector = TcpConnector::plain("127.0.0.1", port);
        assert_eq!(connector.endpoint(), format!("irc://127.0.0.1:{}", port));

        let mut parts = connector.connect().await.unwrap();
        assert_eq!(
            parts.reader.next().await.unwrap().unwrap(),
            "PING :tmi.twitch.tv"
        );
        assert_eq!(parts.reader.next().await.unwrap().unwrap(), "PRIVMSG #a :hi");

        parts
            .writer
            .send("PONG :tmi.twitch.tv".to_string())
            .await
            .unwrap();
        assert_eq!(server.await.unwrap(), "PONG :tmi.twitch.tv\r\n");
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpConnector::plain("127.0.0.1", port).connect().await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
