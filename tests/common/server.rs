//! Scripted chat server over real TCP.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::WAIT;

/// Listens on an ephemeral localhost port.
pub struct ScriptedServer {
    listener: TcpListener,
}

impl ScriptedServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default()
    }

    /// Accept the next client.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(ServerConn {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// One accepted client connection.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl ServerConn {
    /// Send one line, CRLF appended.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line without its terminator; `None` at EOF.
    pub async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        let n = tokio::time::timeout(WAIT, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub async fn expect_line(&mut self) -> anyhow::Result<String> {
        self.recv()
            .await?
            .ok_or_else(|| anyhow::anyhow!("client closed the connection"))
    }

    /// Read the chat handshake up to `NICK` and send the welcome.
    pub async fn accept_chat(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.expect_line().await?;
            let done = line.starts_with("NICK ");
            lines.push(line);
            if done {
                break;
            }
        }
        self.send(":tmi.twitch.tv 001 ronni :Welcome, GLHF!").await?;
        Ok(lines)
    }
}
