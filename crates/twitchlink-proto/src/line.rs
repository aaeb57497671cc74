//! Line-based codec for tokio.
//!
//! Reads CRLF- or LF-terminated lines (terminator stripped) and writes
//! CRLF-terminated lines. Partial input stays buffered until its terminator
//! arrives; nothing is ever emitted for an unterminated tail.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::{self, ProtocolError};

/// Maximum outgoing line length in bytes, CRLF included.
pub const MAX_LINE_LEN: usize = 512;

/// Default bound on buffered inbound bytes before an unterminated line is reported.
///
/// Tagged chat lines routinely exceed the classic 512 byte limit, so inbound
/// lines get a much larger allowance than outgoing ones.
pub const DEFAULT_MAX_INBOUND_LEN: usize = 16 * 1024;

/// Line codec that handles newline-terminated messages.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_inbound: usize,
    max_outgoing: usize,
    /// Set once an oversize partial line has been reported, cleared on the next line
    overflow_reported: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a codec with the default inbound and outgoing limits.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_INBOUND_LEN, MAX_LINE_LEN)
    }

    /// Create a codec with custom limits.
    pub fn with_limits(max_inbound: usize, max_outgoing: usize) -> Self {
        Self {
            next_index: 0,
            max_inbound,
            max_outgoing,
            overflow_reported: false,
        }
    }

    /// Maximum outgoing line length, CRLF included.
    pub fn max_outgoing(&self) -> usize {
        self.max_outgoing
    }

    /// Check that `line` can be sent as a single frame under `limit`.
    ///
    /// The line must be non-empty, must not carry its own terminator or a NUL,
    /// and must fit in `limit` bytes once CRLF is appended.
    pub fn validate_outgoing(line: &str, limit: usize) -> error::Result<()> {
        if line.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        if let Some(ch) = line.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(ProtocolError::IllegalControlChar(ch));
        }
        let actual = line.len() + 2;
        if actual > limit {
            return Err(ProtocolError::MessageTooLong { actual, limit });
        }
        Ok(())
    }

    /// Extract every complete line currently in `src`.
    pub fn drain_lines(&mut self, src: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line(src) {
            lines.push(line);
        }
        lines
    }

    fn next_line(&mut self, src: &mut BytesMut) -> Option<String> {
        loop {
            let start = self.next_index.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == b'\n') else {
                // No complete line yet - remember where we stopped
                self.next_index = src.len();
                if src.len() > self.max_inbound && !self.overflow_reported {
                    warn!(
                        buffered = src.len(),
                        limit = self.max_inbound,
                        "no line terminator within inbound limit, waiting for more bytes"
                    );
                    self.overflow_reported = true;
                }
                return None;
            };

            let mut line = src.split_to(start + offset + 1);
            self.next_index = 0;
            self.overflow_reported = false;

            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            // Blank keep-alive lines carry nothing to dispatch
            if line.is_empty() {
                continue;
            }

            return Some(match String::from_utf8(line.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        byte_pos = e.utf8_error().valid_up_to(),
                        "invalid UTF-8 in line, decoding lossily"
                    );
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            });
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        Ok(self.next_line(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(line) = self.next_line(src) {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            warn!(
                discarded = src.len(),
                "stream ended inside an unterminated line"
            );
            src.clear();
            self.next_index = 0;
        }
        Ok(None)
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        Self::validate_outgoing(&line, self.max_outgoing)?;
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
