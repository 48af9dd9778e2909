//! IRC message codec for tokio.
//!
//! Reads newline-terminated lines and parses them into [`Message`]s; writes
//! messages back out with a CRLF terminator.
//!
//! Only socket errors surface from the decoder. Oversized, non-UTF-8 and
//! unparseable lines are logged at debug and skipped so one odd line cannot
//! end the session.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use super::message::Message;
use crate::error::ProtocolError;

/// Classic IRC line limit, including CRLF.
pub const MAX_LINE_LEN: usize = 512;

/// Tokio codec for encoding/decoding IRC [`Message`]s.
#[derive(Debug)]
pub struct IrcCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    /// Dropping the tail of an oversized line until its newline shows up.
    discarding: bool,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Servers that advertise IRCv3 tags may send longer lines.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// Truncate outgoing data at the first line ending so a parameter can
    /// never smuggle a second command onto the wire.
    pub fn sanitize(mut data: String) -> String {
        if let Some(pos) = data.find(['\r', '\n']) {
            data.truncate(pos);
        }
        data
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    debug!(bytes = src.len(), limit = self.max_len, "Discarding oversized line");
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if line.len() > self.max_len {
                debug!(bytes = line.len(), limit = self.max_len, "Discarding oversized line");
                continue;
            }

            // Channels are not guaranteed to be UTF-8; keep what decodes.
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);

            // Blank keepalive lines carry nothing to dispatch.
            if text.trim().is_empty() {
                continue;
            }

            match Message::parse(text) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => debug!(error = %e, "Skipping malformed line"),
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = Self::sanitize(msg.to_string());
        dst.reserve(line.len() + 2);
        dst.put(line.as_bytes());
        dst.put(&b"\r\n"[..]);
        Ok(())
    }
}
