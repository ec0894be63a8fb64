//! Line framing for tokio.
//!
//! [`LineCodec`] reads and writes CRLF-terminated lines with a configurable
//! text encoding. [`LineFramer`] wraps the same decoder behind a plain
//! `feed(bytes) -> lines` interface for callers that read raw chunks.
//!
//! Undecodable bytes are replaced rather than rejected, and no length limit
//! is applied here; upper layers impose one if they need it.

use bytes::{BufMut, BytesMut};
use encoding::Encoding;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};

/// Line-based codec that handles CRLF (or bare LF) terminated messages.
#[derive(Debug, Clone)]
pub struct LineCodec {
    encoding: &'static Encoding,
    /// Index of next byte to check for newline
    next_index: usize,
}

impl LineCodec {
    /// Create a new codec with the specified encoding.
    ///
    /// # Arguments
    /// * `label` - Encoding label (e.g., "utf-8", "latin1")
    pub fn new(label: &str) -> error::Result<Self> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| ProtocolError::UnknownEncoding(label.to_owned()))?;
        Ok(Self {
            encoding,
            next_index: 0,
        })
    }

    /// The encoding used for both directions.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decode raw bytes, replacing anything malformed.
    pub fn decode_text(&self, raw: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(raw);
        text.into_owned()
    }

    /// Encode text into `dst`, replacing unmappable characters.
    pub fn encode_text(&self, text: &str, dst: &mut BytesMut) {
        let (bytes, _enc, _had_errors) = self.encoding.encode(text);
        dst.extend_from_slice(&bytes);
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // No complete line yet - remember where we stopped
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let mut raw = &line[..line.len() - 1];
            if let Some(stripped) = raw.strip_suffix(b"\r") {
                raw = stripped;
            }
            if raw.is_empty() {
                continue;
            }

            return Ok(Some(self.decode_text(raw)));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        <Self as Encoder<&str>>::encode(self, line.as_str(), dst)
    }
}

impl Encoder<&str> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: &str, dst: &mut BytesMut) -> error::Result<()> {
        let body = line.trim_end_matches(['\r', '\n']);
        dst.reserve(body.len() + 2);
        self.encode_text(body, dst);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Incremental framer: feed it chunks, get back complete lines.
///
/// At most one partial trailing fragment is kept between calls.
#[derive(Debug)]
pub struct LineFramer {
    codec: LineCodec,
    buffer: BytesMut,
}

impl LineFramer {
    /// Create a framer decoding with `label`.
    pub fn new(label: &str) -> error::Result<Self> {
        Ok(Self {
            codec: LineCodec::new(label)?,
            buffer: BytesMut::new(),
        })
    }

    /// Append `data` and return every line it completes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Ok(Some(line)) = self.codec.decode(&mut self.buffer) {
            lines.push(line);
        }
        lines
    }

    /// Bytes of the partial line held for the next call.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}
