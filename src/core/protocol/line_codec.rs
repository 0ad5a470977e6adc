// src/core/protocol/line_codec.rs

//! Implements the CRLF line framing used in both directions of the transport,
//! as a `tokio_util::codec` `Encoder` and `Decoder`.

use crate::core::MudlinkError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";

/// The default ceiling for a single inbound line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// A codec that yields one `String` per newline-terminated line.
///
/// Inbound lines may end in `\n` or `\r\n`; the terminator is stripped. Bytes that
/// are not valid UTF-8 are replaced rather than rejected, since interactive text
/// servers routinely emit stray high-bit bytes. Outbound lines are terminated
/// with CRLF.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    // Index up to which the buffer is known to contain no newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_terminator(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = MudlinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
        match newline {
            Some(offset) => {
                let end = self.next_index + offset + 1;
                self.next_index = 0;
                if strip_terminator(&src[..end]).len() > self.max_length {
                    return Err(MudlinkError::LineTooLong(self.max_length));
                }
                let raw = src.split_to(end);
                let line = String::from_utf8_lossy(strip_terminator(&raw)).into_owned();
                Ok(Some(line))
            }
            None => {
                // A trailing `\r` may be the first half of the terminator.
                let pending = src.strip_suffix(b"\r").unwrap_or(&src[..]);
                if pending.len() > self.max_length {
                    return Err(MudlinkError::LineTooLong(self.max_length));
                }
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // A final line without a terminator is still a line.
        if src.is_empty() {
            Ok(None)
        } else {
            self.next_index = 0;
            let line = String::from_utf8_lossy(strip_terminator(src)).into_owned();
            src.advance(src.len());
            Ok(Some(line))
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = MudlinkError;

    /// Encodes one logical write. Interior line breaks are normalised so each
    /// physical line goes out CRLF-terminated.
    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.as_ref();
        let text = text.strip_suffix('\n').unwrap_or(text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        dst.reserve(text.len() + CRLF.len());
        for part in text.split('\n') {
            dst.extend_from_slice(part.strip_suffix('\r').unwrap_or(part).as_bytes());
            dst.extend_from_slice(CRLF);
        }
        Ok(())
    }
}
