//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Newline-delimited text codec
//!
//! The wire format is UTF-8 text separated by `\n`, with no length prefix.
//! Decoding buffers partial lines across reads, strips a trailing `\r`,
//! replaces invalid UTF-8 instead of failing, and skips lines longer than the
//! configured limit without ending the stream. An unterminated final line is
//! still delivered when the peer closes.

use crate::{DEFAULT_MAX_LINE_LENGTH, LobbyError};
use bytes::{Buf, BufMut, BytesMut};
use std::cmp;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Newline-delimited text codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCodec {
    /// Index in the buffer already scanned for a newline
    next_index: usize,
    /// Longest line delivered, in bytes, excluding the newline
    max_length: usize,
    /// Currently skipping an oversized line up to its newline
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that skips lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            discarding: false,
        }
    }

    /// Longest line delivered, in bytes
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn within_limit(&self, line: &[u8]) -> bool {
        line.strip_suffix(b"\r").unwrap_or(line).len() <= self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LobbyError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LobbyError> {
        loop {
            // A line at the limit may still carry a `\r` before its newline.
            let read_to = cmp::min(self.max_length.saturating_add(2), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(newline_index + 1);
                    let content = &line[..newline_index];
                    if self.within_limit(content) {
                        return Ok(Some(to_line(content)));
                    }
                    warn!(
                        max_length = self.max_length,
                        "Discarding inbound line over length limit"
                    );
                }
                (false, None) if buf.len() > self.max_length.saturating_add(1) => {
                    warn!(
                        max_length = self.max_length,
                        "Discarding inbound line over length limit"
                    );
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LobbyError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            self.discarding = false;
            buf.clear();
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        if !self.within_limit(&line) {
            warn!(
                max_length = self.max_length,
                "Discarding inbound line over length limit"
            );
            return Ok(None);
        }
        Ok(Some(to_line(&line)))
    }
}

impl<T> Encoder<T> for LineCodec
where
    T: AsRef<str>,
{
    type Error = LobbyError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), LobbyError> {
        let line = line.as_ref();
        buf.reserve(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
        Ok(())
    }
}
