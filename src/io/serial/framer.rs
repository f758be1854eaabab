// src/io/serial/framer.rs
//
// Newline framing for received serial bytes.
// Bytes accumulate per channel; complete lines are split on '\n', an optional
// trailing '\r' is dropped, and the payload is decoded as text.

use std::borrow::Cow;

/// A partial line longer than this without a newline is discarded.
pub const MAX_PARTIAL_LINE: usize = 64 * 1024;

/// Decode one line payload. UTF-8 is preferred; any invalid sequence falls
/// back to a byte-per-char Latin-1 decode so decoding never fails.
pub fn decode_line(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Receive buffer for one channel.
///
/// `push` only accumulates; `extract` is the single place lines are produced.
/// After `extract` returns, the buffer holds at most one partial line.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    discarded: u64,
    /// Set after an overflow: the rest of that line, up to and including its
    /// '\n', is dropped rather than emitted as a short line.
    skipping: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        LineAssembler {
            buffer: Vec::with_capacity(1024),
            discarded: 0,
            skipping: false,
        }
    }

    /// Append raw bytes without scanning for line boundaries.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and decode every complete line currently buffered, in stream order.
    pub fn extract(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        if self.skipping {
            match self.buffer.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarded += (end + 1) as u64;
                    self.buffer.drain(..=end);
                    self.skipping = false;
                }
                None => {
                    self.discarded += self.buffer.len() as u64;
                    self.buffer.clear();
                    return lines;
                }
            }
        }

        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let Some((&b'\r', rest)) = line.split_last() {
                line = rest;
            }
            lines.push(decode_line(line));
            consumed = end + 1;
        }

        self.buffer.drain(..consumed);

        if self.buffer.len() > MAX_PARTIAL_LINE {
            self.discarded += self.buffer.len() as u64;
            tlog!(
                "[Serial] Discarding {} bytes without a newline",
                self.buffer.len()
            );
            self.buffer.clear();
            self.skipping = true;
        }

        lines
    }

    /// Bytes of the current partial line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes dropped because a line outgrew `MAX_PARTIAL_LINE`.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Drop the partial line, e.g. when the channel disconnects.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.skipping = false;
    }
}

// ============================================================================
// Tests
// ============================================================================
