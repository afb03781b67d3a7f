/// Line framing for chunked text streams
///
/// Bluetooth links deliver the transmitter's output in arbitrarily sized
/// pieces: a packet may be split over several chunks, or several packets
/// may arrive in one. The framer accumulates chunks and hands out complete
/// candidate lines, keeping the unterminated tail for the next push.
///
/// Framing happens in two phases per push:
/// 1. Split on `\n` / `\r\n`; every piece except the last is a line.
/// 2. If enabled, an unterminated remainder that already looks like a whole
///    packet (`#...;...`) is emitted as a line. This handles links that strip
///    the terminator themselves.
use log::warn;

use crate::protocol::packet::{PACKET_MARKER, SECTION_SEPARATOR};

/// Default cap for the unterminated remainder
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 4096;

#[derive(Debug)]
pub struct StreamFramer {
    /// Unterminated tail carried between pushes.
    buffer: String,
    /// Emit `#...;...` remainders without waiting for a terminator.
    marker_fallback: bool,
    /// Remainder size beyond which the buffer is dropped.
    max_buffer: usize,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFramer {
    /// Create a framer with the marker fallback enabled
    ///
    /// Only suitable for links that strip line terminators: on a link that
    /// keeps them, a read ending after the `;` would be framed early.
    pub fn new() -> Self {
        Self::with_options(true, DEFAULT_MAX_BUFFER_BYTES)
    }

    pub fn with_options(marker_fallback: bool, max_buffer: usize) -> Self {
        StreamFramer {
            buffer: String::new(),
            marker_fallback,
            max_buffer,
        }
    }

    /// Append a chunk and return every candidate line it completes
    ///
    /// Lines are trimmed and empty lines are skipped. Never fails: every call
    /// either yields lines or extends the remainder.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(chunk);

        let mut lines = Vec::new();

        // Phase 1: terminated lines. `\r\n` is covered by trimming each piece.
        if let Some(last_newline) = self.buffer.rfind('\n') {
            let remainder = self.buffer.split_off(last_newline + 1);
            lines.extend(
                self.buffer
                    .split('\n')
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
            self.buffer = remainder;
        }

        // Phase 2: the remainder never holds a terminator at this point, so
        // these bytes cannot also have been framed by phase 1.
        if self.marker_fallback {
            let remainder = self.buffer.trim();
            if remainder.starts_with(PACKET_MARKER) && remainder.contains(SECTION_SEPARATOR) {
                lines.push(remainder.to_string());
                self.buffer.clear();
            }
        }

        if self.buffer.len() > self.max_buffer {
            warn!(
                "Discarding {} unterminated bytes (limit {})",
                self.buffer.len(),
                self.max_buffer
            );
            self.buffer.clear();
        }

        lines
    }

    /// Number of buffered, not yet framed bytes
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered remainder
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
