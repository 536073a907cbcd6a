//! Incremental line codec with a bounded receive buffer.
//!
//! Each connection's reader owns one [`FrameCodec`]. Bytes arrive in
//! arbitrary TCP segment sizes; [`FrameCodec::feed`] appends them and drains
//! every complete newline-terminated line into a [`Frame`], leaving partial
//! trailing bytes buffered for the next read.
//!
//! The buffer is bounded: if no terminator has appeared and the buffer
//! exceeds the cap, it is compacted. A partial *known* frame (one whose
//! recognized tag prefix is already in the buffer) is never truncated, since
//! image frames legitimately run to many megabytes; only untagged noise is
//! dropped down to a recent suffix.

use bytes::{Buf, BytesMut};

use crate::frame::{Frame, KNOWN_TAG_PREFIXES};

/// Default receive buffer cap. Image frames are large but terminated; this
/// bound only matters for pathological never-terminated input.
pub const DEFAULT_MAX_BUFFER: usize = 8 * 1024 * 1024;

/// Suffix kept when the cap trips on unrecognized noise.
pub const DEFAULT_KEEP_SUFFIX: usize = 4096;

/// Receive buffer bounds.
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    /// Buffer size above which compaction runs (when no terminator is
    /// buffered).
    pub max_buffer: usize,
    /// Bytes of recent noise kept by compaction.
    pub keep_suffix: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { max_buffer: DEFAULT_MAX_BUFFER, keep_suffix: DEFAULT_KEEP_SUFFIX }
    }
}

/// Reassembles newline-delimited frames from a byte stream.
///
/// Owned exclusively by one connection's reader task; needs no lock.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: BytesMut,
    config: CodecConfig,
}

impl FrameCodec {
    /// Create a codec with the given buffer bounds.
    pub fn new(config: CodecConfig) -> Self {
        Self { buf: BytesMut::new(), config }
    }

    /// Bytes currently buffered without a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Consume newly arrived bytes and return *all* complete frames.
    ///
    /// A burst of frames in one read drains in one call; a frame split
    /// across reads stays buffered until its terminator arrives. Lines are
    /// decoded as lossy UTF-8 (base64 and JSON payloads are ASCII and
    /// unaffected); empty lines are discarded.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if !text.trim().is_empty() {
                frames.push(Frame::parse(&text));
            }
        }

        // The buffer now holds no terminator; bound it.
        if self.buf.len() > self.config.max_buffer {
            self.compact();
        }

        frames
    }

    /// Drop unrecognized noise once the cap is exceeded.
    ///
    /// If a known tag prefix is pending, everything before it is dropped and
    /// the partial frame is kept whole. Otherwise only the most recent
    /// `keep_suffix` bytes survive.
    fn compact(&mut self) {
        match earliest_known_tag(&self.buf) {
            Some(0) => {},
            Some(idx) => self.buf.advance(idx),
            None => {
                let drop = self.buf.len().saturating_sub(self.config.keep_suffix);
                self.buf.advance(drop);
            },
        }
    }
}

/// Position of the earliest known tag prefix in `haystack`, if any.
fn earliest_known_tag(haystack: &[u8]) -> Option<usize> {
    KNOWN_TAG_PREFIXES.iter().filter_map(|tag| find_subslice(haystack, tag)).min()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
