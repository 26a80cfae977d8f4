//! Splits a raw byte stream into complete frames using the header length.

use log::warn;

use crate::frame::{self, MARKER, declared_frame_len};

/// Accumulates received bytes and yields one complete frame at a time.
///
/// Bytes before a marker are discarded. A header announcing a frame longer
/// than `max_frame_len` is treated as noise: its first byte is dropped and
/// the search for the next marker resumes.
///
/// A candidate whose checksum fails, or which is still waiting for bytes, is
/// abandoned when a complete checksum-valid frame starts inside the span its
/// header claims. A corrupted length byte therefore costs only its own frame.
/// A complete bad frame with no such successor is still yielded, so the
/// decoder can report it.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl FrameAssembler {
    pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len: max_frame_len.max(frame::MIN_FRAME_LEN),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let start = match self.buffer.windows(2).position(|w| w == MARKER) {
                Some(start) => start,
                None => {
                    // keep a trailing 'R' that may begin the next marker
                    let keep = usize::from(self.buffer.last() == Some(&MARKER[0]));
                    let discard = self.buffer.len() - keep;
                    if discard > 0 {
                        warn!("Discarding {} bytes without frame marker", discard);
                        self.buffer.drain(..discard);
                    }
                    return None;
                }
            };
            if start > 0 {
                warn!("Discarding {} bytes before frame marker", start);
                self.buffer.drain(..start);
            }

            let frame_len = declared_frame_len(&self.buffer)?;
            if frame_len > self.max_frame_len {
                warn!(
                    "Header announces {} byte frame (limit {}), resynchronising",
                    frame_len, self.max_frame_len
                );
                self.buffer.drain(..1);
                continue;
            }
            let complete = self.buffer.len() >= frame_len;
            if complete && frame::byte_sum(&self.buffer[..frame_len]) == 0 {
                return Some(self.buffer.drain(..frame_len).collect());
            }
            if let Some(next) = self.resync_point(frame_len) {
                warn!(
                    "Frame header at buffer start is corrupt, resynchronising {} bytes later",
                    next
                );
                self.buffer.drain(..next);
                continue;
            }
            if !complete {
                return None;
            }
            return Some(self.buffer.drain(..frame_len).collect());
        }
    }

    /// Start of the first checksum-valid frame inside the first `span` bytes,
    /// skipping the frame at offset 0.
    fn resync_point(&self, span: usize) -> Option<usize> {
        let end = span.min(self.buffer.len());
        (1..end).find(|&start| self.valid_frame_at(start))
    }

    fn valid_frame_at(&self, start: usize) -> bool {
        let candidate = &self.buffer[start..];
        if !candidate.starts_with(&MARKER) {
            return false;
        }
        match declared_frame_len(candidate) {
            Some(len) if len <= self.max_frame_len && len <= candidate.len() => {
                frame::byte_sum(&candidate[..len]) == 0
            }
            _ => false,
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FRAME_LEN)
    }
}
