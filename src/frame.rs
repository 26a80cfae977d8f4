//! Frame layout shared by the builder and the dispatcher.
//!
//! ```text
//! ['R']['F'][frame_type:1][reserved:2][frame_code:1][block_len:2 BE][block:block_len][checksum:1]
//! ```
//!
//! The checksum is the two's complement of the 8-bit sum of every preceding
//! byte, so a valid frame sums to zero.

use crate::error::{BuildError, FrameDecodeError};
use crate::tlv::{Cursor, TlvScanner};

pub const MARKER: [u8; 2] = [b'R', b'F'];
pub const HEADER_LEN: usize = 8;
/// Header plus checksum, the size of a frame with an empty parameter block.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;
pub const MAX_BLOCK_LEN: usize = u16::MAX as usize;

/// Frame type byte
pub mod frame_type {
    pub const REQUEST: u8 = 0x00;
    pub const RESPONSE: u8 = 0x01;
    pub const NOTIFICATION: u8 = 0x02;
}

/// 8-bit wrapping sum
pub fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Checksum byte that makes `bytes` plus the checksum sum to zero.
pub fn checksum(bytes: &[u8]) -> u8 {
    byte_sum(bytes).wrapping_neg()
}

/// Assemble a complete frame around an already-encoded parameter block.
pub fn encode(frame_type: u8, frame_code: u8, block: &[u8]) -> Result<Vec<u8>, BuildError> {
    if block.len() > MAX_BLOCK_LEN {
        return Err(BuildError::BlockTooLong(block.len()));
    }
    let block_len = block.len() as u16;

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + block.len());
    frame.extend_from_slice(&MARKER);
    frame.push(frame_type);
    frame.extend_from_slice(&[0x00, 0x00]); // reserved
    frame.push(frame_code);
    frame.extend_from_slice(&block_len.to_be_bytes());
    frame.extend_from_slice(block);
    frame.push(checksum(&frame));
    Ok(frame)
}

/// A structurally valid frame borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub frame_type: u8,
    pub frame_code: u8,
    /// Parameter-block length as declared by the header
    pub block_len: u16,
    pub block: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Validate marker, declared length and checksum of exactly one frame.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameDecodeError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(FrameDecodeError::TooShort {
                needed: MIN_FRAME_LEN,
                available: bytes.len(),
            });
        }

        let mut cursor = Cursor::new(bytes);
        let marker = cursor.take(2)?;
        if marker != MARKER {
            return Err(FrameDecodeError::BadMarker([marker[0], marker[1]]));
        }
        let frame_type = cursor.read_u8()?;
        cursor.take(2)?; // reserved
        let frame_code = cursor.read_u8()?;
        let block_len = cursor.read_u16_be()?;

        // everything after the header except the trailing checksum
        let available = cursor.remaining() - 1;
        if block_len as usize != available {
            return Err(FrameDecodeError::LengthMismatch {
                declared: block_len as usize,
                available,
            });
        }
        let block = cursor.take(available)?;

        let sum = byte_sum(bytes);
        if sum != 0 {
            return Err(FrameDecodeError::ChecksumMismatch { sum });
        }

        Ok(Self {
            frame_type,
            frame_code,
            block_len,
            block,
        })
    }

    /// Scanner over the parameter block.
    pub fn attributes(&self) -> TlvScanner<'a> {
        TlvScanner::over(self.block)
    }
}

/// Total frame length announced by a header, if enough bytes are present to read it.
pub(crate) fn declared_frame_len(header: &[u8]) -> Option<usize> {
    if header.len() < HEADER_LEN {
        return None;
    }
    let block_len = u16::from_be_bytes([header[6], header[7]]) as usize;
    Some(MIN_FRAME_LEN + block_len)
}
