//! Error types for frame building, frame decoding and the reader driver.

use thiserror::Error;

/// A frame (or a region inside it) could not be decoded.
///
/// Decoding aborts at the first violation; nothing past the end of the
/// buffer is ever read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameDecodeError {
    #[error("frame too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    #[error("bad frame marker: {0:02X?}")]
    BadMarker([u8; 2]),

    /// The header's parameter-block length does not match the bytes present.
    #[error("parameter block length mismatch: header declares {declared} bytes, frame carries {available}")]
    LengthMismatch { declared: usize, available: usize },

    /// Byte sum over the whole frame, checksum included, was not zero.
    #[error("checksum mismatch: frame sums to 0x{sum:02X}")]
    ChecksumMismatch { sum: u8 },

    #[error("unsupported frame type 0x{0:02X}")]
    UnsupportedFrameType(u8),

    #[error("region {start}+{len} lies outside a {buffer_len}-byte buffer")]
    RegionOutOfBounds {
        start: usize,
        len: usize,
        buffer_len: usize,
    },

    /// An attribute's length byte runs past the end of its enclosing region.
    #[error("attribute 0x{kind:02X} at offset {offset} declares {declared} bytes, only {remaining} remain")]
    AttributeOverrun {
        kind: u8,
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("frame code 0x{frame_code:02X} is missing attribute 0x{kind:02X}")]
    MissingAttribute { frame_code: u8, kind: u8 },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A parameter record could not be decoded from its byte block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("{record} expects {expected} bytes, got {actual}")]
    WrongSize {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record}: invalid {field} value 0x{value:02X}")]
    InvalidField {
        record: &'static str,
        field: &'static str,
        value: u8,
    },
}

/// An outbound command could not be encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("attribute 0x{kind:02X} value is {len} bytes, limit is 255")]
    AttributeTooLong { kind: u8, len: usize },

    #[error("parameter block is {0} bytes, limit is 65535")]
    BlockTooLong(usize),
}

/// Errors surfaced by [`crate::RfidReader`].
#[derive(Debug, Error)]
pub enum RfidError {
    /// Transport layer error (serial port, socket, ...)
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Decode(#[from] FrameDecodeError),

    /// No response with the expected frame code arrived in time.
    #[error("timed out waiting for response to frame code 0x{0:02X}")]
    Timeout(u8),

    /// The reader answered with a non-success result code.
    #[error("command 0x{code:02X} failed with status 0x{status:02X}")]
    CommandFailed { code: u8, status: u8 },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
