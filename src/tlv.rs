//! TLV attribute scanning and writing.
//!
//! Every attribute in a parameter block is encoded as
//!
//! ```text
//! [type:1][length:1][value:length]
//! ```
//!
//! The parameter block itself is sized by a 16-bit big-endian count in the
//! frame header, while each attribute carries an inline 8-bit count. Both are
//! read through [`Cursor`], so every offset is validated before use.

use crate::error::{BuildError, FrameDecodeError};

/// Attribute type codes.
pub mod attr {
    pub const DEVICE_TYPE: u8 = 0x01;
    pub const FIRMWARE_VERSION: u8 = 0x02;
    pub const ANTENNA: u8 = 0x03;
    pub const DEVICE_NO: u8 = 0x04;
    pub const RSSI: u8 = 0x05;
    pub const EPC: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const WORKING_PARAM: u8 = 0x08;
    pub const TRANSMISSION_PARAM: u8 = 0x09;
    pub const ADVANCE_PARAM: u8 = 0x0A;
    pub const EXT_PARAM: u8 = 0x0B;
    pub const PARAM_ADDR: u8 = 0x0C;
    pub const PARAM_VALUE: u8 = 0x0D;
    pub const MEM_BANK: u8 = 0x0E;
    pub const START_ADDR: u8 = 0x0F;
    pub const LENGTH: u8 = 0x10;
    pub const ACCESS_PASSWORD: u8 = 0x11;
    pub const TAG_DATA: u8 = 0x12;
    pub const LOCK_AREA: u8 = 0x13;
    pub const LOCK_ACTION: u8 = 0x14;
    pub const KILL_PASSWORD: u8 = 0x15;
    pub const WIEGAND_NUMBER: u8 = 0x16;
    pub const RTC_TIME: u8 = 0x17;
    pub const AUDIO: u8 = 0x18;
    pub const RELAY_NO: u8 = 0x19;
    pub const RELAY_TIME: u8 = 0x1A;
    pub const USB_INFO: u8 = 0x1B;
    pub const DATA_FLAG: u8 = 0x1C;
    pub const MODBUS_PARAM: u8 = 0x1D;
    pub const VERIFY_DATA: u8 = 0x1E;
    pub const OFFLINE_CONTEXT: u8 = 0x1F;
    pub const TID: u8 = 0x20;
    /// Container holding the attributes of one tag as a nested TLV stream.
    pub const SINGLE_TAG_DATA: u8 = 0x50;
}

/// Bounds-checked read position over a byte slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, FrameDecodeError> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, FrameDecodeError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Consume `n` bytes, failing without moving if fewer remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], FrameDecodeError> {
        if n > self.remaining() {
            return Err(FrameDecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }
}

/// One attribute borrowed from a scanned region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Absolute offset of the type byte within the scanned buffer.
    pub offset: usize,
    pub kind: u8,
    pub value: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// First value byte, for single-byte attributes.
    pub fn as_u8(&self) -> Option<u8> {
        self.value.first().copied()
    }

    pub fn as_u16_be(&self) -> Option<u16> {
        match self.value {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Scanner over this attribute's value as a nested TLV stream.
    pub fn nested(&self) -> TlvScanner<'a> {
        TlvScanner {
            base: self.offset + 2,
            cursor: Cursor::new(self.value),
            failed: false,
        }
    }
}

/// Owned copy of an attribute, for events that outlive the frame buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub kind: u8,
    pub value: Vec<u8>,
}

impl From<Attribute<'_>> for RawAttribute {
    fn from(attr: Attribute<'_>) -> Self {
        Self {
            kind: attr.kind,
            value: attr.value.to_vec(),
        }
    }
}

/// Walks the `(type, length, value)` attributes of one region.
///
/// Iteration stops after the first error.
#[derive(Debug, Clone)]
pub struct TlvScanner<'a> {
    base: usize,
    cursor: Cursor<'a>,
    failed: bool,
}

impl<'a> TlvScanner<'a> {
    /// Scan `region_len` bytes of `buffer` starting at `start`.
    pub fn new(buffer: &'a [u8], start: usize, region_len: usize) -> Result<Self, FrameDecodeError> {
        let end = start
            .checked_add(region_len)
            .filter(|&end| end <= buffer.len())
            .ok_or(FrameDecodeError::RegionOutOfBounds {
                start,
                len: region_len,
                buffer_len: buffer.len(),
            })?;
        Ok(Self {
            base: start,
            cursor: Cursor::new(&buffer[start..end]),
            failed: false,
        })
    }

    /// Scan a whole slice as one region.
    pub fn over(region: &'a [u8]) -> Self {
        Self {
            base: 0,
            cursor: Cursor::new(region),
            failed: false,
        }
    }

    /// First attribute of type `kind`, or `None` when the region is exhausted.
    pub fn find_type(self, kind: u8) -> Result<Option<Attribute<'a>>, FrameDecodeError> {
        for attr in self {
            let attr = attr?;
            if attr.kind == kind {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Every attribute in order.
    pub fn collect_all(self) -> Result<Vec<Attribute<'a>>, FrameDecodeError> {
        self.collect()
    }

    fn next_attribute(&mut self) -> Result<Attribute<'a>, FrameDecodeError> {
        let offset = self.base + self.cursor.position();
        let kind = self.cursor.read_u8()?;
        let declared = self.cursor.read_u8()? as usize;
        let remaining = self.cursor.remaining();
        if declared > remaining {
            return Err(FrameDecodeError::AttributeOverrun {
                kind,
                offset,
                declared,
                remaining,
            });
        }
        let value = self.cursor.take(declared)?;
        Ok(Attribute { offset, kind, value })
    }
}

impl<'a> Iterator for TlvScanner<'a> {
    type Item = Result<Attribute<'a>, FrameDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        let item = self.next_attribute();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Appends TLV attributes to a parameter block.
#[derive(Debug, Default, Clone)]
pub struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, kind: u8, value: &[u8]) -> Result<&mut Self, BuildError> {
        let len = u8::try_from(value.len())
            .map_err(|_| BuildError::AttributeTooLong { kind, len: value.len() })?;
        self.buf.reserve(2 + value.len());
        self.buf.push(kind);
        self.buf.push(len);
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    pub fn put_u8(&mut self, kind: u8, value: u8) -> Result<&mut Self, BuildError> {
        self.put(kind, &[value])
    }

    pub fn put_u16_be(&mut self, kind: u8, value: u16) -> Result<&mut Self, BuildError> {
        self.put(kind, &value.to_be_bytes())
    }

    pub fn put_u32_be(&mut self, kind: u8, value: u32) -> Result<&mut Self, BuildError> {
        self.put(kind, &value.to_be_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
