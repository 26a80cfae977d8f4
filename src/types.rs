//! Types shared by commands and decoded events

use std::fmt;

use crate::params::RtcTime;

/// Device result code carried by the status attribute of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    /// Stand-in when a response carries no status attribute at all.
    pub const MISSING: Status = Status(0xFE);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_missing(self) -> bool {
        self == Self::MISSING
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SUCCESS => write!(f, "success"),
            Self::MISSING => write!(f, "missing status"),
            Status(code) => write!(f, "error 0x{:02X}", code),
        }
    }
}

/// One tag reported by an inventory response or tag notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagReadEvent {
    pub epc: Vec<u8>,
    pub rssi: Option<u8>,
    pub antenna: Option<u8>,
    pub device_no: Option<u8>,
    pub tid: Option<Vec<u8>>,
}

impl TagReadEvent {
    pub fn epc_hex(&self) -> String {
        bytes_to_hex(&self.epc)
    }
}

/// A tag read stored by the reader while offline and uploaded later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineRecord {
    pub tag: TagReadEvent,
    pub time: Option<RtcTime>,
}

/// Identity reported by the device-info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: Option<u8>,
    pub firmware_version: String,
}

/// Tag memory banks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    Reserved = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

impl TryFrom<u8> for MemoryBank {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Reserved),
            0x01 => Ok(Self::Epc),
            0x02 => Ok(Self::Tid),
            0x03 => Ok(Self::User),
            other => Err(other),
        }
    }
}

/// Memory area targeted by a lock command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockArea {
    KillPassword = 0x00,
    AccessPassword = 0x01,
    Epc = 0x02,
    Tid = 0x03,
    User = 0x04,
}

/// Lock operation applied to a [`LockArea`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockAction {
    Unlock = 0x00,
    Lock = 0x01,
    PermanentUnlock = 0x02,
    PermanentLock = 0x03,
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags() {
        assert!(Status(0).is_success());
        assert!(!Status::MISSING.is_success());
        assert!(Status(0xFE).is_missing());
        assert_eq!(Status(0x11).to_string(), "error 0x11");
    }

    #[test]
    fn test_epc_hex() {
        let tag = TagReadEvent {
            epc: vec![0xE2, 0x00, 0x68, 0x0A],
            ..Default::default()
        };
        assert_eq!(tag.epc_hex(), "E200680A");
    }

    #[test]
    fn test_memory_bank_from_u8() {
        assert_eq!(MemoryBank::try_from(0x03), Ok(MemoryBank::User));
        assert_eq!(MemoryBank::try_from(0x04), Err(0x04));
    }
}
