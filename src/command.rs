//! Outbound commands and their frame encoding.

use crate::error::BuildError;
use crate::frame::{self, frame_type};
use crate::params::{
    AdvanceParam, DataFlag, ExtParam, ModbusParam, ParamRecord, RtcTime, TransmissionParam,
    UsbInfo, WorkingParam,
};
use crate::tlv::{TlvWriter, attr};
use crate::types::{LockAction, LockArea, MemoryBank};

/// Operation selector carried in byte 5 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameCode {
    Reset = 0x10,
    FactoryReset = 0x11,
    GetDeviceInfo = 0x12,
    QueryWorkingParam = 0x13,
    SetWorkingParam = 0x14,
    QueryTransmissionParam = 0x15,
    SetTransmissionParam = 0x16,
    QueryAdvanceParam = 0x17,
    SetAdvanceParam = 0x18,
    QueryExtParam = 0x19,
    SetExtParam = 0x1A,
    SetSingleParam = 0x1B,
    QuerySingleParam = 0x1C,
    StartInventory = 0x21,
    StopInventory = 0x22,
    InventoryOnce = 0x23,
    GetTagData = 0x24,
    ReadTag = 0x30,
    WriteTag = 0x31,
    ReadBlock = 0x32,
    WriteEpc = 0x33,
    LockTag = 0x34,
    KillTag = 0x35,
    WriteWiegandNumber = 0x36,
    AddVerifyToTag = 0x37,
    UploadRecord = 0x40,
    QueryRtcTime = 0x41,
    SetRtcTime = 0x42,
    AudioPlay = 0x43,
    SetOfflineContext = 0x44,
    RelayOperate = 0x45,
    SetUsbInfo = 0x46,
    QueryUsbInfo = 0x47,
    SetDataFlag = 0x48,
    QueryDataFlag = 0x49,
    SetModbusParam = 0x4A,
    QueryModbusParam = 0x4B,
    // Notification sub-codes
    TagNotify = 0x80,
    RecordNotify = 0x81,
    Heartbeat = 0x82,
}

impl FrameCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use FrameCode::*;
        let code = match value {
            0x10 => Reset,
            0x11 => FactoryReset,
            0x12 => GetDeviceInfo,
            0x13 => QueryWorkingParam,
            0x14 => SetWorkingParam,
            0x15 => QueryTransmissionParam,
            0x16 => SetTransmissionParam,
            0x17 => QueryAdvanceParam,
            0x18 => SetAdvanceParam,
            0x19 => QueryExtParam,
            0x1A => SetExtParam,
            0x1B => SetSingleParam,
            0x1C => QuerySingleParam,
            0x21 => StartInventory,
            0x22 => StopInventory,
            0x23 => InventoryOnce,
            0x24 => GetTagData,
            0x30 => ReadTag,
            0x31 => WriteTag,
            0x32 => ReadBlock,
            0x33 => WriteEpc,
            0x34 => LockTag,
            0x35 => KillTag,
            0x36 => WriteWiegandNumber,
            0x37 => AddVerifyToTag,
            0x40 => UploadRecord,
            0x41 => QueryRtcTime,
            0x42 => SetRtcTime,
            0x43 => AudioPlay,
            0x44 => SetOfflineContext,
            0x45 => RelayOperate,
            0x46 => SetUsbInfo,
            0x47 => QueryUsbInfo,
            0x48 => SetDataFlag,
            0x49 => QueryDataFlag,
            0x4A => SetModbusParam,
            0x4B => QueryModbusParam,
            0x80 => TagNotify,
            0x81 => RecordNotify,
            0x82 => Heartbeat,
            other => return Err(other),
        };
        Ok(code)
    }
}

/// A reader command with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    FactoryReset,
    GetDeviceInfo,
    QueryWorkingParam,
    SetWorkingParam(WorkingParam),
    QueryTransmissionParam,
    SetTransmissionParam(TransmissionParam),
    QueryAdvanceParam,
    SetAdvanceParam(AdvanceParam),
    QueryExtParam,
    SetExtParam(ExtParam),
    SetSingleParam { address: u8, value: Vec<u8> },
    QuerySingleParam { address: u8 },
    StartInventory,
    StopInventory,
    InventoryOnce,
    GetTagData,
    /// Read `word_count` 16-bit words starting at `word_addr`
    ReadTag {
        password: [u8; 4],
        bank: MemoryBank,
        word_addr: u16,
        word_count: u8,
    },
    /// `data` must hold at least `word_count * 2` bytes; extra bytes are not sent
    WriteTag {
        password: [u8; 4],
        bank: MemoryBank,
        word_addr: u16,
        word_count: u8,
        data: Vec<u8>,
    },
    ReadBlock {
        password: [u8; 4],
        bank: MemoryBank,
        block_addr: u16,
        block_count: u8,
    },
    WriteEpc { password: [u8; 4], epc: Vec<u8> },
    LockTag {
        password: [u8; 4],
        area: LockArea,
        action: LockAction,
    },
    KillTag { kill_password: [u8; 4] },
    WriteWiegandNumber { password: [u8; 4], number: u32 },
    AddVerifyToTag { password: [u8; 4], data: Vec<u8> },
    UploadRecord,
    QueryRtcTime,
    SetRtcTime(RtcTime),
    /// Text in the reader's display encoding
    AudioPlay(Vec<u8>),
    SetOfflineContext(Vec<u8>),
    RelayOperate { relay: u8, close_time_s: u8 },
    SetUsbInfo(UsbInfo),
    QueryUsbInfo,
    SetDataFlag(DataFlag),
    QueryDataFlag,
    SetModbusParam(ModbusParam),
    QueryModbusParam,
}

impl Command {
    pub fn frame_code(&self) -> FrameCode {
        match self {
            Command::Reset => FrameCode::Reset,
            Command::FactoryReset => FrameCode::FactoryReset,
            Command::GetDeviceInfo => FrameCode::GetDeviceInfo,
            Command::QueryWorkingParam => FrameCode::QueryWorkingParam,
            Command::SetWorkingParam(_) => FrameCode::SetWorkingParam,
            Command::QueryTransmissionParam => FrameCode::QueryTransmissionParam,
            Command::SetTransmissionParam(_) => FrameCode::SetTransmissionParam,
            Command::QueryAdvanceParam => FrameCode::QueryAdvanceParam,
            Command::SetAdvanceParam(_) => FrameCode::SetAdvanceParam,
            Command::QueryExtParam => FrameCode::QueryExtParam,
            Command::SetExtParam(_) => FrameCode::SetExtParam,
            Command::SetSingleParam { .. } => FrameCode::SetSingleParam,
            Command::QuerySingleParam { .. } => FrameCode::QuerySingleParam,
            Command::StartInventory => FrameCode::StartInventory,
            Command::StopInventory => FrameCode::StopInventory,
            Command::InventoryOnce => FrameCode::InventoryOnce,
            Command::GetTagData => FrameCode::GetTagData,
            Command::ReadTag { .. } => FrameCode::ReadTag,
            Command::WriteTag { .. } => FrameCode::WriteTag,
            Command::ReadBlock { .. } => FrameCode::ReadBlock,
            Command::WriteEpc { .. } => FrameCode::WriteEpc,
            Command::LockTag { .. } => FrameCode::LockTag,
            Command::KillTag { .. } => FrameCode::KillTag,
            Command::WriteWiegandNumber { .. } => FrameCode::WriteWiegandNumber,
            Command::AddVerifyToTag { .. } => FrameCode::AddVerifyToTag,
            Command::UploadRecord => FrameCode::UploadRecord,
            Command::QueryRtcTime => FrameCode::QueryRtcTime,
            Command::SetRtcTime(_) => FrameCode::SetRtcTime,
            Command::AudioPlay(_) => FrameCode::AudioPlay,
            Command::SetOfflineContext(_) => FrameCode::SetOfflineContext,
            Command::RelayOperate { .. } => FrameCode::RelayOperate,
            Command::SetUsbInfo(_) => FrameCode::SetUsbInfo,
            Command::QueryUsbInfo => FrameCode::QueryUsbInfo,
            Command::SetDataFlag(_) => FrameCode::SetDataFlag,
            Command::QueryDataFlag => FrameCode::QueryDataFlag,
            Command::SetModbusParam(_) => FrameCode::SetModbusParam,
            Command::QueryModbusParam => FrameCode::QueryModbusParam,
        }
    }

    /// TLV-encode the parameter block for this command.
    fn encode_params(&self, w: &mut TlvWriter) -> Result<(), BuildError> {
        match self {
            Command::Reset
            | Command::FactoryReset
            | Command::GetDeviceInfo
            | Command::QueryWorkingParam
            | Command::QueryTransmissionParam
            | Command::QueryAdvanceParam
            | Command::QueryExtParam
            | Command::StartInventory
            | Command::StopInventory
            | Command::InventoryOnce
            | Command::GetTagData
            | Command::UploadRecord
            | Command::QueryRtcTime
            | Command::QueryUsbInfo
            | Command::QueryDataFlag
            | Command::QueryModbusParam => {}

            Command::SetWorkingParam(p) => {
                w.put(attr::WORKING_PARAM, &p.to_bytes())?;
            }
            Command::SetTransmissionParam(p) => {
                w.put(attr::TRANSMISSION_PARAM, &p.to_bytes())?;
            }
            Command::SetAdvanceParam(p) => {
                w.put(attr::ADVANCE_PARAM, &p.to_bytes())?;
            }
            Command::SetExtParam(p) => {
                w.put(attr::EXT_PARAM, &p.to_bytes())?;
            }
            Command::SetSingleParam { address, value } => {
                w.put_u8(attr::PARAM_ADDR, *address)?.put(attr::PARAM_VALUE, value)?;
            }
            Command::QuerySingleParam { address } => {
                w.put_u8(attr::PARAM_ADDR, *address)?;
            }
            Command::ReadTag {
                password,
                bank,
                word_addr,
                word_count,
            } => {
                put_memory_access(w, password, *bank, *word_addr, *word_count)?;
            }
            Command::WriteTag {
                password,
                bank,
                word_addr,
                word_count,
                data,
            } => {
                let expected = *word_count as usize * 2;
                if data.len() < expected {
                    return Err(BuildError::InvalidArgument(format!(
                        "write data is {} bytes but {} words ({} bytes) were requested",
                        data.len(),
                        word_count,
                        expected
                    )));
                }
                put_memory_access(w, password, *bank, *word_addr, *word_count)?;
                w.put(attr::TAG_DATA, &data[..expected])?;
            }
            Command::ReadBlock {
                password,
                bank,
                block_addr,
                block_count,
            } => {
                put_memory_access(w, password, *bank, *block_addr, *block_count)?;
            }
            Command::WriteEpc { password, epc } => {
                if epc.is_empty() || epc.len() % 2 != 0 {
                    return Err(BuildError::InvalidArgument(format!(
                        "EPC must be a non-empty whole number of 16-bit words, got {} bytes",
                        epc.len()
                    )));
                }
                w.put(attr::ACCESS_PASSWORD, password)?.put(attr::EPC, epc)?;
            }
            Command::LockTag {
                password,
                area,
                action,
            } => {
                w.put(attr::ACCESS_PASSWORD, password)?
                    .put_u8(attr::LOCK_AREA, *area as u8)?
                    .put_u8(attr::LOCK_ACTION, *action as u8)?;
            }
            Command::KillTag { kill_password } => {
                w.put(attr::KILL_PASSWORD, kill_password)?;
            }
            Command::WriteWiegandNumber { password, number } => {
                w.put(attr::ACCESS_PASSWORD, password)?
                    .put_u32_be(attr::WIEGAND_NUMBER, *number)?;
            }
            Command::AddVerifyToTag { password, data } => {
                w.put(attr::ACCESS_PASSWORD, password)?.put(attr::VERIFY_DATA, data)?;
            }
            Command::SetRtcTime(time) => {
                w.put(attr::RTC_TIME, &time.to_bytes())?;
            }
            Command::AudioPlay(text) => {
                w.put(attr::AUDIO, text)?;
            }
            Command::SetOfflineContext(content) => {
                w.put(attr::OFFLINE_CONTEXT, content)?;
            }
            Command::RelayOperate { relay, close_time_s } => {
                w.put_u8(attr::RELAY_NO, *relay)?
                    .put_u8(attr::RELAY_TIME, *close_time_s)?;
            }
            Command::SetUsbInfo(info) => {
                w.put(attr::USB_INFO, &info.to_bytes())?;
            }
            Command::SetDataFlag(flag) => {
                w.put(attr::DATA_FLAG, &flag.to_bytes())?;
            }
            Command::SetModbusParam(p) => {
                w.put(attr::MODBUS_PARAM, &p.to_bytes())?;
            }
        }
        Ok(())
    }
}

fn put_memory_access(
    w: &mut TlvWriter,
    password: &[u8; 4],
    bank: MemoryBank,
    start: u16,
    count: u8,
) -> Result<(), BuildError> {
    w.put(attr::ACCESS_PASSWORD, password)?
        .put_u8(attr::MEM_BANK, bank as u8)?
        .put_u16_be(attr::START_ADDR, start)?
        .put_u8(attr::LENGTH, count)?;
    Ok(())
}

/// Encode `command` as a complete, checksummed request frame.
pub fn build_frame(command: &Command) -> Result<Vec<u8>, BuildError> {
    let mut params = TlvWriter::new();
    command.encode_params(&mut params)?;
    frame::encode(
        frame_type::REQUEST,
        command.frame_code().as_u8(),
        &params.into_bytes(),
    )
}
