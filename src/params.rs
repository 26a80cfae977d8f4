//! Fixed-layout parameter records carried as a single TLV value.
//!
//! Every record serialises to exactly [`ParamRecord::SIZE`] bytes and refuses
//! to decode from anything else. Multi-byte fields are big-endian.

use crate::error::RecordError;
use crate::types::MemoryBank;

/// A fixed-size record exchanged with the reader.
pub trait ParamRecord: Sized {
    /// Name used in error messages.
    const NAME: &'static str;
    /// Exact encoded size in bytes.
    const SIZE: usize;

    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError>;
}

fn check_size<R: ParamRecord>(bytes: &[u8]) -> Result<(), RecordError> {
    if bytes.len() != R::SIZE {
        return Err(RecordError::WrongSize {
            record: R::NAME,
            expected: R::SIZE,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn be16(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

/// How the reader starts inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WorkMode {
    /// Inventory only on host command
    #[default]
    Command = 0x00,
    /// Continuous inventory, tags pushed as notifications
    Auto = 0x01,
    /// Inventory while the trigger input is active
    Trigger = 0x02,
}

impl TryFrom<u8> for WorkMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Command),
            0x01 => Ok(Self::Auto),
            0x02 => Ok(Self::Trigger),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkingParam {
    pub work_mode: WorkMode,
    pub output_interface: u8,
    pub inventory_interval_ms: u16,
    /// Seconds during which repeat reads of the same tag are suppressed
    pub same_tag_filter_s: u8,
    pub trigger_delay_s: u8,
    pub buzzer: bool,
    pub device_no: u8,
}

impl ParamRecord for WorkingParam {
    const NAME: &'static str = "WorkingParam";
    const SIZE: usize = 8;

    fn to_bytes(&self) -> Vec<u8> {
        let interval = self.inventory_interval_ms.to_be_bytes();
        vec![
            self.work_mode as u8,
            self.output_interface,
            interval[0],
            interval[1],
            self.same_tag_filter_s,
            self.trigger_delay_s,
            self.buzzer as u8,
            self.device_no,
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        let work_mode = WorkMode::try_from(bytes[0]).map_err(|value| RecordError::InvalidField {
            record: Self::NAME,
            field: "work_mode",
            value,
        })?;
        Ok(Self {
            work_mode,
            output_interface: bytes[1],
            inventory_interval_ms: be16(bytes[2], bytes[3]),
            same_tag_filter_s: bytes[4],
            trigger_delay_s: bytes[5],
            buzzer: bytes[6] != 0,
            device_no: bytes[7],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WiegandFormat {
    #[default]
    W26 = 0x00,
    W34 = 0x01,
    W66 = 0x02,
}

impl TryFrom<u8> for WiegandFormat {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::W26),
            0x01 => Ok(Self::W34),
            0x02 => Ok(Self::W66),
            other => Err(other),
        }
    }
}

/// Serial and Wiegand output settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransmissionParam {
    /// Index into the reader's baud-rate table
    pub baud_rate: u8,
    pub rs485_address: u8,
    pub wiegand_format: WiegandFormat,
    /// Units of 10 µs
    pub wiegand_pulse_width: u8,
    /// Units of 100 µs
    pub wiegand_pulse_interval: u8,
    /// First EPC byte copied into the Wiegand output
    pub wiegand_start_byte: u8,
}

impl ParamRecord for TransmissionParam {
    const NAME: &'static str = "TransmissionParam";
    const SIZE: usize = 6;

    fn to_bytes(&self) -> Vec<u8> {
        vec![
            self.baud_rate,
            self.rs485_address,
            self.wiegand_format as u8,
            self.wiegand_pulse_width,
            self.wiegand_pulse_interval,
            self.wiegand_start_byte,
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        let wiegand_format =
            WiegandFormat::try_from(bytes[2]).map_err(|value| RecordError::InvalidField {
                record: Self::NAME,
                field: "wiegand_format",
                value,
            })?;
        Ok(Self {
            baud_rate: bytes[0],
            rs485_address: bytes[1],
            wiegand_format,
            wiegand_pulse_width: bytes[3],
            wiegand_pulse_interval: bytes[4],
            wiegand_start_byte: bytes[5],
        })
    }
}

/// RF front-end settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdvanceParam {
    pub region: u8,
    pub start_channel: u8,
    pub end_channel: u8,
    /// Transmit power in dBm
    pub rf_power: u8,
    /// Bit n enables antenna n + 1
    pub antenna_mask: u8,
    pub q_value: u8,
    pub session: u8,
    pub target: u8,
}

impl ParamRecord for AdvanceParam {
    const NAME: &'static str = "AdvanceParam";
    const SIZE: usize = 8;

    fn to_bytes(&self) -> Vec<u8> {
        vec![
            self.region,
            self.start_channel,
            self.end_channel,
            self.rf_power,
            self.antenna_mask,
            self.q_value,
            self.session,
            self.target,
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        Ok(Self {
            region: bytes[0],
            start_channel: bytes[1],
            end_channel: bytes[2],
            rf_power: bytes[3],
            antenna_mask: bytes[4],
            q_value: bytes[5],
            session: bytes[6],
            target: bytes[7],
        })
    }
}

/// Relay, extra memory read and heartbeat settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtParam {
    /// Close the relay automatically when a tag is read
    pub relay_auto: bool,
    pub relay_time_s: u8,
    /// Report TID alongside EPC
    pub tid_enabled: bool,
    pub read_bank: MemoryBank,
    pub read_addr: u8,
    pub read_len: u8,
    /// 0 disables heartbeat notifications
    pub heartbeat_interval_s: u16,
}

impl Default for ExtParam {
    fn default() -> Self {
        Self {
            relay_auto: false,
            relay_time_s: 0,
            tid_enabled: false,
            read_bank: MemoryBank::Epc,
            read_addr: 0,
            read_len: 0,
            heartbeat_interval_s: 0,
        }
    }
}

impl ParamRecord for ExtParam {
    const NAME: &'static str = "ExtParam";
    const SIZE: usize = 8;

    fn to_bytes(&self) -> Vec<u8> {
        let heartbeat = self.heartbeat_interval_s.to_be_bytes();
        vec![
            self.relay_auto as u8,
            self.relay_time_s,
            self.tid_enabled as u8,
            self.read_bank as u8,
            self.read_addr,
            self.read_len,
            heartbeat[0],
            heartbeat[1],
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        let read_bank = MemoryBank::try_from(bytes[3]).map_err(|value| RecordError::InvalidField {
            record: Self::NAME,
            field: "read_bank",
            value,
        })?;
        Ok(Self {
            relay_auto: bytes[0] != 0,
            relay_time_s: bytes[1],
            tid_enabled: bytes[2] != 0,
            read_bank,
            read_addr: bytes[4],
            read_len: bytes[5],
            heartbeat_interval_s: be16(bytes[6], bytes[7]),
        })
    }
}

/// Reader real-time clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Default for RtcTime {
    /// 2000-01-01 00:00:00
    fn default() -> Self {
        Self {
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl ParamRecord for RtcTime {
    const NAME: &'static str = "RtcTime";
    const SIZE: usize = 7;

    fn to_bytes(&self) -> Vec<u8> {
        let year = self.year.to_be_bytes();
        vec![year[0], year[1], self.month, self.day, self.hour, self.minute, self.second]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        let invalid = |field, value| RecordError::InvalidField {
            record: Self::NAME,
            field,
            value,
        };
        if !(1..=12).contains(&bytes[2]) {
            return Err(invalid("month", bytes[2]));
        }
        if !(1..=31).contains(&bytes[3]) {
            return Err(invalid("day", bytes[3]));
        }
        if bytes[4] > 23 {
            return Err(invalid("hour", bytes[4]));
        }
        if bytes[5] > 59 {
            return Err(invalid("minute", bytes[5]));
        }
        if bytes[6] > 59 {
            return Err(invalid("second", bytes[6]));
        }
        Ok(Self {
            year: be16(bytes[0], bytes[1]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
            second: bytes[6],
        })
    }
}

/// USB output settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsbInfo {
    /// 0 keyboard emulation, 1 HID, 2 virtual COM
    pub mode: u8,
    pub append_enter: bool,
    /// 0 hex, 1 decimal
    pub output_format: u8,
    pub delimiter: u8,
}

impl ParamRecord for UsbInfo {
    const NAME: &'static str = "UsbInfo";
    const SIZE: usize = 4;

    fn to_bytes(&self) -> Vec<u8> {
        vec![self.mode, self.append_enter as u8, self.output_format, self.delimiter]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        Ok(Self {
            mode: bytes[0],
            append_enter: bytes[1] != 0,
            output_format: bytes[2],
            delimiter: bytes[3],
        })
    }
}

/// Selects which fields the reader includes in tag reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataFlag(pub u16);

impl DataFlag {
    pub const RSSI: u16 = 1 << 0;
    pub const ANTENNA: u16 = 1 << 1;
    pub const DEVICE_NO: u16 = 1 << 2;
    pub const TIMESTAMP: u16 = 1 << 3;
    pub const TID: u16 = 1 << 4;

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn with(self, flag: u16) -> Self {
        Self(self.0 | flag)
    }
}

impl ParamRecord for DataFlag {
    const NAME: &'static str = "DataFlag";
    const SIZE: usize = 2;

    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        Ok(Self(be16(bytes[0], bytes[1])))
    }
}

/// Modbus RTU slave settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModbusParam {
    pub slave_address: u8,
    pub baud_rate: u8,
    /// 0 none, 1 odd, 2 even
    pub parity: u8,
    pub register_base: u16,
}

impl ParamRecord for ModbusParam {
    const NAME: &'static str = "ModbusParam";
    const SIZE: usize = 5;

    fn to_bytes(&self) -> Vec<u8> {
        let base = self.register_base.to_be_bytes();
        vec![self.slave_address, self.baud_rate, self.parity, base[0], base[1]]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        check_size::<Self>(bytes)?;
        Ok(Self {
            slave_address: bytes[0],
            baud_rate: bytes[1],
            parity: bytes[2],
            register_base: be16(bytes[3], bytes[4]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_param_layout() {
        let param = WorkingParam {
            work_mode: WorkMode::Auto,
            output_interface: 2,
            inventory_interval_ms: 0x01F4,
            same_tag_filter_s: 3,
            trigger_delay_s: 5,
            buzzer: true,
            device_no: 9,
        };
        let bytes = param.to_bytes();
        assert_eq!(bytes, [0x01, 0x02, 0x01, 0xF4, 0x03, 0x05, 0x01, 0x09]);
        assert_eq!(WorkingParam::from_bytes(&bytes).unwrap(), param);
    }

    #[test]
    fn test_working_param_rejects_bad_mode() {
        let bytes = [0x07, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            WorkingParam::from_bytes(&bytes),
            Err(RecordError::InvalidField {
                record: "WorkingParam",
                field: "work_mode",
                value: 0x07,
            })
        );
    }

    #[test]
    fn test_undersized_input_rejected() {
        assert_eq!(
            WorkingParam::from_bytes(&[0x00; 7]),
            Err(RecordError::WrongSize {
                record: "WorkingParam",
                expected: 8,
                actual: 7,
            })
        );
        assert!(TransmissionParam::from_bytes(&[0x00; 5]).is_err());
        assert!(AdvanceParam::from_bytes(&[]).is_err());
        assert!(ExtParam::from_bytes(&[0x00; 3]).is_err());
        assert!(ModbusParam::from_bytes(&[0x00; 4]).is_err());
    }

    #[test]
    fn test_oversized_input_rejected() {
        assert!(matches!(
            AdvanceParam::from_bytes(&[0x00; 9]),
            Err(RecordError::WrongSize { expected: 8, actual: 9, .. })
        ));
    }

    #[test]
    fn test_to_bytes_emits_exact_size() {
        assert_eq!(WorkingParam::default().to_bytes().len(), WorkingParam::SIZE);
        assert_eq!(TransmissionParam::default().to_bytes().len(), TransmissionParam::SIZE);
        assert_eq!(AdvanceParam::default().to_bytes().len(), AdvanceParam::SIZE);
        assert_eq!(ExtParam::default().to_bytes().len(), ExtParam::SIZE);
        assert_eq!(RtcTime::default().to_bytes().len(), RtcTime::SIZE);
        assert_eq!(UsbInfo::default().to_bytes().len(), UsbInfo::SIZE);
        assert_eq!(DataFlag::default().to_bytes().len(), DataFlag::SIZE);
        assert_eq!(ModbusParam::default().to_bytes().len(), ModbusParam::SIZE);
    }

    #[test]
    fn test_ext_param_heartbeat_big_endian() {
        let param = ExtParam {
            read_bank: MemoryBank::Tid,
            heartbeat_interval_s: 300,
            ..Default::default()
        };
        let bytes = param.to_bytes();
        assert_eq!(&bytes[6..], &[0x01, 0x2C]);
        assert_eq!(bytes[3], 0x02);
    }

    #[test]
    fn test_ext_param_rejects_bad_bank() {
        let bytes = [0, 0, 0, 0x09, 0, 0, 0, 0];
        assert!(matches!(
            ExtParam::from_bytes(&bytes),
            Err(RecordError::InvalidField { field: "read_bank", value: 0x09, .. })
        ));
    }

    #[test]
    fn test_rtc_time_decode() {
        let time = RtcTime::from_bytes(&[0x07, 0xEA, 10, 19, 14, 30, 5]).unwrap();
        assert_eq!(time.year, 2026);
        assert_eq!((time.month, time.day), (10, 19));
        assert_eq!((time.hour, time.minute, time.second), (14, 30, 5));
    }

    #[test]
    fn test_rtc_time_default_decodes() {
        let time = RtcTime::default();
        assert_eq!(RtcTime::from_bytes(&time.to_bytes()), Ok(time));
    }

    #[test]
    fn test_rtc_time_rejects_month_zero() {
        assert!(matches!(
            RtcTime::from_bytes(&[0x07, 0xEA, 0, 1, 0, 0, 0]),
            Err(RecordError::InvalidField { field: "month", .. })
        ));
    }

    #[test]
    fn test_data_flag_bits() {
        let flag = DataFlag::default().with(DataFlag::RSSI).with(DataFlag::TID);
        assert_eq!(flag.to_bytes(), [0x00, 0x11]);
        assert!(flag.contains(DataFlag::TID));
        assert!(!flag.contains(DataFlag::ANTENNA));
    }

    #[test]
    fn test_modbus_param_layout() {
        let param = ModbusParam {
            slave_address: 1,
            baud_rate: 3,
            parity: 2,
            register_base: 0x1000,
        };
        assert_eq!(param.to_bytes(), [0x01, 0x03, 0x02, 0x10, 0x00]);
    }
}
