//! Decoding of received frames into [`DecodedEvent`]s.
//!
//! Every response with a known frame code produces exactly one event. When a
//! response lacks its status attribute the event carries [`Status::MISSING`]
//! instead of being dropped. Payload attributes are only decoded when the
//! status reports success.

use log::{debug, error, warn};

use crate::command::FrameCode;
use crate::error::FrameDecodeError;
use crate::frame::{Frame, frame_type};
use crate::params::{
    AdvanceParam, DataFlag, ExtParam, ModbusParam, ParamRecord, RtcTime, TransmissionParam,
    UsbInfo, WorkingParam,
};
use crate::tlv::{Attribute, RawAttribute, attr};
use crate::types::{DeviceInfo, OfflineRecord, Status, TagReadEvent};

/// The result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// Pass/fail acknowledgement of a command without response payload
    Ack { code: FrameCode, status: Status },
    DeviceInfo {
        status: Status,
        info: Option<DeviceInfo>,
    },
    WorkingParam {
        status: Status,
        param: Option<WorkingParam>,
    },
    TransmissionParam {
        status: Status,
        param: Option<TransmissionParam>,
    },
    AdvanceParam {
        status: Status,
        param: Option<AdvanceParam>,
    },
    ExtParam {
        status: Status,
        param: Option<ExtParam>,
    },
    SingleParam {
        status: Status,
        address: Option<u8>,
        value: Option<Vec<u8>>,
    },
    /// Tags returned by `InventoryOnce` or `GetTagData`
    TagList {
        code: FrameCode,
        status: Status,
        tags: Vec<TagReadEvent>,
    },
    /// Memory returned by `ReadTag` or `ReadBlock`
    TagMemory {
        code: FrameCode,
        status: Status,
        data: Option<Vec<u8>>,
    },
    RtcTime {
        status: Status,
        time: Option<RtcTime>,
    },
    UsbInfo {
        status: Status,
        info: Option<UsbInfo>,
    },
    DataFlag {
        status: Status,
        flag: Option<DataFlag>,
    },
    ModbusParam {
        status: Status,
        param: Option<ModbusParam>,
    },
    TagNotification(Vec<TagReadEvent>),
    RecordNotification(Vec<OfflineRecord>),
    Heartbeat { device_no: Option<u8> },
    /// A well-formed frame whose code this crate does not know
    Unknown {
        frame_type: u8,
        frame_code: u8,
        attributes: Vec<RawAttribute>,
    },
}

impl DecodedEvent {
    /// Raw frame code of the frame this event was decoded from.
    pub fn frame_code(&self) -> u8 {
        let code = match self {
            DecodedEvent::Ack { code, .. }
            | DecodedEvent::TagList { code, .. }
            | DecodedEvent::TagMemory { code, .. } => *code,
            DecodedEvent::DeviceInfo { .. } => FrameCode::GetDeviceInfo,
            DecodedEvent::WorkingParam { .. } => FrameCode::QueryWorkingParam,
            DecodedEvent::TransmissionParam { .. } => FrameCode::QueryTransmissionParam,
            DecodedEvent::AdvanceParam { .. } => FrameCode::QueryAdvanceParam,
            DecodedEvent::ExtParam { .. } => FrameCode::QueryExtParam,
            DecodedEvent::SingleParam { .. } => FrameCode::QuerySingleParam,
            DecodedEvent::RtcTime { .. } => FrameCode::QueryRtcTime,
            DecodedEvent::UsbInfo { .. } => FrameCode::QueryUsbInfo,
            DecodedEvent::DataFlag { .. } => FrameCode::QueryDataFlag,
            DecodedEvent::ModbusParam { .. } => FrameCode::QueryModbusParam,
            DecodedEvent::TagNotification(_) => FrameCode::TagNotify,
            DecodedEvent::RecordNotification(_) => FrameCode::RecordNotify,
            DecodedEvent::Heartbeat { .. } => FrameCode::Heartbeat,
            DecodedEvent::Unknown { frame_code, .. } => return *frame_code,
        };
        code.as_u8()
    }

    /// Result code of a response; `None` for notifications.
    pub fn status(&self) -> Option<Status> {
        match self {
            DecodedEvent::Ack { status, .. }
            | DecodedEvent::DeviceInfo { status, .. }
            | DecodedEvent::WorkingParam { status, .. }
            | DecodedEvent::TransmissionParam { status, .. }
            | DecodedEvent::AdvanceParam { status, .. }
            | DecodedEvent::ExtParam { status, .. }
            | DecodedEvent::SingleParam { status, .. }
            | DecodedEvent::TagList { status, .. }
            | DecodedEvent::TagMemory { status, .. }
            | DecodedEvent::RtcTime { status, .. }
            | DecodedEvent::UsbInfo { status, .. }
            | DecodedEvent::DataFlag { status, .. }
            | DecodedEvent::ModbusParam { status, .. } => Some(*status),
            DecodedEvent::TagNotification(_)
            | DecodedEvent::RecordNotification(_)
            | DecodedEvent::Heartbeat { .. } => None,
            DecodedEvent::Unknown { .. } => None,
        }
    }

    pub fn is_notification(&self) -> bool {
        match self {
            DecodedEvent::TagNotification(_)
            | DecodedEvent::RecordNotification(_)
            | DecodedEvent::Heartbeat { .. } => true,
            DecodedEvent::Unknown { frame_type: t, .. } => *t == frame_type::NOTIFICATION,
            _ => false,
        }
    }
}

/// Receiver of decoded frames.
///
/// Any `FnMut(DecodedEvent)` closure is a sink.
pub trait NotificationSink {
    fn on_event(&mut self, event: DecodedEvent);

    /// Called instead of `on_event` when a frame could not be decoded.
    fn on_decode_error(&mut self, _error: &FrameDecodeError) {}
}

impl<F: FnMut(DecodedEvent)> NotificationSink for F {
    fn on_event(&mut self, event: DecodedEvent) {
        self(event)
    }
}

/// Decode one complete frame, then hand the result to `sink`.
///
/// Exactly one sink method is invoked per call.
pub fn dispatch_frame<S>(bytes: &[u8], sink: &mut S) -> Result<(), FrameDecodeError>
where
    S: NotificationSink + ?Sized,
{
    match decode_frame(bytes) {
        Ok(event) => {
            sink.on_event(event);
            Ok(())
        }
        Err(e) => {
            error!("Dropping undecodable frame {:02X?}: {}", bytes, e);
            sink.on_decode_error(&e);
            Err(e)
        }
    }
}

/// Decode one complete frame.
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedEvent, FrameDecodeError> {
    let frame = Frame::parse(bytes)?;
    // validates every attribute length up front
    let attrs = frame.attributes().collect_all()?;
    debug!(
        "Decoding frame type 0x{:02X} code 0x{:02X} with {} attributes",
        frame.frame_type,
        frame.frame_code,
        attrs.len()
    );

    let code = FrameCode::try_from(frame.frame_code);
    match (frame.frame_type, code) {
        (frame_type::RESPONSE, Ok(code)) if !is_notification_code(code) => {
            decode_response(code, &attrs)
        }
        (frame_type::NOTIFICATION, Ok(code)) if is_notification_code(code) => {
            decode_notification(code, &attrs)
        }
        (frame_type::RESPONSE | frame_type::NOTIFICATION, _) => {
            warn!(
                "Unhandled frame code 0x{:02X} for frame type 0x{:02X}",
                frame.frame_code, frame.frame_type
            );
            Ok(DecodedEvent::Unknown {
                frame_type: frame.frame_type,
                frame_code: frame.frame_code,
                attributes: attrs.into_iter().map(RawAttribute::from).collect(),
            })
        }
        (other, _) => Err(FrameDecodeError::UnsupportedFrameType(other)),
    }
}

fn is_notification_code(code: FrameCode) -> bool {
    matches!(
        code,
        FrameCode::TagNotify | FrameCode::RecordNotify | FrameCode::Heartbeat
    )
}

fn find<'a>(attrs: &[Attribute<'a>], kind: u8) -> Option<Attribute<'a>> {
    attrs.iter().find(|a| a.kind == kind).copied()
}

fn require<'a>(
    attrs: &[Attribute<'a>],
    code: FrameCode,
    kind: u8,
) -> Result<Attribute<'a>, FrameDecodeError> {
    find(attrs, kind).ok_or(FrameDecodeError::MissingAttribute {
        frame_code: code.as_u8(),
        kind,
    })
}

fn status_of(attrs: &[Attribute<'_>]) -> Status {
    match find(attrs, attr::STATUS).and_then(|a| a.as_u8()) {
        Some(code) => Status(code),
        None => Status::MISSING,
    }
}

/// Decode a record payload, but only once the status has confirmed success.
fn record<R: ParamRecord>(
    attrs: &[Attribute<'_>],
    code: FrameCode,
    status: Status,
    kind: u8,
) -> Result<Option<R>, FrameDecodeError> {
    if !status.is_success() {
        return Ok(None);
    }
    let attr = require(attrs, code, kind)?;
    Ok(Some(R::from_bytes(attr.value)?))
}

fn decode_response(code: FrameCode, attrs: &[Attribute<'_>]) -> Result<DecodedEvent, FrameDecodeError> {
    let status = status_of(attrs);
    if status.is_missing() {
        warn!("Response 0x{:02X} carries no status attribute", code.as_u8());
    }

    let event = match code {
        FrameCode::GetDeviceInfo => {
            let info = if status.is_success() {
                let version = require(attrs, code, attr::FIRMWARE_VERSION)?;
                Some(DeviceInfo {
                    device_type: find(attrs, attr::DEVICE_TYPE).and_then(|a| a.as_u8()),
                    firmware_version: String::from_utf8_lossy(version.value).into_owned(),
                })
            } else {
                None
            };
            DecodedEvent::DeviceInfo { status, info }
        }
        FrameCode::QueryWorkingParam => DecodedEvent::WorkingParam {
            status,
            param: record(attrs, code, status, attr::WORKING_PARAM)?,
        },
        FrameCode::QueryTransmissionParam => DecodedEvent::TransmissionParam {
            status,
            param: record(attrs, code, status, attr::TRANSMISSION_PARAM)?,
        },
        FrameCode::QueryAdvanceParam => DecodedEvent::AdvanceParam {
            status,
            param: record(attrs, code, status, attr::ADVANCE_PARAM)?,
        },
        FrameCode::QueryExtParam => DecodedEvent::ExtParam {
            status,
            param: record(attrs, code, status, attr::EXT_PARAM)?,
        },
        FrameCode::QuerySingleParam => {
            let value = if status.is_success() {
                Some(require(attrs, code, attr::PARAM_VALUE)?.value.to_vec())
            } else {
                None
            };
            DecodedEvent::SingleParam {
                status,
                address: find(attrs, attr::PARAM_ADDR).and_then(|a| a.as_u8()),
                value,
            }
        }
        FrameCode::InventoryOnce | FrameCode::GetTagData => {
            let tags = if status.is_success() {
                decode_tags(attrs, code)?
            } else {
                Vec::new()
            };
            DecodedEvent::TagList { code, status, tags }
        }
        FrameCode::ReadTag | FrameCode::ReadBlock => {
            let data = if status.is_success() {
                Some(require(attrs, code, attr::TAG_DATA)?.value.to_vec())
            } else {
                None
            };
            DecodedEvent::TagMemory { code, status, data }
        }
        FrameCode::QueryRtcTime => DecodedEvent::RtcTime {
            status,
            time: record(attrs, code, status, attr::RTC_TIME)?,
        },
        FrameCode::QueryUsbInfo => DecodedEvent::UsbInfo {
            status,
            info: record(attrs, code, status, attr::USB_INFO)?,
        },
        FrameCode::QueryDataFlag => DecodedEvent::DataFlag {
            status,
            flag: record(attrs, code, status, attr::DATA_FLAG)?,
        },
        FrameCode::QueryModbusParam => DecodedEvent::ModbusParam {
            status,
            param: record(attrs, code, status, attr::MODBUS_PARAM)?,
        },
        _ => DecodedEvent::Ack { code, status },
    };
    Ok(event)
}

fn decode_notification(
    code: FrameCode,
    attrs: &[Attribute<'_>],
) -> Result<DecodedEvent, FrameDecodeError> {
    let event = match code {
        FrameCode::TagNotify => DecodedEvent::TagNotification(decode_tags(attrs, code)?),
        FrameCode::RecordNotify => {
            let mut records = Vec::new();
            for container in attrs.iter().filter(|a| a.kind == attr::SINGLE_TAG_DATA) {
                let inner = container.nested().collect_all()?;
                // a bad clock value only costs this record its timestamp
                let time = match find(&inner, attr::RTC_TIME).map(|t| RtcTime::from_bytes(t.value)) {
                    Some(Ok(time)) => Some(time),
                    Some(Err(e)) => {
                        warn!("Offline record carries an unusable timestamp: {}", e);
                        None
                    }
                    None => None,
                };
                records.push(OfflineRecord {
                    tag: tag_from(&inner, code)?,
                    time,
                });
            }
            DecodedEvent::RecordNotification(records)
        }
        _ => DecodedEvent::Heartbeat {
            device_no: find(attrs, attr::DEVICE_NO).and_then(|a| a.as_u8()),
        },
    };
    Ok(event)
}

/// One [`TagReadEvent`] per single-tag-data container, in frame order.
fn decode_tags(attrs: &[Attribute<'_>], code: FrameCode) -> Result<Vec<TagReadEvent>, FrameDecodeError> {
    attrs
        .iter()
        .filter(|a| a.kind == attr::SINGLE_TAG_DATA)
        .map(|container| {
            let inner = container.nested().collect_all()?;
            tag_from(&inner, code)
        })
        .collect()
}

fn tag_from(inner: &[Attribute<'_>], code: FrameCode) -> Result<TagReadEvent, FrameDecodeError> {
    let epc = require(inner, code, attr::EPC)?;
    Ok(TagReadEvent {
        epc: epc.value.to_vec(),
        rssi: find(inner, attr::RSSI).and_then(|a| a.as_u8()),
        antenna: find(inner, attr::ANTENNA).and_then(|a| a.as_u8()),
        device_no: find(inner, attr::DEVICE_NO).and_then(|a| a.as_u8()),
        tid: find(inner, attr::TID).map(|a| a.value.to_vec()),
    })
}
