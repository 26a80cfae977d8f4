use log::{debug, error, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::assembler::FrameAssembler;
use crate::command::{Command, FrameCode, build_frame};
use crate::error::RfidError;
use crate::event::{DecodedEvent, NotificationSink, decode_frame, dispatch_frame};
use crate::frame::frame_type;
use crate::params::{
    AdvanceParam, DataFlag, ExtParam, ModbusParam, RtcTime, TransmissionParam, UsbInfo,
    WorkingParam,
};
use crate::transport::RfidTransport;
use crate::types::{DeviceInfo, LockAction, LockArea, MemoryBank, Status, TagReadEvent};

/// Timing and buffering settings for [`RfidReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// How long [`RfidReader::execute`] waits for the matching response
    pub response_timeout: Duration,
    /// Timeout handed to each transport read
    pub read_timeout_ms: u32,
    /// Size of the buffer used for each transport read
    pub read_chunk: usize,
    /// Frames announcing more bytes than this are treated as line noise
    pub max_frame_len: usize,
    /// Notifications held for [`RfidReader::take_notifications`]; the oldest
    /// is dropped once the limit is reached
    pub max_queued_notifications: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            read_timeout_ms: 50,
            read_chunk: 256,
            max_frame_len: FrameAssembler::DEFAULT_MAX_FRAME_LEN,
            max_queued_notifications: 256,
        }
    }
}

/// Blocking driver for one reader.
///
/// Every call takes `&mut self`, so at most one command is outstanding at a
/// time. The protocol has no correlation id; a response is matched to the
/// command with the same frame code. Notifications that arrive while a
/// response is awaited are queued and handed out by [`RfidReader::poll`] or
/// [`RfidReader::take_notifications`].
pub struct RfidReader<T: RfidTransport> {
    transport: T,
    config: ReaderConfig,
    assembler: FrameAssembler,
    notifications: VecDeque<DecodedEvent>,
}

impl<T: RfidTransport> RfidReader<T> {
    /// Create a reader with default timing
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReaderConfig::default())
    }

    pub fn with_config(transport: T, config: ReaderConfig) -> Self {
        Self {
            transport,
            assembler: FrameAssembler::new(config.max_frame_len),
            config,
            notifications: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Drop buffered bytes and queued notifications.
    pub fn clear_input(&mut self) -> Result<(), RfidError> {
        self.assembler.clear();
        self.notifications.clear();
        self.transport.clear_input().map_err(transport_error)
    }

    /// Encode and write a command without waiting for its response.
    pub fn send(&mut self, command: &Command) -> Result<(), RfidError> {
        let frame = build_frame(command)?;
        debug!("Sending {:?}: {:02X?}", command.frame_code(), frame);
        if !self.transport.write_all(&frame).map_err(transport_error)? {
            return Err(RfidError::Transport(format!(
                "transport stopped accepting bytes while sending {:?}",
                command.frame_code()
            )));
        }
        Ok(())
    }

    /// Send a command and wait for the response carrying the same frame code.
    ///
    /// Undecodable frames are logged and skipped, except when they are the
    /// awaited response itself.
    pub fn execute(&mut self, command: &Command) -> Result<DecodedEvent, RfidError> {
        let expected = command.frame_code().as_u8();
        self.send(command)?;
        let deadline = Instant::now() + self.config.response_timeout;

        loop {
            while let Some(bytes) = self.assembler.next_frame() {
                match decode_frame(&bytes) {
                    Ok(event) if event.is_notification() => self.queue_notification(event),
                    Ok(event) if event.frame_code() == expected => return Ok(event),
                    Ok(event) => {
                        warn!(
                            "Ignoring response 0x{:02X} while waiting for 0x{:02X}",
                            event.frame_code(),
                            expected
                        );
                    }
                    Err(e) => {
                        error!("Failed to decode frame {:02X?}: {}", bytes, e);
                        if bytes[2] == frame_type::RESPONSE && bytes[5] == expected {
                            return Err(e.into());
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(RfidError::Timeout(expected));
            }
            self.fill()?;
        }
    }

    /// Deliver queued notifications, then read once and dispatch every
    /// complete frame to `sink`.
    ///
    /// Returns the number of events delivered. Undecodable frames go to
    /// [`NotificationSink::on_decode_error`] and are not counted.
    pub fn poll<S>(&mut self, sink: &mut S) -> Result<usize, RfidError>
    where
        S: NotificationSink + ?Sized,
    {
        let mut delivered = 0;
        for event in self.notifications.drain(..) {
            sink.on_event(event);
            delivered += 1;
        }

        self.fill()?;
        while let Some(bytes) = self.assembler.next_frame() {
            if dispatch_frame(&bytes, sink).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Notifications received while waiting for responses.
    pub fn take_notifications(&mut self) -> Vec<DecodedEvent> {
        self.notifications.drain(..).collect()
    }

    /// Run a continuous inventory for `duration`, calling `callback` for each
    /// tag notification received, then stop it.
    ///
    /// Returns the number of tags reported.
    pub fn inventory_for_duration<F>(&mut self, duration: Duration, mut callback: F) -> Result<usize, RfidError>
    where
        F: FnMut(TagReadEvent),
    {
        self.start_inventory()?;

        let mut tag_count = 0;
        let mut on_event = |event: DecodedEvent| {
            if let DecodedEvent::TagNotification(tags) = event {
                for tag in tags {
                    callback(tag);
                    tag_count += 1;
                }
            }
        };

        let start = Instant::now();
        let polled = loop {
            if start.elapsed() >= duration {
                break Ok(());
            }
            if let Err(e) = self.poll(&mut on_event) {
                break Err(e);
            }
        };

        // stop even when polling failed
        let stopped = self.stop_inventory();
        // tags that arrived while waiting for the stop acknowledgement
        for event in self.take_notifications() {
            on_event(event);
        }
        polled?;
        stopped?;

        Ok(tag_count)
    }

    /// Like [`RfidReader::inventory_for_duration`], collecting the tags.
    pub fn inventory_tags(&mut self, duration: Duration) -> Result<Vec<TagReadEvent>, RfidError> {
        let mut tags = Vec::new();
        self.inventory_for_duration(duration, |tag| tags.push(tag))?;
        Ok(tags)
    }

    /// Reboot the reader
    pub fn reset(&mut self) -> Result<(), RfidError> {
        self.ack(Command::Reset)
    }

    /// Restore factory defaults
    pub fn factory_reset(&mut self) -> Result<(), RfidError> {
        self.ack(Command::FactoryReset)
    }

    pub fn device_info(&mut self) -> Result<DeviceInfo, RfidError> {
        match self.execute(&Command::GetDeviceInfo)? {
            DecodedEvent::DeviceInfo { status, info } => payload(FrameCode::GetDeviceInfo, status, info),
            other => Err(unexpected(other)),
        }
    }

    /// Start continuous inventory; tags arrive as notifications.
    pub fn start_inventory(&mut self) -> Result<(), RfidError> {
        self.ack(Command::StartInventory)
    }

    pub fn stop_inventory(&mut self) -> Result<(), RfidError> {
        self.ack(Command::StopInventory)
    }

    /// Run a single inventory round and return the tags it found.
    pub fn inventory_once(&mut self) -> Result<Vec<TagReadEvent>, RfidError> {
        self.tag_list(Command::InventoryOnce)
    }

    /// Fetch the tags cached by the reader.
    pub fn tag_data(&mut self) -> Result<Vec<TagReadEvent>, RfidError> {
        self.tag_list(Command::GetTagData)
    }

    pub fn working_param(&mut self) -> Result<WorkingParam, RfidError> {
        match self.execute(&Command::QueryWorkingParam)? {
            DecodedEvent::WorkingParam { status, param } => {
                payload(FrameCode::QueryWorkingParam, status, param)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn set_working_param(&mut self, param: &WorkingParam) -> Result<(), RfidError> {
        self.ack(Command::SetWorkingParam(param.clone()))
    }

    pub fn transmission_param(&mut self) -> Result<TransmissionParam, RfidError> {
        match self.execute(&Command::QueryTransmissionParam)? {
            DecodedEvent::TransmissionParam { status, param } => {
                payload(FrameCode::QueryTransmissionParam, status, param)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn set_transmission_param(&mut self, param: &TransmissionParam) -> Result<(), RfidError> {
        self.ack(Command::SetTransmissionParam(param.clone()))
    }

    pub fn advance_param(&mut self) -> Result<AdvanceParam, RfidError> {
        match self.execute(&Command::QueryAdvanceParam)? {
            DecodedEvent::AdvanceParam { status, param } => {
                payload(FrameCode::QueryAdvanceParam, status, param)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn set_advance_param(&mut self, param: &AdvanceParam) -> Result<(), RfidError> {
        self.ack(Command::SetAdvanceParam(param.clone()))
    }

    pub fn ext_param(&mut self) -> Result<ExtParam, RfidError> {
        match self.execute(&Command::QueryExtParam)? {
            DecodedEvent::ExtParam { status, param } => payload(FrameCode::QueryExtParam, status, param),
            other => Err(unexpected(other)),
        }
    }

    pub fn set_ext_param(&mut self, param: &ExtParam) -> Result<(), RfidError> {
        self.ack(Command::SetExtParam(param.clone()))
    }

    /// Read one parameter by address
    pub fn single_param(&mut self, address: u8) -> Result<Vec<u8>, RfidError> {
        match self.execute(&Command::QuerySingleParam { address })? {
            DecodedEvent::SingleParam { status, value, .. } => {
                payload(FrameCode::QuerySingleParam, status, value)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn set_single_param(&mut self, address: u8, value: &[u8]) -> Result<(), RfidError> {
        self.ack(Command::SetSingleParam {
            address,
            value: value.to_vec(),
        })
    }

    /// Read `word_count` words from a tag memory bank
    pub fn read_tag(
        &mut self,
        password: &[u8; 4],
        bank: MemoryBank,
        word_addr: u16,
        word_count: u8,
    ) -> Result<Vec<u8>, RfidError> {
        self.tag_memory(Command::ReadTag {
            password: *password,
            bank,
            word_addr,
            word_count,
        })
    }

    /// Write `word_count` words; `data` must hold at least `word_count * 2` bytes
    pub fn write_tag(
        &mut self,
        password: &[u8; 4],
        bank: MemoryBank,
        word_addr: u16,
        word_count: u8,
        data: &[u8],
    ) -> Result<(), RfidError> {
        self.ack(Command::WriteTag {
            password: *password,
            bank,
            word_addr,
            word_count,
            data: data.to_vec(),
        })
    }

    pub fn read_block(
        &mut self,
        password: &[u8; 4],
        bank: MemoryBank,
        block_addr: u16,
        block_count: u8,
    ) -> Result<Vec<u8>, RfidError> {
        self.tag_memory(Command::ReadBlock {
            password: *password,
            bank,
            block_addr,
            block_count,
        })
    }

    pub fn write_epc(&mut self, password: &[u8; 4], epc: &[u8]) -> Result<(), RfidError> {
        self.ack(Command::WriteEpc {
            password: *password,
            epc: epc.to_vec(),
        })
    }

    pub fn lock_tag(&mut self, password: &[u8; 4], area: LockArea, action: LockAction) -> Result<(), RfidError> {
        self.ack(Command::LockTag {
            password: *password,
            area,
            action,
        })
    }

    /// Permanently disable a tag
    pub fn kill_tag(&mut self, kill_password: &[u8; 4]) -> Result<(), RfidError> {
        self.ack(Command::KillTag {
            kill_password: *kill_password,
        })
    }

    pub fn write_wiegand_number(&mut self, password: &[u8; 4], number: u32) -> Result<(), RfidError> {
        self.ack(Command::WriteWiegandNumber {
            password: *password,
            number,
        })
    }

    pub fn add_verify_to_tag(&mut self, password: &[u8; 4], data: &[u8]) -> Result<(), RfidError> {
        self.ack(Command::AddVerifyToTag {
            password: *password,
            data: data.to_vec(),
        })
    }

    /// Ask the reader to push its stored offline records as notifications
    pub fn upload_records(&mut self) -> Result<(), RfidError> {
        self.ack(Command::UploadRecord)
    }

    pub fn rtc_time(&mut self) -> Result<RtcTime, RfidError> {
        match self.execute(&Command::QueryRtcTime)? {
            DecodedEvent::RtcTime { status, time } => payload(FrameCode::QueryRtcTime, status, time),
            other => Err(unexpected(other)),
        }
    }

    pub fn set_rtc_time(&mut self, time: &RtcTime) -> Result<(), RfidError> {
        self.ack(Command::SetRtcTime(*time))
    }

    pub fn play_audio(&mut self, text: &[u8]) -> Result<(), RfidError> {
        self.ack(Command::AudioPlay(text.to_vec()))
    }

    pub fn set_offline_context(&mut self, content: &[u8]) -> Result<(), RfidError> {
        self.ack(Command::SetOfflineContext(content.to_vec()))
    }

    /// Close `relay` for `close_time_s` seconds
    pub fn operate_relay(&mut self, relay: u8, close_time_s: u8) -> Result<(), RfidError> {
        self.ack(Command::RelayOperate { relay, close_time_s })
    }

    pub fn usb_info(&mut self) -> Result<UsbInfo, RfidError> {
        match self.execute(&Command::QueryUsbInfo)? {
            DecodedEvent::UsbInfo { status, info } => payload(FrameCode::QueryUsbInfo, status, info),
            other => Err(unexpected(other)),
        }
    }

    pub fn set_usb_info(&mut self, info: &UsbInfo) -> Result<(), RfidError> {
        self.ack(Command::SetUsbInfo(info.clone()))
    }

    pub fn data_flag(&mut self) -> Result<DataFlag, RfidError> {
        match self.execute(&Command::QueryDataFlag)? {
            DecodedEvent::DataFlag { status, flag } => payload(FrameCode::QueryDataFlag, status, flag),
            other => Err(unexpected(other)),
        }
    }

    pub fn set_data_flag(&mut self, flag: DataFlag) -> Result<(), RfidError> {
        self.ack(Command::SetDataFlag(flag))
    }

    pub fn modbus_param(&mut self) -> Result<ModbusParam, RfidError> {
        match self.execute(&Command::QueryModbusParam)? {
            DecodedEvent::ModbusParam { status, param } => {
                payload(FrameCode::QueryModbusParam, status, param)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn set_modbus_param(&mut self, param: &ModbusParam) -> Result<(), RfidError> {
        self.ack(Command::SetModbusParam(param.clone()))
    }

    fn ack(&mut self, command: Command) -> Result<(), RfidError> {
        match self.execute(&command)? {
            DecodedEvent::Ack { code, status } => check_status(code, status),
            other => Err(unexpected(other)),
        }
    }

    fn tag_list(&mut self, command: Command) -> Result<Vec<TagReadEvent>, RfidError> {
        match self.execute(&command)? {
            DecodedEvent::TagList { code, status, tags } => {
                check_status(code, status)?;
                Ok(tags)
            }
            other => Err(unexpected(other)),
        }
    }

    fn tag_memory(&mut self, command: Command) -> Result<Vec<u8>, RfidError> {
        match self.execute(&command)? {
            DecodedEvent::TagMemory { code, status, data } => payload(code, status, data),
            other => Err(unexpected(other)),
        }
    }

    fn queue_notification(&mut self, event: DecodedEvent) {
        let limit = self.config.max_queued_notifications;
        if limit == 0 {
            warn!("Notification queue disabled, dropping 0x{:02X}", event.frame_code());
            return;
        }
        while self.notifications.len() >= limit {
            if let Some(dropped) = self.notifications.pop_front() {
                warn!(
                    "Notification queue full ({}), dropping oldest 0x{:02X}",
                    limit,
                    dropped.frame_code()
                );
            }
        }
        self.notifications.push_back(event);
    }

    /// One transport read into the assembler.
    fn fill(&mut self) -> Result<usize, RfidError> {
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        match self.transport.read(&mut chunk, self.config.read_timeout_ms) {
            Ok(0) => Ok(0),
            Ok(bytes_read) => {
                debug!("Received {} bytes: {:02X?}", bytes_read, &chunk[..bytes_read]);
                self.assembler.push(&chunk[..bytes_read]);
                Ok(bytes_read)
            }
            Err(e) => {
                error!("Read error: {:?}", e);
                Err(transport_error(e))
            }
        }
    }
}

fn transport_error<E: std::fmt::Debug>(e: E) -> RfidError {
    RfidError::Transport(format!("{:?}", e))
}

fn check_status(code: FrameCode, status: Status) -> Result<(), RfidError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RfidError::CommandFailed {
            code: code.as_u8(),
            status: status.0,
        })
    }
}

fn payload<P>(code: FrameCode, status: Status, value: Option<P>) -> Result<P, RfidError> {
    check_status(code, status)?;
    value.ok_or_else(|| {
        RfidError::UnexpectedResponse(format!("response 0x{:02X} carried no payload", code.as_u8()))
    })
}

fn unexpected(event: DecodedEvent) -> RfidError {
    RfidError::UnexpectedResponse(format!("{:?}", event))
}
