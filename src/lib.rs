//! Codec and driver for UHF RFID readers speaking the "RF" binary protocol.
//!
//! The crate is split in two layers:
//!
//! - a pure codec: [`build_frame`] turns a [`Command`] into a checksummed
//!   frame, [`decode_frame`] turns one received frame into a
//!   [`DecodedEvent`], and [`dispatch_frame`] hands it to a
//!   [`NotificationSink`];
//! - a blocking driver, [`RfidReader`], which wires the codec to an
//!   [`RfidTransport`] and matches responses to commands.
//!
//! # Features
//!
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use rf_reader::{RfidReader, SerialTransport};
//! use std::time::Duration;
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 115200)?;
//! let mut reader = RfidReader::new(transport);
//!
//! println!("Firmware: {}", reader.device_info()?.firmware_version);
//! for tag in reader.inventory_tags(Duration::from_secs(2))? {
//!     println!("Found tag: {}", tag.epc_hex());
//! }
//! ```

mod assembler;
mod command;
mod error;
mod event;
mod frame;
mod params;
mod reader;
mod tlv;
mod transport;
mod types;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use assembler::FrameAssembler;
pub use command::{Command, FrameCode, build_frame};
pub use error::{BuildError, FrameDecodeError, RecordError, RfidError};
pub use event::{DecodedEvent, NotificationSink, decode_frame, dispatch_frame};
pub use frame::{Frame, MARKER, checksum, frame_type};
pub use params::{
    AdvanceParam, DataFlag, ExtParam, ModbusParam, ParamRecord, RtcTime, TransmissionParam,
    UsbInfo, WiegandFormat, WorkMode, WorkingParam,
};
pub use reader::{ReaderConfig, RfidReader};
pub use tlv::{Attribute, Cursor, RawAttribute, TlvScanner, TlvWriter, attr};
pub use transport::RfidTransport;
pub use types::{
    DeviceInfo, LockAction, LockArea, MemoryBank, OfflineRecord, Status, TagReadEvent,
};

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Mock transport that replays queued reads and records every write.
    ///
    /// Each write also releases the next scripted reply into the read queue.
    #[derive(Default)]
    struct MockTransport {
        reads: VecDeque<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        written: Vec<Vec<u8>>,
        fail_reads: bool,
    }

    impl MockTransport {
        fn with_reads(reads: Vec<Vec<u8>>) -> Self {
            Self {
                reads: reads.into(),
                ..Default::default()
            }
        }
    }

    impl RfidTransport for MockTransport {
        type Error = std::io::Error;

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            self.written.push(data.to_vec());
            if let Some(reply) = self.replies.pop_front() {
                self.reads.push_back(reply);
            }
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
            if self.fail_reads {
                return Err(std::io::Error::other("port unplugged"));
            }
            match self.reads.pop_front() {
                Some(mut chunk) => {
                    let len = chunk.len().min(buf.len());
                    buf[..len].copy_from_slice(&chunk[..len]);
                    if len < chunk.len() {
                        self.reads.push_front(chunk.split_off(len));
                    }
                    Ok(len)
                }
                None => Ok(0),
            }
        }

        fn clear_input(&mut self) -> Result<(), Self::Error> {
            self.reads.clear();
            Ok(())
        }
    }

    fn fast_config() -> ReaderConfig {
        ReaderConfig {
            response_timeout: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn reader(reads: Vec<Vec<u8>>) -> RfidReader<MockTransport> {
        RfidReader::with_config(MockTransport::with_reads(reads), fast_config())
    }

    fn response(code: FrameCode, block: &[u8]) -> Vec<u8> {
        let mut frame = vec![b'R', b'F', frame_type::RESPONSE, 0x00, 0x00, code.as_u8()];
        frame.extend_from_slice(&(block.len() as u16).to_be_bytes());
        frame.extend_from_slice(block);
        frame.push(checksum(&frame));
        frame
    }

    fn ok(code: FrameCode) -> Vec<u8> {
        response(code, &[attr::STATUS, 0x01, 0x00])
    }

    fn tag_notification(epcs: &[&[u8]]) -> Vec<u8> {
        let mut block = TlvWriter::new();
        for (i, epc) in epcs.iter().enumerate() {
            let mut tag = TlvWriter::new();
            tag.put(attr::EPC, epc).unwrap();
            tag.put_u8(attr::ANTENNA, i as u8 + 1).unwrap();
            block.put(attr::SINGLE_TAG_DATA, &tag.into_bytes()).unwrap();
        }
        let block = block.into_bytes();
        let mut frame = vec![b'R', b'F', frame_type::NOTIFICATION, 0x00, 0x00, FrameCode::TagNotify.as_u8()];
        frame.extend_from_slice(&(block.len() as u16).to_be_bytes());
        frame.extend_from_slice(&block);
        frame.push(checksum(&frame));
        frame
    }

    // ===================
    // command/response tests
    // ===================

    #[test]
    fn test_start_inventory_wire_bytes() {
        let mut rfid = reader(vec![ok(FrameCode::StartInventory)]);
        rfid.start_inventory().unwrap();
        assert_eq!(
            rfid.transport().written,
            vec![vec![0x52, 0x46, 0x00, 0x00, 0x00, 0x21, 0x00, 0x00, 0x47]]
        );
    }

    #[test]
    fn test_execute_returns_ack() {
        let reply = vec![0x52, 0x46, 0x01, 0x00, 0x00, 0x21, 0x00, 0x03, 0x07, 0x01, 0x00, 0x3B];
        let mut rfid = reader(vec![reply]);
        let event = rfid.execute(&Command::StartInventory).unwrap();
        assert_eq!(
            event,
            DecodedEvent::Ack {
                code: FrameCode::StartInventory,
                status: Status(0),
            }
        );
    }

    #[test]
    fn test_response_split_across_reads() {
        let reply = ok(FrameCode::Reset);
        let (a, b) = reply.split_at(4);
        let mut rfid = reader(vec![a.to_vec(), b.to_vec()]);
        assert!(rfid.reset().is_ok());
    }

    #[test]
    fn test_device_error_status() {
        let mut rfid = reader(vec![response(FrameCode::KillTag, &[attr::STATUS, 0x01, 0x09])]);
        let result = rfid.kill_tag(&[0x11, 0x22, 0x33, 0x44]);
        assert!(matches!(result, Err(RfidError::CommandFailed { code: 0x35, status: 0x09 })));
    }

    #[test]
    fn test_missing_status_is_failure() {
        let mut rfid = reader(vec![response(FrameCode::FactoryReset, &[])]);
        assert!(matches!(
            rfid.factory_reset(),
            Err(RfidError::CommandFailed { status: 0xFE, .. })
        ));
    }

    #[test]
    fn test_timeout_without_response() {
        let mut rfid = reader(vec![]);
        assert!(matches!(rfid.stop_inventory(), Err(RfidError::Timeout(0x22))));
    }

    #[test]
    fn test_transport_read_error() {
        let transport = MockTransport {
            fail_reads: true,
            ..Default::default()
        };
        let mut rfid = RfidReader::with_config(transport, fast_config());
        assert!(matches!(rfid.reset(), Err(RfidError::Transport(_))));
    }

    #[test]
    fn test_out_of_turn_response_ignored() {
        let mut rfid = reader(vec![ok(FrameCode::Reset), ok(FrameCode::StopInventory)]);
        assert!(rfid.stop_inventory().is_ok());
    }

    #[test]
    fn test_notification_queued_while_waiting() {
        let mut stream = tag_notification(&[&[0xE2, 0x00, 0x00, 0x01]]);
        stream.extend(ok(FrameCode::StopInventory));
        let mut rfid = reader(vec![stream]);

        assert!(rfid.stop_inventory().is_ok());
        let pending = rfid.take_notifications();
        assert_eq!(pending.len(), 1);
        assert!(matches!(&pending[0], DecodedEvent::TagNotification(tags) if tags.len() == 1));
        assert!(rfid.take_notifications().is_empty());
    }

    #[test]
    fn test_notification_queue_drops_oldest() {
        let heartbeat = |device_no: u8| {
            let mut frame = vec![b'R', b'F', frame_type::NOTIFICATION, 0x00, 0x00, FrameCode::Heartbeat.as_u8()];
            frame.extend_from_slice(&[0x00, 0x03, attr::DEVICE_NO, 0x01, device_no]);
            frame.push(checksum(&frame));
            frame
        };
        let mut replies = VecDeque::new();
        for round in 0..3u8 {
            let mut stream = heartbeat(round * 2);
            stream.extend(heartbeat(round * 2 + 1));
            stream.extend(ok(FrameCode::Reset));
            replies.push_back(stream);
        }
        let transport = MockTransport {
            replies,
            ..Default::default()
        };
        let config = ReaderConfig {
            max_queued_notifications: 3,
            ..fast_config()
        };
        let mut rfid = RfidReader::with_config(transport, config);

        for _ in 0..3 {
            rfid.reset().unwrap();
        }
        let device_nos: Vec<Option<u8>> = rfid
            .take_notifications()
            .into_iter()
            .map(|event| match event {
                DecodedEvent::Heartbeat { device_no } => device_no,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(device_nos, [Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn test_corrupt_frame_skipped_before_response() {
        let mut corrupt = ok(FrameCode::Reset);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let mut stream = corrupt;
        stream.extend(ok(FrameCode::StopInventory));

        let mut rfid = reader(vec![stream]);
        assert!(rfid.stop_inventory().is_ok());
    }

    #[test]
    fn test_corrupt_awaited_response_is_error() {
        let mut corrupt = ok(FrameCode::Reset);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let mut rfid = reader(vec![corrupt]);
        assert!(matches!(
            rfid.reset(),
            Err(RfidError::Decode(FrameDecodeError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_write_tag_short_payload_not_sent() {
        let mut rfid = reader(vec![]);
        let result = rfid.write_tag(&[0; 4], MemoryBank::User, 0, 4, &[0x01, 0x02]);
        assert!(matches!(result, Err(RfidError::Build(BuildError::InvalidArgument(_)))));
        assert!(rfid.transport().written.is_empty());
    }

    // ===================
    // typed query tests
    // ===================

    #[test]
    fn test_device_info() {
        let mut block = TlvWriter::new();
        block.put_u8(attr::STATUS, 0).unwrap();
        block.put(attr::FIRMWARE_VERSION, b"RF-2.1.0").unwrap();
        let mut rfid = reader(vec![response(FrameCode::GetDeviceInfo, &block.into_bytes())]);

        let info = rfid.device_info().unwrap();
        assert_eq!(info.firmware_version, "RF-2.1.0");
        assert_eq!(info.device_type, None);
    }

    #[test]
    fn test_working_param_round_trip() {
        let param = WorkingParam {
            work_mode: WorkMode::Trigger,
            inventory_interval_ms: 100,
            buzzer: true,
            ..Default::default()
        };
        let mut block = TlvWriter::new();
        block.put_u8(attr::STATUS, 0).unwrap();
        block.put(attr::WORKING_PARAM, &param.to_bytes()).unwrap();
        let mut rfid = reader(vec![
            response(FrameCode::QueryWorkingParam, &block.into_bytes()),
            ok(FrameCode::SetWorkingParam),
        ]);

        let mut current = rfid.working_param().unwrap();
        assert_eq!(current, param);

        current.device_no = 12;
        rfid.set_working_param(&current).unwrap();
        let sent = Frame::parse(&rfid.transport().written[1]).unwrap();
        let record = sent.attributes().find_type(attr::WORKING_PARAM).unwrap().unwrap();
        assert_eq!(record.value[7], 12);
    }

    #[test]
    fn test_query_failure_skips_record() {
        let mut rfid = reader(vec![response(FrameCode::QueryAdvanceParam, &[attr::STATUS, 0x01, 0x02])]);
        assert!(matches!(
            rfid.advance_param(),
            Err(RfidError::CommandFailed { code: 0x17, status: 0x02 })
        ));
    }

    #[test]
    fn test_inventory_once() {
        let mut block = TlvWriter::new();
        block.put_u8(attr::STATUS, 0).unwrap();
        for epc in [[0x30, 0x01], [0x30, 0x02]] {
            let mut tag = TlvWriter::new();
            tag.put(attr::EPC, &epc).unwrap();
            tag.put_u8(attr::RSSI, 0xA0).unwrap();
            block.put(attr::SINGLE_TAG_DATA, &tag.into_bytes()).unwrap();
        }
        let mut rfid = reader(vec![response(FrameCode::InventoryOnce, &block.into_bytes())]);

        let tags = rfid.inventory_once().unwrap();
        let epcs: Vec<String> = tags.iter().map(|t| t.epc_hex()).collect();
        assert_eq!(epcs, ["3001", "3002"]);
        assert!(tags.iter().all(|t| t.rssi == Some(0xA0)));
    }

    #[test]
    fn test_read_tag() {
        let mut block = TlvWriter::new();
        block.put_u8(attr::STATUS, 0).unwrap();
        block.put(attr::TAG_DATA, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let mut rfid = reader(vec![response(FrameCode::ReadTag, &block.into_bytes())]);

        let data = rfid.read_tag(&[0; 4], MemoryBank::User, 0, 2).unwrap();
        assert_eq!(data, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_rtc_time() {
        let time = RtcTime {
            year: 2026,
            month: 10,
            day: 19,
            hour: 8,
            minute: 0,
            second: 0,
        };
        let mut block = TlvWriter::new();
        block.put_u8(attr::STATUS, 0).unwrap();
        block.put(attr::RTC_TIME, &time.to_bytes()).unwrap();
        let mut rfid = reader(vec![response(FrameCode::QueryRtcTime, &block.into_bytes())]);

        assert_eq!(rfid.rtc_time().unwrap(), time);
    }

    #[test]
    fn test_single_param() {
        let block = [attr::STATUS, 0x01, 0x00, attr::PARAM_VALUE, 0x01, 0x1E];
        let mut rfid = reader(vec![response(FrameCode::QuerySingleParam, &block)]);
        assert_eq!(rfid.single_param(0x03).unwrap(), vec![0x1E]);
    }

    // ===================
    // polling tests
    // ===================

    #[test]
    fn test_poll_dispatches_frames() {
        let mut stream = tag_notification(&[&[0x01, 0x02], &[0x03, 0x04]]);
        stream.extend([0x00, 0x13, 0x37]); // line noise
        stream.extend(tag_notification(&[&[0x05, 0x06]]));
        let mut rfid = reader(vec![stream]);

        let mut tags = Vec::new();
        let delivered = rfid
            .poll(&mut |event: DecodedEvent| {
                if let DecodedEvent::TagNotification(batch) = event {
                    tags.extend(batch);
                }
            })
            .unwrap();

        assert_eq!(delivered, 2);
        let antennas: Vec<Option<u8>> = tags.iter().map(|t| t.antenna).collect();
        assert_eq!(antennas, [Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn test_poll_reports_decode_error_and_continues() {
        struct Sink {
            events: Vec<DecodedEvent>,
            errors: Vec<FrameDecodeError>,
        }

        impl NotificationSink for Sink {
            fn on_event(&mut self, event: DecodedEvent) {
                self.events.push(event);
            }

            fn on_decode_error(&mut self, error: &FrameDecodeError) {
                self.errors.push(error.clone());
            }
        }

        let mut bad = tag_notification(&[&[0x01, 0x02]]);
        bad[9] = 0x7F; // container length now overruns the block
        let mut stream = bad;
        stream.extend(tag_notification(&[&[0x03, 0x04]]));

        let mut rfid = reader(vec![stream]);
        let mut sink = Sink {
            events: Vec::new(),
            errors: Vec::new(),
        };
        assert_eq!(rfid.poll(&mut sink).unwrap(), 1);
        assert_eq!(sink.errors.len(), 1);
        assert_eq!(sink.events.len(), 1);
    }

    #[test]
    fn test_inventory_for_duration() {
        // the start acknowledgement trails two tag notifications
        let mut after_start = tag_notification(&[&[0xAA, 0x01]]);
        after_start.extend(tag_notification(&[&[0xAA, 0x02], &[0xAA, 0x03]]));
        after_start.extend(ok(FrameCode::StartInventory));
        // and one more tag arrives before the stop acknowledgement
        let mut after_stop = tag_notification(&[&[0xAA, 0x04]]);
        after_stop.extend(ok(FrameCode::StopInventory));

        let transport = MockTransport {
            replies: vec![after_start, after_stop].into(),
            ..Default::default()
        };
        let mut rfid = RfidReader::with_config(transport, fast_config());

        let mut seen = Vec::new();
        let count = rfid
            .inventory_for_duration(Duration::from_millis(30), |tag| seen.push(tag.epc_hex()))
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(seen, ["AA01", "AA02", "AA03", "AA04"]);
        let codes: Vec<u8> = rfid.transport().written.iter().map(|f| f[5]).collect();
        assert_eq!(codes, [0x21, 0x22]);
    }
}
