//! Serial port transport using the serialport crate

use std::io::{Read, Write};
use std::time::Duration;

use log::debug;

use crate::transport::RfidTransport;

/// RS-232 / RS-485 / USB-CDC link to a reader.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.clear(serialport::ClearBuffer::All)?;
        debug!("Opened {} at {} baud", port_name, baud_rate);

        Ok(Self { port })
    }
}

impl RfidTransport for SerialTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let written = self.port.write(data)?;
        self.port.flush()?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.port
            .set_timeout(Duration::from_millis(u64::from(timeout_ms)))
            .map_err(std::io::Error::other)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // no bytes within the timeout is not an error for a polling reader
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::other)
    }
}
