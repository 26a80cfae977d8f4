/// Byte transport between the host and an RF-protocol reader.
///
/// Implementations only move bytes; splitting the stream into frames is done
/// by [`crate::FrameAssembler`].
pub trait RfidTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read available data, waiting at most `timeout_ms`. `Ok(0)` means nothing arrived.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Drop any bytes received but not yet read
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Write a whole frame, retrying on partial writes.
    ///
    /// Returns `Ok(false)` if the transport stopped accepting bytes.
    fn write_all(&mut self, mut data: &[u8]) -> Result<bool, Self::Error> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Ok(false),
                n => data = &data[n.min(data.len())..],
            }
        }
        Ok(true)
    }
}
