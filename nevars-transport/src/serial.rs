//! Local serial port transport
//!
//! Opens the port 7E1 at the initial rate; the handshake later switches the
//! rate in place.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialStream, StopBits};
use tracing::{debug, trace, warn};

use crate::{
    error::*,
    inbox::{self, Inbound},
    settings::SerialSettings,
    Transport,
};

/// Serial transport for a local port (`/dev/ttyUSB0`, `COM3`, ...)
pub struct SerialTransport {
    path: String,
    settings: SerialSettings,
    stream: Option<SerialStream>,
    inbox: BytesMut,
}

impl SerialTransport {
    /// Create new serial transport
    pub fn new(path: impl Into<String>, settings: SerialSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            stream: None,
            inbox: BytesMut::with_capacity(256),
        }
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.settings.read_timeout = timeout;
        self
    }

    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.stream.as_mut().ok_or(Error::NotOpen)
    }
}

#[async_trait]
impl Inbound for SerialTransport {
    fn inbox(&mut self) -> &mut BytesMut {
        &mut self.inbox
    }

    async fn fill(&mut self, deadline: Instant) -> Result<bool> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        let mut chunk = [0u8; 64];
        let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
            Err(_) => return Ok(false),
            Ok(result) => result?,
        };

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &chunk[..n]);
        self.inbox.extend_from_slice(&chunk[..n]);
        Ok(true)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        debug!(
            "Opening {} at {} baud (7E1)...",
            self.path, self.settings.initial_baud_rate
        );

        let builder = tokio_serial::new(&self.path, self.settings.initial_baud_rate)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .timeout(self.settings.read_timeout);

        let stream = SerialStream::open(&builder)?;

        debug!("Opened {}", self.path);

        self.inbox.clear();
        self.stream = Some(stream);
        Ok(())
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!("Released {}", self.path);
        }
        self.inbox.clear();
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream()?;

        trace!("Sending {} bytes: {:02X?}", data.len(), data);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn read(&mut self, n: usize) -> Result<BytesMut> {
        let timeout = self.settings.read_timeout;
        inbox::read_count(self, n, timeout).await
    }

    async fn read_until(&mut self, delimiter: u8) -> Result<BytesMut> {
        let timeout = self.settings.read_timeout;
        inbox::read_until(self, delimiter, timeout).await
    }

    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        debug!("Switching {} to {} baud", self.path, baud_rate);
        self.stream()?.set_baud_rate(baud_rate)?;
        Ok(())
    }

    async fn flush_input(&mut self) -> Result<()> {
        self.inbox.clear();
        self.stream()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.stream()?.flush().await?;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.settings.read_timeout = timeout;
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport {} dropped while still open", self.path);
        }
    }
}
