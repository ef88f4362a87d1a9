//! Transport layer for IEC 61107 meters
//!
//! Provides local serial and RFC2217 (serial over telnet) lines.

pub mod error;
pub mod guard;
pub(crate) mod inbox;
pub mod rfc2217;
pub mod serial;
pub mod settings;

pub use error::{Error, Result};
pub use guard::TransportGuard;
pub use rfc2217::Rfc2217Transport;
pub use serial::SerialTransport;
pub use settings::SerialSettings;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte-oriented line to a meter
///
/// Reads never fail on timeout: they return whatever arrived, possibly
/// nothing, and leave judging the length to the caller.
#[async_trait]
pub trait Transport: Send {
    /// Open the line at the initial baud rate
    async fn open(&mut self) -> Result<()>;

    /// Close the line; idempotent
    fn release(&mut self);

    /// Check if open
    fn is_open(&self) -> bool;

    /// Send raw bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `n` bytes
    async fn read(&mut self, n: usize) -> Result<BytesMut>;

    /// Read through `delimiter` inclusive
    async fn read_until(&mut self, delimiter: u8) -> Result<BytesMut>;

    /// Switch the line rate in place
    async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Discard pending input
    async fn flush_input(&mut self) -> Result<()>;

    /// Wait until written bytes have left
    async fn flush(&mut self) -> Result<()>;

    /// Change how long subsequent reads wait
    fn set_read_timeout(&mut self, timeout: Duration);

    /// Whether the line is tunnelled through a network gateway
    fn is_tunnelled(&self) -> bool {
        false
    }

    /// Human-readable line name
    fn name(&self) -> String;
}

/// Pick a transport for an interface URL
///
/// `rfc2217://host:port` selects the telnet tunnel; anything else is taken
/// as a local serial port path.
pub fn transport_for_url(url: &str, settings: SerialSettings) -> Result<Box<dyn Transport>> {
    if url.is_empty() {
        return Err(Error::InvalidUrl("empty interface".into()));
    }

    if url.starts_with("rfc2217://") {
        return Ok(Box::new(Rfc2217Transport::from_url(url, settings)?));
    }

    Ok(Box::new(SerialTransport::new(url, settings)))
}
