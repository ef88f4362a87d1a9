//! Meter session
//!
//! Drives the IEC 61107 programming-mode handshake over a [`Transport`] and
//! then exchanges command frames on the authenticated line.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use nevars_core::{
    check_ack,
    constants::{BAUD_SETTLE_DELAY, ETX, LF, PASSWORD_MESSAGE_LEN, SOH, STX},
    error::BoxError,
    frame::{break_frame, identification_request, option_select},
    CommandFrame, DataFrame, IdentificationFrame, PasswordFrame, ProtocolMode, Session,
    SessionState,
};
use nevars_transport::{transport_for_url, SerialSettings, Transport, TransportGuard};

use crate::error::{Error, Result};

/// Neva MT meter
///
/// Owns the line for its whole lifetime. Every request awaits its response
/// before the next one can be issued.
///
/// # Examples
///
/// ```no_run
/// use nevars::Meter;
///
/// #[tokio::main]
/// async fn main() -> nevars::Result<()> {
///     let mut meter = Meter::from_url("/dev/ttyUSB0")?;
///
///     meter.start_session().await?;
///     println!("Serial: {}", meter.serial_number().await?);
///
///     meter.close().await?;
///     Ok(())
/// }
/// ```
pub struct Meter {
    transport: TransportGuard,
    session: Session,
    address: String,
    password: Bytes,
    settle_delay: Duration,
    command_timeout: Option<Duration>,
}

impl Meter {
    /// Create a meter on an unopened transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: TransportGuard::new(transport),
            session: Session::default(),
            address: String::new(),
            password: Bytes::new(),
            settle_delay: BAUD_SETTLE_DELAY,
            command_timeout: None,
        }
    }

    /// Create a meter for a serial path or `rfc2217://host:port` URL
    pub fn from_url(url: &str) -> Result<Self> {
        Self::from_url_with_settings(url, SerialSettings::default())
    }

    pub fn from_url_with_settings(url: &str, settings: SerialSettings) -> Result<Self> {
        Ok(Self::new(transport_for_url(url, settings)?))
    }

    /// Set the bus address sent in the sign-on request (default: none)
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the password (default: adopt the one the meter sends)
    ///
    /// Takes effect at the next [`Meter::start_session`]; a running session
    /// keeps the password it signed on with.
    pub fn with_password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.password = Bytes::copy_from_slice(password.as_ref());
        self
    }

    /// Set the pause before switching baud rate; never below 300 ms
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay.max(BAUD_SETTLE_DELAY);
        self
    }

    /// Set the read timeout used once the session is authenticated
    /// (default: keep the line's own timeout)
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Bus address the session is opened with
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Check if ready for commands
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated() && self.transport.is_open()
    }

    /// Open the line and sign on in programming mode
    ///
    /// # Errors
    ///
    /// Any failing step moves the session to `Failed`, releases the line and
    /// returns [`nevars_core::Error::ConnectionSetupFailed`] carrying the
    /// state it failed in.
    pub async fn start_session(&mut self) -> Result<()> {
        self.session.ensure_idle()?;
        self.session.set_password(self.password.clone())?;

        info!("Starting session on {}...", self.transport.name());

        match self.handshake().await {
            Ok(()) => {
                info!(
                    identifier = self.session.identifier().unwrap_or_default(),
                    "Session authenticated"
                );
                Ok(())
            }
            Err(e) => {
                let state = self.session.fail();
                warn!("Handshake failed in {:?}: {}; releasing {}", state, e, self.transport.name());
                self.transport.release();
                Err(nevars_core::Error::setup_failed(state, into_source(e)).into())
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        self.transport.open().await?;

        self.write(&identification_request(&self.address)).await?;
        self.session.request_sent()?;

        let raw = self.transport.read_until(LF).await?;
        trace!("Identification: {:02X?}", &raw[..]);
        let identification = IdentificationFrame::decode(&raw)?;
        let (baud_step, baud_rate) = (identification.baud_step(), identification.baud_rate());
        self.session.identified(identification)?;

        self.write(&option_select(baud_step, ProtocolMode::Programming)).await?;
        tokio::time::sleep(self.settle_delay).await;
        self.transport.set_baud_rate(baud_rate).await?;
        self.session.baud_raised()?;

        let raw = self.read_password_message().await?;
        let frame = PasswordFrame::decode(&raw)?;
        let command = CommandFrame::password(self.session.password_received(frame)?)?;
        self.write(command.as_bytes()).await?;
        self.session.password_sent()?;

        let raw = self.read_ack().await?;
        check_ack(&raw)?;
        self.session.authenticated()?;

        if let Some(timeout) = self.command_timeout {
            debug!(?timeout, "Switching to command timeout");
            self.transport.set_read_timeout(timeout);
        }

        Ok(())
    }

    async fn read_password_message(&mut self) -> Result<BytesMut> {
        if !self.transport.is_tunnelled() {
            return Ok(self.transport.read(PASSWORD_MESSAGE_LEN).await?);
        }

        // Tunnels tend to drop the leading SOH and deliver the BCC late
        let mut raw = self.transport.read(PASSWORD_MESSAGE_LEN - 1).await?;
        if raw.first() != Some(&SOH) {
            let mut fixed = BytesMut::with_capacity(PASSWORD_MESSAGE_LEN);
            fixed.put_u8(SOH);
            fixed.extend_from_slice(&raw);
            raw = fixed;
        }
        if raw.last() == Some(&ETX) {
            let bcc = self.transport.read(1).await?;
            raw.extend_from_slice(&bcc);
        }
        Ok(raw)
    }

    async fn read_ack(&mut self) -> Result<BytesMut> {
        let mut raw = self.transport.read(1).await?;
        if raw.first() == Some(&STX) {
            // Error frame instead of ACK; collect it whole for classification
            let rest = self.read_frame_tail().await?;
            raw.extend_from_slice(&rest);
        }
        Ok(raw)
    }

    /// Read through `ETX` plus the trailing BCC
    async fn read_frame_tail(&mut self) -> Result<BytesMut> {
        let mut raw = self.transport.read_until(ETX).await?;
        if raw.last() == Some(&ETX) {
            let bcc = self.transport.read(1).await?;
            raw.extend_from_slice(&bcc);
        }
        Ok(raw)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!("Sending: {:02X?}", data);
        self.transport.write(data).await?;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        self.session.ensure_ready()?;
        if !self.transport.is_open() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Send a command frame on the authenticated line
    pub async fn send(&mut self, frame: &CommandFrame) -> Result<()> {
        self.ensure_ready()?;
        trace!("Sending: {:?}", frame);
        self.transport.write(frame.as_bytes()).await?;
        Ok(())
    }

    /// Receive and decode one data message
    pub async fn receive(&mut self) -> Result<DataFrame> {
        self.ensure_ready()?;

        let raw = self.read_frame_tail().await?;
        trace!("Received {} bytes: {:02X?}", raw.len(), &raw[..]);
        self.transport.flush_input().await?;

        Ok(DataFrame::decode(&raw)?)
    }

    /// End the session and release the line
    ///
    /// The break message is only sent from an authenticated session; a failed
    /// or unfinished handshake just releases.
    pub async fn close(&mut self) -> Result<()> {
        if self.session.is_closed() {
            return Ok(());
        }

        if self.is_authenticated() {
            info!("Closing session on {}", self.transport.name());
            let sent = match self.transport.write(&break_frame()).await {
                Ok(()) => self.transport.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                warn!("Failed to send break message: {}", e);
            }
        } else {
            debug!(state = ?self.session.state(), "Closing without break message");
        }

        self.transport.release();
        self.session.close();
        Ok(())
    }
}

/// Unwrap to the innermost error for `ConnectionSetupFailed`
fn into_source(e: Error) -> BoxError {
    match e {
        Error::Core(e) => Box::new(e),
        Error::Transport(e) => Box::new(e),
        Error::Types(e) => Box::new(e),
        other => Box::new(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_delay_floor() {
        let meter = Meter::from_url("/dev/ttyUSB0")
            .unwrap()
            .with_settle_delay(Duration::from_millis(10));
        assert_eq!(meter.settle_delay, BAUD_SETTLE_DELAY);

        let meter = Meter::from_url("/dev/ttyUSB0")
            .unwrap()
            .with_settle_delay(Duration::from_millis(500));
        assert_eq!(meter.settle_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_builder() {
        let meter = Meter::from_url("rfc2217://10.0.0.7:4001")
            .unwrap()
            .with_address("60089784")
            .with_password("12345678");

        assert_eq!(meter.address(), "60089784");
        assert_eq!(&meter.password[..], b"12345678");
        assert_eq!(meter.state(), SessionState::Idle);
        assert!(!meter.is_authenticated());
    }

    #[tokio::test]
    async fn test_send_before_session() {
        let mut meter = Meter::from_url("/dev/ttyUSB0").unwrap();
        let frame = CommandFrame::read(&"60.01.00*FF".parse().unwrap());

        let result = meter.send(&frame).await;
        assert!(matches!(
            result,
            Err(Error::Core(nevars_core::Error::SessionNotReady {
                state: SessionState::Idle
            }))
        ));
    }

    #[tokio::test]
    async fn test_close_unopened() {
        let mut meter = Meter::from_url("/dev/ttyUSB0").unwrap();
        meter.close().await.unwrap();
        assert_eq!(meter.state(), SessionState::Closed);
    }
}
