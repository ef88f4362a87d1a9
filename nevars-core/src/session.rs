//! Session state for the IEC 61107 handshake
//!
//! A session walks a fixed sequence of states:
//!
//! ```text
//! Idle -> Requested -> Identified -> BaudRaised -> PasswordSent -> Authenticated -> Closed
//!            \______________\______________\______________\-> Failed -> Closed
//! ```
//!
//! The session also owns everything memoised for its lifetime: the
//! identification, the serial number, the bus address and the tariff
//! schedules referenced by decoded calendars.

use std::collections::BTreeSet;

use bytes::Bytes;
use tracing::debug;

use crate::{
    error::{Error, Result},
    response::{IdentificationFrame, PasswordFrame},
};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Nothing sent yet
    Idle,

    /// Sign-on request sent
    Requested,

    /// Identification received and decoded
    Identified,

    /// Option-select sent, local baud rate switched
    BaudRaised,

    /// Password frame sent
    PasswordSent,

    /// Password accepted, ready for commands
    Authenticated,

    /// Terminal
    Closed,

    /// Handshake failed; only `Closed` may follow
    Failed,
}

/// Session tracker
///
/// Owned by a single client; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    password: Bytes,
    identification: Option<IdentificationFrame>,
    serial_number: Option<String>,
    bus_address: Option<String>,
    tariff_schedules: BTreeSet<u8>,
}

impl Session {
    /// Create an idle session
    ///
    /// An empty `password` means the meter-furnished password is adopted
    /// during the handshake.
    pub fn new(password: impl Into<Bytes>) -> Self {
        Self {
            state: SessionState::Idle,
            password: password.into(),
            identification: None,
            serial_number: None,
            bus_address: None,
            tariff_schedules: BTreeSet::new(),
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if authenticated
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Fail with `SessionNotReady` unless authenticated
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.is_authenticated() {
            return Err(Error::SessionNotReady { state: self.state });
        }
        Ok(())
    }

    /// Fail with `SessionNotReady` unless nothing has been sent yet
    pub fn ensure_idle(&self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::SessionNotReady { state: self.state });
        }
        Ok(())
    }

    /// Replace the password; refused once the handshake has begun
    pub fn set_password(&mut self, password: impl Into<Bytes>) -> Result<()> {
        self.ensure_idle()?;
        self.password = password.into();
        Ok(())
    }

    fn advance(&mut self, from: SessionState, to: SessionState) -> Result<()> {
        if self.state != from {
            return Err(Error::SessionNotReady { state: self.state });
        }

        debug!(from = ?from, to = ?to, "Session transition");
        self.state = to;
        Ok(())
    }

    /// Idle -> Requested
    pub fn request_sent(&mut self) -> Result<()> {
        self.advance(SessionState::Idle, SessionState::Requested)
    }

    /// Requested -> Identified
    pub fn identified(&mut self, identification: IdentificationFrame) -> Result<()> {
        self.advance(SessionState::Requested, SessionState::Identified)?;
        self.identification = Some(identification);
        Ok(())
    }

    /// Identified -> BaudRaised
    pub fn baud_raised(&mut self) -> Result<()> {
        self.advance(SessionState::Identified, SessionState::BaudRaised)
    }

    /// Adopt the meter's password when the caller supplied none
    ///
    /// Returns the password now in effect.
    pub fn password_received(&mut self, frame: PasswordFrame) -> Result<&[u8]> {
        if self.state != SessionState::BaudRaised {
            return Err(Error::SessionNotReady { state: self.state });
        }

        if self.password.is_empty() {
            debug!("Adopting meter-furnished password");
            self.password = frame.into_password();
        }
        Ok(&self.password)
    }

    /// BaudRaised -> PasswordSent
    pub fn password_sent(&mut self) -> Result<()> {
        self.advance(SessionState::BaudRaised, SessionState::PasswordSent)
    }

    /// PasswordSent -> Authenticated
    pub fn authenticated(&mut self) -> Result<()> {
        self.advance(SessionState::PasswordSent, SessionState::Authenticated)
    }

    /// Move to `Failed`, returning the state the failure happened in
    pub fn fail(&mut self) -> SessionState {
        let at = self.state;
        if at != SessionState::Closed {
            debug!(from = ?at, "Session failed");
            self.state = SessionState::Failed;
        }
        at
    }

    /// Move to `Closed` and drop everything memoised
    pub fn close(&mut self) {
        debug!(from = ?self.state, "Session closed");
        self.state = SessionState::Closed;
        self.identification = None;
        self.serial_number = None;
        self.bus_address = None;
        self.tariff_schedules.clear();
    }

    /// Password in effect
    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn identification(&self) -> Option<&IdentificationFrame> {
        self.identification.as_ref()
    }

    /// Device identifier reported at sign-on
    pub fn identifier(&self) -> Option<&str> {
        self.identification.as_ref().map(IdentificationFrame::identifier)
    }

    /// Memoised serial number
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// Memoise the serial number (first value wins)
    pub fn remember_serial_number(&mut self, serial_number: String) -> &str {
        self.serial_number.get_or_insert(serial_number)
    }

    /// Memoised bus address read from the meter
    pub fn bus_address(&self) -> Option<&str> {
        self.bus_address.as_deref()
    }

    pub fn remember_bus_address(&mut self, address: String) -> &str {
        self.bus_address.get_or_insert(address)
    }

    /// Tariff schedule numbers referenced so far, ascending
    pub fn tariff_schedules(&self) -> &BTreeSet<u8> {
        &self.tariff_schedules
    }

    /// Record tariff schedule numbers referenced by a decoded calendar
    pub fn record_tariff_schedules(&mut self, numbers: impl IntoIterator<Item = u8>) {
        self.tariff_schedules.extend(numbers);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identification() -> IdentificationFrame {
        IdentificationFrame::decode(b"/TPC5NEVAMT324.1106\r\n").unwrap()
    }

    fn password_frame() -> PasswordFrame {
        PasswordFrame::decode(b"\x01P0\x02(00000000)\x03`").unwrap()
    }

    fn authenticated(password: &'static [u8]) -> Session {
        let mut session = Session::new(password);
        session.request_sent().unwrap();
        session.identified(identification()).unwrap();
        session.baud_raised().unwrap();
        session.password_received(password_frame()).unwrap();
        session.password_sent().unwrap();
        session.authenticated().unwrap();
        session
    }

    #[test]
    fn test_session_new() {
        let session = Session::default();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_authenticated());
        assert!(matches!(
            session.ensure_ready(),
            Err(Error::SessionNotReady { state: SessionState::Idle })
        ));
    }

    #[test]
    fn test_full_handshake() {
        let session = authenticated(b"");
        assert!(session.is_authenticated());
        assert!(session.ensure_ready().is_ok());
        assert_eq!(session.identifier(), Some("NEVAMT324.1106"));
    }

    #[test]
    fn test_password_adopted_when_empty() {
        let session = authenticated(b"");
        assert_eq!(session.password(), b"00000000");
    }

    #[test]
    fn test_password_kept_when_supplied() {
        let session = authenticated(b"12345678");
        assert_eq!(session.password(), b"12345678");
    }

    #[test]
    fn test_set_password_only_when_idle() {
        let mut session = Session::default();
        session.set_password(&b"12345678"[..]).unwrap();
        assert_eq!(session.password(), b"12345678");

        let mut session = authenticated(b"");
        assert!(matches!(
            session.set_password(&b"12345678"[..]),
            Err(Error::SessionNotReady { state: SessionState::Authenticated })
        ));
        assert_eq!(session.password(), b"00000000");
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_out_of_order_transition() {
        let mut session = Session::default();
        assert!(session.baud_raised().is_err());
        assert!(session.identified(identification()).is_err());
        assert_eq!(session.state(), SessionState::Idle);

        assert!(session.ensure_idle().is_ok());
        session.request_sent().unwrap();
        assert!(session.request_sent().is_err());
        assert!(session.ensure_idle().is_err());
    }

    #[test]
    fn test_fail_then_close() {
        let mut session = Session::default();
        session.request_sent().unwrap();

        assert_eq!(session.fail(), SessionState::Requested);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.baud_raised().is_err());

        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_close_clears_memo() {
        let mut session = authenticated(b"");
        assert_eq!(session.remember_serial_number("60089784".into()), "60089784");
        assert_eq!(session.remember_serial_number("other".into()), "60089784");
        session.remember_bus_address("12345".into());
        session.record_tariff_schedules([2, 1, 2]);
        assert_eq!(session.tariff_schedules().iter().copied().collect::<Vec<_>>(), vec![1, 2]);

        session.close();
        assert_eq!(session.serial_number(), None);
        assert_eq!(session.bus_address(), None);
        assert_eq!(session.identifier(), None);
        assert!(session.tariff_schedules().is_empty());
        assert!(session.ensure_ready().is_err());
    }

    #[test]
    fn test_sessions_do_not_share_schedules() {
        let mut first = Session::default();
        let second = Session::default();

        first.record_tariff_schedules([3]);
        assert!(second.tariff_schedules().is_empty());
    }
}
