//! Outbound IEC 61107 messages

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    constants::{ACK, BREAK_FRAME, CR, ETX, LF, SOH, STX},
    error::{Error, Result},
    obis::ObisAddress,
};

/// Command mode letter
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Read the object at an OBIS address
    Read,
    /// Write a value (no caller in this crate exercises it)
    Write,
    /// Password comparison
    Password,
}

impl Mode {
    pub fn letter(self) -> u8 {
        match self {
            Mode::Read => b'R',
            Mode::Write => b'W',
            Mode::Password => b'P',
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter() as char)
    }
}

/// Protocol mode selected in the option-select message
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolMode {
    /// Plain data readout
    DataReadout,
    /// Programming mode (password exchange, R/W commands)
    Programming,
}

impl ProtocolMode {
    fn digit(self) -> u8 {
        match self {
            ProtocolMode::DataReadout => b'0',
            ProtocolMode::Programming => b'1',
        }
    }
}

/// Encoded command frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────┬──────┬─────┬─────┬──────────────┬─────┬─────────┬─────┬─────┬─────┐
/// │ SOH │ mode │ '1' │ STX │ address (8)? │ '(' │ payload │ ')' │ ETX │ BCC │
/// └─────┴──────┴─────┴─────┴──────────────┴─────┴─────────┴─────┴─────┴─────┘
/// ```
///
/// The BCC covers every byte from the mode letter through `ETX`.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    mode: Mode,
    address: Option<ObisAddress>,
    payload: Bytes,
    raw: Bytes,
}

impl CommandFrame {
    /// Build a command frame
    ///
    /// Read frames take an address and no payload; Write and Password
    /// frames take a non-empty payload and no address.
    ///
    /// # Examples
    ///
    /// ```
    /// use nevars_core::{CommandFrame, Mode, ObisAddress};
    ///
    /// let addr = ObisAddress::parse("60.01.00*FF").unwrap();
    /// let frame = CommandFrame::encode(Mode::Read, Some(&addr), None).unwrap();
    /// assert_eq!(frame.as_bytes(), b"\x01R1\x02600100FF()\x03d");
    /// ```
    pub fn encode(
        mode: Mode,
        address: Option<&ObisAddress>,
        payload: Option<&[u8]>,
    ) -> Result<Self> {
        let payload = payload.unwrap_or_default();

        match mode {
            Mode::Read => {
                if address.is_none() {
                    return Err(Error::InvalidFrameRequest(
                        "read command requires an address".into(),
                    ));
                }
                if !payload.is_empty() {
                    return Err(Error::InvalidFrameRequest(
                        "read command cannot carry a payload".into(),
                    ));
                }
            }
            Mode::Write | Mode::Password => {
                if address.is_some() {
                    return Err(Error::InvalidFrameRequest(format!(
                        "{} command cannot carry an address",
                        mode
                    )));
                }
                if payload.is_empty() {
                    return Err(Error::InvalidFrameRequest(format!(
                        "{} command requires a payload",
                        mode
                    )));
                }
            }
        }

        Ok(Self::build(mode, address, payload))
    }

    fn build(mode: Mode, address: Option<&ObisAddress>, payload: &[u8]) -> Self {
        let address_len = address.map_or(0, |a| a.as_bytes().len());
        let mut buf = BytesMut::with_capacity(8 + address_len + payload.len());

        buf.put_u8(SOH);
        buf.put_u8(mode.letter());
        buf.put_u8(b'1');
        buf.put_u8(STX);
        if let Some(addr) = address {
            buf.put_slice(addr.as_bytes());
        }
        buf.put_u8(b'(');
        buf.put_slice(payload);
        buf.put_u8(b')');
        buf.put_u8(ETX);

        let bcc = checksum::calculate(&buf[1..]);
        buf.put_u8(bcc);

        Self {
            mode,
            address: address.copied(),
            payload: Bytes::copy_from_slice(payload),
            raw: buf.freeze(),
        }
    }

    /// Read frame for `address`
    pub fn read(address: &ObisAddress) -> Self {
        Self::build(Mode::Read, Some(address), &[])
    }

    /// Password frame carrying `password`
    pub fn password(password: &[u8]) -> Result<Self> {
        Self::encode(Mode::Password, None, Some(password))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn address(&self) -> Option<&ObisAddress> {
        self.address.as_ref()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encoded bytes, BCC included
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Bytes {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("mode", &self.mode)
            .field("address", &self.address)
            .field("payload_len", &self.payload.len())
            .field("raw", &hex::encode(&self.raw))
            .finish()
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(addr) => write!(f, "{}1[{}]", self.mode, addr),
            None => write!(f, "{}1(len={})", self.mode, self.payload.len()),
        }
    }
}

/// Sign-on request: `/?<address>!` CR LF
pub fn identification_request(address: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + address.len());
    buf.put_slice(b"/?");
    buf.put_slice(address.as_bytes());
    buf.put_u8(b'!');
    buf.put_u8(CR);
    buf.put_u8(LF);
    buf.freeze()
}

/// Option-select message: `ACK '0' <baud digit> <mode digit>` CR LF
pub fn option_select(baud_step: u8, mode: ProtocolMode) -> Bytes {
    Bytes::copy_from_slice(&[ACK, b'0', b'0' + baud_step, mode.digit(), CR, LF])
}

/// End-of-session (break) frame
pub fn break_frame() -> Bytes {
    Bytes::from_static(&BREAK_FRAME)
}
