//! Inbound IEC 61107 messages
//!
//! Every decoder validates structure first and the BCC second. A frame
//! value is only ever built from bytes that passed both checks.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::{
    checksum,
    constants::{
        ACK, BAUD_RATES, CR, ETX, IDENTIFICATION_ENVELOPE_LEN, LF, MAX_IDENTIFIER_LEN, NAK, SOH,
        STX,
    },
    error::{escape, Error, Result},
    obis::ObisAddress,
};

/// `)` + `ETX` + BCC
const DATA_TRAILER_LEN: usize = 3;

/// Decoded data message
///
/// Fields are kept as the exact text the meter sent; numeric
/// interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    address: Option<String>,
    fields: Vec<String>,
}

impl DataFrame {
    /// Decode `STX [address] "(" fields ")" ETX BCC`
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFrame`] if the frame is too short, lacks the
    ///   `STX`/`ETX` markers, or has no parenthesised body
    /// - [`Error::ChecksumMismatch`] if the BCC does not match
    ///
    /// # Examples
    ///
    /// ```
    /// use nevars_core::DataFrame;
    ///
    /// let frame = DataFrame::decode(b"\x02600100FF(60089784)\x03\x09").unwrap();
    /// assert_eq!(frame.fields(), ["60089784"]);
    /// ```
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < 1 + DATA_TRAILER_LEN + 1 {
            return Err(Error::malformed(
                format!("data frame too short ({} bytes)", raw.len()),
                raw,
            ));
        }

        let open = raw
            .iter()
            .position(|&b| b == b'(')
            .ok_or_else(|| Error::malformed("no opening parenthesis", raw))?;

        let close = raw.len() - DATA_TRAILER_LEN;
        if raw[0] != STX || raw[close + 1] != ETX || raw[close] != b')' || close < open {
            return Err(Error::malformed("invalid data frame envelope", raw));
        }

        verify_bcc(raw)?;

        let address = &raw[1..open];
        let body = &raw[open + 1..close];

        let address = if address.is_empty() {
            None
        } else {
            Some(ascii(address, raw)?)
        };
        let fields = ascii(body, raw)?
            .split(',')
            .map(str::to_string)
            .collect::<Vec<_>>();

        let frame = Self { address, fields };
        debug!(address = ?frame.address, fields = frame.fields.len(), "Decoded data frame");

        Ok(frame)
    }

    /// Raw fields in meter order (at least one)
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First field
    pub fn first(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    /// Address echoed by the meter, compact form
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Echoed address parsed as OBIS, when it has the compact form
    pub fn obis(&self) -> Option<ObisAddress> {
        self.address
            .as_deref()
            .and_then(|a| ObisAddress::from_compact(a).ok())
    }

    /// Meter error code such as `ER03`, if this frame reports one
    pub fn error_code(&self) -> Option<&str> {
        match self.fields.as_slice() {
            [only] if is_error_code(only) => Some(only.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.address().unwrap_or(""), self.fields.join(","))
    }
}

/// Decoded identification message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationFrame {
    vendor: String,
    baud_step: u8,
    identifier: String,
}

impl IdentificationFrame {
    /// Decode `"/" vendor(3) baud-digit identifier CR LF`
    ///
    /// The vendor tag must be two uppercase letters followed by a letter of
    /// either case; the baud digit must index the baud ladder.
    ///
    /// # Examples
    ///
    /// ```
    /// use nevars_core::IdentificationFrame;
    ///
    /// let id = IdentificationFrame::decode(b"/TPC5NEVAMT324.1106\r\n").unwrap();
    /// assert_eq!(id.vendor(), "TPC");
    /// assert_eq!(id.baud_step(), 5);
    /// assert_eq!(id.identifier(), "NEVAMT324.1106");
    /// ```
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let min = IDENTIFICATION_ENVELOPE_LEN + 1;
        let max = IDENTIFICATION_ENVELOPE_LEN + MAX_IDENTIFIER_LEN;
        if raw.len() < min || raw.len() > max {
            return Err(Error::malformed(
                format!(
                    "identification length {} outside {}..={}",
                    raw.len(),
                    min,
                    max
                ),
                raw,
            ));
        }

        if raw[0] != b'/' {
            return Err(Error::malformed("identification must start with '/'", raw));
        }
        if !raw.ends_with(&[CR, LF]) {
            return Err(Error::malformed("identification must end with CR LF", raw));
        }

        let vendor = &raw[1..4];
        let vendor_ok = vendor[0].is_ascii_uppercase()
            && vendor[1].is_ascii_uppercase()
            && vendor[2].is_ascii_alphabetic();
        if !vendor_ok {
            return Err(Error::malformed("invalid vendor tag", raw));
        }

        let baud_step = raw[4].wrapping_sub(b'0');
        if baud_step as usize >= BAUD_RATES.len() {
            return Err(Error::malformed("unsupported baud digit", raw));
        }

        let identifier = &raw[5..raw.len() - 2];
        let identifier_ok = identifier
            .iter()
            .all(|&b| b.is_ascii_graphic() && b != b'/' && b != b'!');
        if !identifier_ok {
            return Err(Error::malformed("invalid identifier characters", raw));
        }

        let frame = Self {
            vendor: ascii(vendor, raw)?,
            baud_step,
            identifier: ascii(identifier, raw)?,
        };
        debug!(
            vendor = %frame.vendor,
            baud_step = frame.baud_step,
            identifier = %frame.identifier,
            "Decoded identification"
        );

        Ok(frame)
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Index into the baud ladder proposed by the meter
    pub fn baud_step(&self) -> u8 {
        self.baud_step
    }

    /// Rate the baud step maps to
    pub fn baud_rate(&self) -> u32 {
        BAUD_RATES[self.baud_step as usize]
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Lowercase third vendor letter: meter answers within 20 ms
    pub fn short_reaction_time(&self) -> bool {
        self.vendor
            .as_bytes()
            .get(2)
            .is_some_and(u8::is_ascii_lowercase)
    }
}

/// Decoded password message
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordFrame {
    password: Bytes,
}

impl PasswordFrame {
    /// Decode `SOH "P0" STX "(" password ")" ETX BCC`
    ///
    /// The password may be empty.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < 8 {
            return Err(Error::malformed(
                format!("password frame too short ({} bytes)", raw.len()),
                raw,
            ));
        }

        if !raw.starts_with(&[SOH, b'P', b'0', STX]) {
            return Err(Error::malformed("invalid password frame header", raw));
        }

        let etx = raw.len() - 2;
        let open = 4;
        let close = etx - 1;
        if raw[etx] != ETX || raw[open] != b'(' || raw[close] != b')' {
            return Err(Error::malformed("password not enclosed in parentheses", raw));
        }

        verify_bcc(raw)?;

        trace!(len = close - open - 1, "Decoded password frame");

        Ok(Self {
            password: Bytes::copy_from_slice(&raw[open + 1..close]),
        })
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn into_password(self) -> Bytes {
        self.password
    }
}

impl fmt::Debug for PasswordFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordFrame")
            .field("len", &self.password.len())
            .finish()
    }
}

/// Check that `raw` is exactly the `ACK` byte
///
/// # Errors
///
/// - [`Error::ErrorCodeReceived`] for `NAK` or a meter error frame
/// - [`Error::UnexpectedResponse`] for anything else
pub fn check_ack(raw: &[u8]) -> Result<()> {
    match raw {
        [ACK] => Ok(()),
        [NAK, ..] => Err(Error::ErrorCodeReceived("NAK".into())),
        [STX, ..] => match DataFrame::decode(raw) {
            Ok(frame) => match frame.error_code() {
                Some(code) => Err(Error::ErrorCodeReceived(code.to_string())),
                None => Err(Error::UnexpectedResponse(format!(
                    "expected ACK, received data frame {}",
                    frame
                ))),
            },
            Err(_) => Err(Error::UnexpectedResponse(format!(
                "expected ACK, received {}",
                escape(raw)
            ))),
        },
        [] => Err(Error::UnexpectedResponse("expected ACK, received nothing".into())),
        _ => Err(Error::UnexpectedResponse(format!(
            "expected ACK, received {}",
            escape(raw)
        ))),
    }
}

fn is_error_code(field: &str) -> bool {
    field.len() > 2
        && field.starts_with("ER")
        && field[2..].bytes().all(|b| b.is_ascii_alphanumeric())
}

fn verify_bcc(raw: &[u8]) -> Result<()> {
    let (body, received) = match raw {
        [_, body @ .., bcc] => (body, *bcc),
        _ => return Err(Error::malformed("frame too short for BCC", raw)),
    };

    let expected = checksum::calculate(body);
    if expected != received {
        return Err(Error::ChecksumMismatch { expected, received });
    }
    Ok(())
}

fn ascii(bytes: &[u8], raw: &[u8]) -> Result<String> {
    if !bytes.is_ascii() {
        return Err(Error::malformed("non-ASCII content", raw));
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CommandFrame;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Build a data frame the way a meter would answer a read
    fn data_frame(address: &str, fields: &[&str]) -> Vec<u8> {
        let mut raw = vec![STX];
        raw.extend_from_slice(address.as_bytes());
        raw.push(b'(');
        raw.extend_from_slice(fields.join(",").as_bytes());
        raw.push(b')');
        raw.push(ETX);
        raw.push(checksum::calculate(&raw[1..]));
        raw
    }

    #[test]
    fn test_decode_data_single() {
        let frame = DataFrame::decode(b"\x02600100FF(60089784)\x03\x09").unwrap();
        assert_eq!(frame.fields(), ["60089784"]);
        assert_eq!(frame.address(), Some("600100FF"));
        assert_eq!(frame.obis().unwrap().to_display(), "60.01.00*FF");
        assert_eq!(frame.first(), "60089784");
    }

    #[test]
    fn test_decode_data_known_frames() {
        let frame = DataFrame::decode(b"\x024C0700FF(00134.2)\x03X").unwrap();
        assert_eq!(frame.fields(), ["00134.2"]);

        let frame =
            DataFrame::decode(b"\x020F0680FF(04.8190,04.8457,02.5359,00.0000,00.0000)\x03R")
                .unwrap();
        assert_eq!(
            frame.fields(),
            ["04.8190", "04.8457", "02.5359", "00.0000", "00.0000"]
        );

        let frame = DataFrame::decode(
            b"\x020A0164FF(070001,230002,000000,000000,000000,000000,000000,000000)\x03Y",
        )
        .unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.fields()[1], "230002");
    }

    #[test]
    fn test_decode_data_without_address() {
        let raw = data_frame("", &["ER03"]);
        let frame = DataFrame::decode(&raw).unwrap();
        assert_eq!(frame.address(), None);
        assert_eq!(frame.error_code(), Some("ER03"));
    }

    #[test]
    fn test_decode_data_malformed() {
        assert!(matches!(
            DataFrame::decode(b""),
            Err(Error::MalformedFrame { .. })
        ));
        assert!(matches!(
            DataFrame::decode(b"\x024C0700FF00134.2\x03X"),
            Err(Error::MalformedFrame { .. })
        ));
        assert!(matches!(
            DataFrame::decode(b"\x02(\x03"),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_decode_data_wrong_bcc() {
        let result = DataFrame::decode(
            b"\x020F0880FF(016442.17,012865.25,003576.92,000000.00,000000.00)\x03S",
        );
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert!(result.unwrap_err().is_malformed());
    }

    #[test]
    fn test_decode_identification() {
        let cases: [(&[u8], &str, u8, &str); 3] = [
            (b"/TPC5NEVAMT324.1106\r\n", "TPC", 5, "NEVAMT324.1106"),
            (b"/CPz3NEVAMT123.2302\r\n", "CPz", 3, "NEVAMT123.2302"),
            (b"/SAT5EM72000656621\r\n", "SAT", 5, "EM72000656621"),
        ];

        for (raw, vendor, step, identifier) in cases {
            let id = IdentificationFrame::decode(raw).unwrap();
            assert_eq!(id.vendor(), vendor);
            assert_eq!(id.baud_step(), step);
            assert_eq!(id.identifier(), identifier);
        }

        // 16 identifier characters is the longest accepted message (23 bytes)
        let raw = b"/SAT5EM72000656621123\r\n";
        assert_eq!(raw.len(), 23);
        let id = IdentificationFrame::decode(raw).unwrap();
        assert_eq!(id.identifier().len(), 16);

        let id = IdentificationFrame::decode(b"/CPz3NEVAMT123.2302\r\n").unwrap();
        assert!(id.short_reaction_time());
        assert_eq!(id.baud_rate(), 2400);
    }

    #[test]
    fn test_decode_identification_malformed() {
        for raw in [
            &b""[..],
            b"/TPC6NEVAMT324.1106\r\n",
            b"/TpC5NEVAMT324.1106\r\n",
            b"/tPC5NEVAMT324.1106\r\n",
            b"/SAT5EM72000656621abcd\r\n",
            b"/SAT5EM720006566211234\r\n",
            b"TPC5NEVAMT324.1106\r\n",
            b"/TPC5NEVAMT324.1106\r",
            b"/TPC5\r\n",
            b"/TPC5NEVA MT\r\n",
        ] {
            assert!(
                matches!(
                    IdentificationFrame::decode(raw),
                    Err(Error::MalformedFrame { .. })
                ),
                "{:?} should be rejected",
                raw.escape_ascii().to_string()
            );
        }
    }

    #[test]
    fn test_decode_password() {
        let frame = PasswordFrame::decode(b"\x01P0\x02(00000000)\x03`").unwrap();
        assert_eq!(frame.password(), b"00000000");

        let frame = PasswordFrame::decode(b"\x01P0\x02(9)\x03Y").unwrap();
        assert_eq!(frame.password(), b"9");

        let frame = PasswordFrame::decode(b"\x01P0\x02()\x03`").unwrap();
        assert!(frame.password().is_empty());
    }

    #[test]
    fn test_decode_password_malformed() {
        for raw in [
            &b""[..],
            b"P0\x02(00000000)\x03`",
            b"\x01P3\x02(00000000)\x03`",
            b"\x01P0\x02\x03`",
        ] {
            assert!(matches!(
                PasswordFrame::decode(raw),
                Err(Error::MalformedFrame { .. })
            ));
        }

        assert!(matches!(
            PasswordFrame::decode(b"\x01P0\x02(00000000)\x03s"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_check_ack() {
        assert!(check_ack(&[ACK]).is_ok());
        assert!(matches!(
            check_ack(&[NAK]),
            Err(Error::ErrorCodeReceived(_))
        ));
        assert!(matches!(
            check_ack(&data_frame("", &["ER01"])),
            Err(Error::ErrorCodeReceived(code)) if code == "ER01"
        ));
        assert!(matches!(
            check_ack(&data_frame("", &["123"])),
            Err(Error::UnexpectedResponse(_))
        ));
        assert!(matches!(check_ack(b""), Err(Error::UnexpectedResponse(_))));
        assert!(matches!(
            check_ack(&[ACK, ACK]),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_data_frame_left_inverse_of_read(
            groups in proptest::collection::vec(0u8..=255, 4),
            fields in proptest::collection::vec("[0-9]{1,6}(\\.[0-9]{1,4})?", 1..8),
        ) {
            let display = format!(
                "{:02X}.{:02X}.{:02X}*{:02X}",
                groups[0], groups[1], groups[2], groups[3]
            );
            let addr = ObisAddress::parse(&display).unwrap();
            let command = CommandFrame::read(&addr);

            let refs = fields.iter().map(String::as_str).collect::<Vec<_>>();
            let raw = data_frame(command.address().unwrap().compact(), &refs);

            let frame = DataFrame::decode(&raw).unwrap();
            prop_assert_eq!(frame.fields(), fields.as_slice());
            prop_assert_eq!(frame.obis(), Some(addr));
        }
    }
}
