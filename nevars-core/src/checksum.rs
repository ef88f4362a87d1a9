//! Block check character (BCC)
//!
//! IEC 61107 protects every `SOH`/`STX` framed message with a single byte:
//! the XOR of every byte after the opening `SOH` (or `STX`) up to and
//! including `ETX`.

use tracing::trace;

/// Calculate the BCC over `data`
///
/// # Examples
///
/// ```
/// use nevars_core::checksum;
///
/// assert_eq!(checksum::calculate(b"R1\x0260010AFF()\x03"), 0x15);
/// ```
pub fn calculate(data: &[u8]) -> u8 {
    let bcc = data.iter().fold(0u8, |acc, byte| acc ^ byte);

    trace!(
        len = data.len(),
        bcc = format!("0x{:02X}", bcc),
        "Calculated BCC"
    );

    bcc
}

/// Verify `expected` against the BCC of `data`
pub fn verify(data: &[u8], expected: u8) -> bool {
    calculate(data) == expected
}

/// Verify a complete framed message
///
/// The first byte (`SOH`/`STX`) is skipped and the last byte is the BCC.
/// Frames shorter than three bytes never verify.
pub fn verify_frame(frame: &[u8]) -> bool {
    match frame {
        [_, body @ .., bcc] if !body.is_empty() => verify(body, *bcc),
        _ => false,
    }
}
