//! Protocol constants

use std::time::Duration;

/// Start of header
pub const SOH: u8 = 0x01;

/// Start of text
pub const STX: u8 = 0x02;

/// End of text
pub const ETX: u8 = 0x03;

/// Positive acknowledgement
pub const ACK: u8 = 0x06;

/// Negative acknowledgement
pub const NAK: u8 = 0x15;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

/// Baud-rate ladder indexed by the identification baud digit
pub const BAUD_RATES: [u32; 6] = [300, 600, 1200, 2400, 4800, 9600];

/// Minimum pause between the option-select message and the baud change
pub const BAUD_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Identification message envelope: `/`, vendor (3), baud digit, CR LF
pub const IDENTIFICATION_ENVELOPE_LEN: usize = 7;

/// Longest identifier a meter may report
pub const MAX_IDENTIFIER_LEN: usize = 16;

/// Password message length on a local serial line
pub const PASSWORD_MESSAGE_LEN: usize = 16;

/// End-of-session (break) frame: `SOH B0 ETX BCC`
pub const BREAK_FRAME: [u8; 5] = [SOH, b'B', b'0', ETX, 0x71];

/// Look up the rate for a baud digit
pub fn baud_rate(step: u8) -> Option<u32> {
    BAUD_RATES.get(step as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_ladder() {
        assert_eq!(baud_rate(0), Some(300));
        assert_eq!(baud_rate(5), Some(9600));
        assert_eq!(baud_rate(6), None);
    }

    #[test]
    fn test_break_frame_checksum() {
        assert_eq!(crate::checksum::calculate(&BREAK_FRAME[1..4]), BREAK_FRAME[4]);
    }
}
