//! OBIS address codec
//!
//! Addresses are written `CC.DD.EE*FF` for humans and sent as the compact
//! eight-character form `CCDDEEFF`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static DISPLAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-F]{2}\.[0-9A-F]{2}\.[0-9A-F]{2}\*[0-9A-F]{2}$")
        .expect("static OBIS pattern is valid")
});

/// Validated OBIS address, stored in compact wire form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObisAddress {
    compact: [u8; 8],
}

impl ObisAddress {
    /// Length of the compact wire form
    pub const COMPACT_LEN: usize = 8;

    /// Parse a dotted display address such as `60.01.00*FF`
    ///
    /// # Examples
    ///
    /// ```
    /// use nevars_core::ObisAddress;
    ///
    /// let addr = ObisAddress::parse("60.01.00*FF").unwrap();
    /// assert_eq!(addr.compact(), "600100FF");
    /// assert_eq!(addr.to_display(), "60.01.00*FF");
    /// ```
    pub fn parse(display: &str) -> Result<Self> {
        if !DISPLAY_PATTERN.is_match(display) {
            return Err(Error::InvalidAddressFormat(display.to_string()));
        }

        let b = display.as_bytes();
        let compact = [b[0], b[1], b[3], b[4], b[6], b[7], b[9], b[10]];

        Ok(Self { compact })
    }

    /// Rebuild an address from its compact wire form (`600100FF`)
    pub fn from_compact(compact: &str) -> Result<Self> {
        let bytes = compact.as_bytes();
        let valid = bytes.len() == Self::COMPACT_LEN
            && bytes
                .iter()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b));

        if !valid {
            return Err(Error::InvalidAddressFormat(compact.to_string()));
        }

        let mut buf = [0u8; Self::COMPACT_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self { compact: buf })
    }

    /// Compact wire bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.compact
    }

    /// Compact wire form
    pub fn compact(&self) -> &str {
        // Only ASCII hex digits are ever stored
        std::str::from_utf8(&self.compact).unwrap_or_default()
    }

    /// Dotted display form
    pub fn to_display(&self) -> String {
        let c = self.compact();
        format!("{}.{}.{}*{}", &c[0..2], &c[2..4], &c[4..6], &c[6..8])
    }

    /// Copy of this address with group `index` (0..=3) replaced
    ///
    /// Used for indexed objects such as tariff schedule `0A.<nn>.64*FF`.
    pub fn with_group(&self, index: usize, value: u8) -> Result<Self> {
        if index > 3 {
            return Err(Error::InvalidAddressFormat(format!(
                "group index {} out of range for {}",
                index,
                self.to_display()
            )));
        }

        let mut compact = self.compact;
        let hex = format!("{:02X}", value);
        compact[index * 2..index * 2 + 2].copy_from_slice(hex.as_bytes());
        Ok(Self { compact })
    }
}

impl FromStr for ObisAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ObisAddress {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ObisAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl fmt::Debug for ObisAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObisAddress({})", self.to_display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid() {
        let addr = ObisAddress::parse("0F.08.80*00").unwrap();
        assert_eq!(addr.compact(), "0F088000");
        assert_eq!(addr.as_bytes(), b"0F088000");
    }

    #[test]
    fn test_parse_rejects_bad_formats() {
        for bad in [
            "",
            "600100FF",
            "60.01.00",
            "60.01.00*F",
            "60.01.00*FFF",
            "60.01.00.FF",
            "6g.01.00*FF",
            "60.01.0a*FF",
            " 60.01.00*FF",
            "60.01.00*FF\n",
        ] {
            assert!(
                matches!(ObisAddress::parse(bad), Err(Error::InvalidAddressFormat(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_from_compact() {
        let addr = ObisAddress::from_compact("600100FF").unwrap();
        assert_eq!(addr.to_display(), "60.01.00*FF");

        assert!(ObisAddress::from_compact("600100F").is_err());
        assert!(ObisAddress::from_compact("600100fF").is_err());
    }

    #[test]
    fn test_with_group() {
        let base: ObisAddress = "0A.00.64*FF".parse().unwrap();
        let addr = base.with_group(1, 0x0C).unwrap();
        assert_eq!(addr.to_display(), "0A.0C.64*FF");
        assert!(base.with_group(4, 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_display_round_trip(s in "[0-9A-F]{2}\\.[0-9A-F]{2}\\.[0-9A-F]{2}\\*[0-9A-F]{2}") {
            let addr = ObisAddress::parse(&s).unwrap();
            prop_assert_eq!(addr.to_display(), s);
        }
    }
}
