//! Meter identity structures

use std::fmt;

/// Meter identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterInfo {
    /// Three-letter manufacturer tag from the identification message
    pub vendor: String,

    /// Device identifier from the identification message
    pub identifier: String,

    /// Serial number (read on demand)
    pub serial_number: Option<String>,

    /// Bus address, configured or read from the meter
    pub address: Option<String>,
}

impl MeterInfo {
    pub fn new(vendor: String, identifier: String) -> Self {
        Self {
            vendor,
            identifier,
            serial_number: None,
            address: None,
        }
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.address = (!address.is_empty()).then_some(address);
        self
    }

    /// Model part of the identifier, e.g. `NEVAMT324` of `NEVAMT324.1106`
    pub fn model(&self) -> &str {
        split_identifier(&self.identifier).0
    }

    /// Version part of the identifier, e.g. `1106` of `NEVAMT324.1106`
    ///
    /// `None` when the identifier carries no version suffix.
    pub fn version(&self) -> Option<&str> {
        split_identifier(&self.identifier).1
    }
}

/// Split `MODEL.VERSION`
pub fn split_identifier(identifier: &str) -> (&str, Option<&str>) {
    match identifier.split_once('.') {
        Some((model, version)) => (model, Some(version)),
        None => (identifier, None),
    }
}

impl fmt::Display for MeterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self
            .address
            .as_deref()
            .or(self.serial_number.as_deref())
            .unwrap_or("-");
        write!(f, "[{} : {}]", self.identifier, address)
    }
}
