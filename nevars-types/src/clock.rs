//! Meter clock strings
//!
//! Dates and times come back as bare digit strings: `YYMMDD`, `hhmmss` and
//! `YYMMDDhhmmss`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%y%m%d";
const TIME_FORMAT: &str = "%H%M%S";
const DATETIME_FORMAT: &str = "%y%m%d%H%M%S";

/// Parse a `YYMMDD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Parse(format!("invalid meter date {:?}: {}", value, e)))
}

/// Parse a `hhmmss` time
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| Error::Parse(format!("invalid meter time {:?}: {}", value, e)))
}

/// Parse a `YYMMDDhhmmss` timestamp
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| Error::Parse(format!("invalid meter datetime {:?}: {}", value, e)))
}
