//! Tariff schedule records
//!
//! Meters report their tariff calendar as tables of fixed-width decimal
//! pairs. Each record type here knows how many pairs it consumes and how to
//! build itself from the decoded group values.

use std::fmt;

use crate::error::{Error, Result};

/// A record decoded from one fixed-width schedule field
pub trait ScheduleRecord: Sized {
    /// Number of decimal groups per field
    const ARITY: usize;

    /// Build the record from exactly `ARITY` group values
    fn from_groups(groups: &[u32]) -> Result<Self>;
}

fn group(groups: &[u32], idx: usize) -> Result<u8> {
    let value = groups
        .get(idx)
        .copied()
        .ok_or_else(|| Error::Validation(format!("missing schedule group {}", idx)))?;

    u8::try_from(value)
        .map_err(|_| Error::Validation(format!("schedule group {} out of range: {}", idx, value)))
}

fn check_arity(groups: &[u32], arity: usize) -> Result<()> {
    if groups.len() != arity {
        return Err(Error::Validation(format!(
            "expected {} schedule groups, got {}",
            arity,
            groups.len()
        )));
    }
    Ok(())
}

/// Seasonal schedule entry
///
/// From `month`/`day` on, weekdays, Saturdays and Sundays follow the given
/// tariff schedule numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeasonalScheduleEntry {
    pub month: u8,
    pub day: u8,
    pub weekday_schedule: u8,
    pub saturday_schedule: u8,
    pub sunday_schedule: u8,
}

impl SeasonalScheduleEntry {
    /// Tariff schedule numbers referenced by this entry
    pub fn schedule_numbers(&self) -> [u8; 3] {
        [
            self.weekday_schedule,
            self.saturday_schedule,
            self.sunday_schedule,
        ]
    }
}

impl ScheduleRecord for SeasonalScheduleEntry {
    const ARITY: usize = 5;

    fn from_groups(groups: &[u32]) -> Result<Self> {
        check_arity(groups, Self::ARITY)?;
        Ok(Self {
            month: group(groups, 0)?,
            day: group(groups, 1)?,
            weekday_schedule: group(groups, 2)?,
            saturday_schedule: group(groups, 3)?,
            sunday_schedule: group(groups, 4)?,
        })
    }
}

impl fmt::Display for SeasonalScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}: weekday={} sat={} sun={}",
            self.month,
            self.day,
            self.weekday_schedule,
            self.saturday_schedule,
            self.sunday_schedule
        )
    }
}

/// Special day entry (holiday override)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecialDayScheduleEntry {
    pub month: u8,
    pub day: u8,
    pub schedule: u8,
}

impl ScheduleRecord for SpecialDayScheduleEntry {
    const ARITY: usize = 3;

    fn from_groups(groups: &[u32]) -> Result<Self> {
        check_arity(groups, Self::ARITY)?;
        Ok(Self {
            month: group(groups, 0)?,
            day: group(groups, 1)?,
            schedule: group(groups, 2)?,
        })
    }
}

impl fmt::Display for SpecialDayScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}: schedule={}", self.month, self.day, self.schedule)
    }
}

/// One switching point of a daily tariff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TariffSchedulePart {
    pub hour: u8,
    pub minute: u8,
    pub tariff: u8,
}

impl ScheduleRecord for TariffSchedulePart {
    const ARITY: usize = 3;

    fn from_groups(groups: &[u32]) -> Result<Self> {
        check_arity(groups, Self::ARITY)?;
        Ok(Self {
            hour: group(groups, 0)?,
            minute: group(groups, 1)?,
            tariff: group(groups, 2)?,
        })
    }
}

impl fmt::Display for TariffSchedulePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} T{}", self.hour, self.minute, self.tariff)
    }
}

/// Daily tariff schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffSchedule {
    /// Schedule number as referenced by seasonal/special-day entries
    pub number: u8,

    /// Switching points in meter order
    pub parts: Vec<TariffSchedulePart>,
}

impl TariffSchedule {
    pub fn new(number: u8, parts: Vec<TariffSchedulePart>) -> Self {
        Self { number, parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for TariffSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schedule #{}[", self.number)?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}
