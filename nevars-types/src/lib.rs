//! Type definitions for nevars

pub mod clock;
pub mod energy;
pub mod error;
pub mod meter_info;
pub mod schedule;

pub use energy::ActiveEnergy;
pub use error::{Error, Result};
pub use meter_info::MeterInfo;
pub use schedule::{
    ScheduleRecord, SeasonalScheduleEntry, SpecialDayScheduleEntry, TariffSchedule,
    TariffSchedulePart,
};
