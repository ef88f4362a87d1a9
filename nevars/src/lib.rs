//! # nevars
//!
//! Client for Neva MT electricity meters speaking IEC 61107 in
//! programming mode, over a local serial port or an RFC2217 tunnel.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nevars::Meter;
//!
//! #[tokio::main]
//! async fn main() -> nevars::Result<()> {
//!     let mut meter = Meter::from_url("rfc2217://192.168.1.50:4001")?
//!         .with_password("00000000");
//!     meter.start_session().await?;
//!
//!     println!("{}", meter.meter_info().await?);
//!     for schedule in meter.seasonal_schedules().await? {
//!         println!("{:?}", schedule);
//!     }
//!
//!     meter.close().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod meter;
pub mod obis_codes;
pub mod readings;

// Re-exports
pub use error::{Error, Result};
pub use meter::Meter;

// Re-export types
pub use nevars_core::{DataFrame, ObisAddress, Session, SessionState};
pub use nevars_transport::{SerialSettings, Transport};
pub use nevars_types::{
    ActiveEnergy, MeterInfo, SeasonalScheduleEntry, SpecialDayScheduleEntry, TariffSchedule,
    TariffSchedulePart,
};
