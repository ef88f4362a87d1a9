//! Default OBIS addresses of Neva MT meters

/// Serial number
pub const SERIAL_NUMBER: &str = "60.01.00*FF";
/// Bus address (often equal to the serial number)
pub const ADDRESS: &str = "60.01.01*FF";
pub const FIRMWARE_ID: &str = "60.01.04*FF";
/// Status word
pub const STATUS: &str = "60.05.00*FF";
/// Internal temperature, leading `1` marks a negative value
pub const TEMPERATURE: &str = "60.09.00*FF";

/// Date, `YYMMDD`
pub const DATE: &str = "00.09.02*FF";
/// Time, `hhmmss`
pub const TIME: &str = "00.09.01*FF";
/// Date and time, `YYMMDDhhmmss`
pub const DATETIME: &str = "00.09.80*FF";

pub const SEASONAL_SCHEDULES: &str = "0D.00.00*FF";
pub const SPECIAL_DAYS_SCHEDULES: &str = "0B.00.00*FF";
/// Tariff schedule #1; the second group carries the schedule number
pub const TARIFF_SCHEDULE: &str = "0A.01.64*FF";

/// Supply frequency [Hz]
pub const FREQUENCY: &str = "0E.07.01*FF";

/// Cumulative active energy, total and T1..T4 [kWh]
pub const ACTIVE_ENERGY: &str = "0F.08.80*FF";
/// Active energy at the start of the current month
pub const ACTIVE_ENERGY_PREV_MONTH: &str = "0F.08.80*00";
/// Active energy at the start of the current day
pub const ACTIVE_ENERGY_PREV_DAY: &str = "0F.80.80*00";

/// Phase voltages [V]
pub const VOLTAGE_L1: &str = "20.07.00*FF";
pub const VOLTAGE_L2: &str = "34.07.00*FF";
pub const VOLTAGE_L3: &str = "48.07.00*FF";

/// Phase currents [A]
pub const CURRENT_L1: &str = "1F.07.00*FF";
pub const CURRENT_L2: &str = "33.07.00*FF";
pub const CURRENT_L3: &str = "47.07.00*FF";

/// Active power [W]
pub const ACTIVE_POWER_L1: &str = "24.07.00*FF";
pub const ACTIVE_POWER_L2: &str = "38.07.00*FF";
pub const ACTIVE_POWER_L3: &str = "4C.07.00*FF";
pub const ACTIVE_POWER_SUM: &str = "10.07.00*FF";

pub const POWER_FACTOR_L1: &str = "21.07.FF*FF";
pub const POWER_FACTOR_L2: &str = "35.07.FF*FF";
pub const POWER_FACTOR_L3: &str = "49.07.FF*FF";

/// Reactive power [var]
pub const POSITIVE_REACTIVE_POWER_L1: &str = "17.07.01*FF";
pub const NEGATIVE_REACTIVE_POWER_L1: &str = "18.07.01*FF";
pub const POSITIVE_REACTIVE_POWER_L2: &str = "2B.07.01*FF";
pub const NEGATIVE_REACTIVE_POWER_L2: &str = "2C.07.01*FF";
pub const POSITIVE_REACTIVE_POWER_L3: &str = "3F.07.01*FF";
pub const NEGATIVE_REACTIVE_POWER_L3: &str = "40.07.01*FF";
pub const POSITIVE_REACTIVE_POWER_SUM: &str = "03.07.01*FF";
pub const NEGATIVE_REACTIVE_POWER_SUM: &str = "04.07.01*FF";
