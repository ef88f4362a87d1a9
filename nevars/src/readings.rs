//! Readings
//!
//! Every quantity goes through [`Meter::read`]; the typed helpers only pick
//! an address and interpret the raw fields.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use nevars_core::{schedule::decode_records, CommandFrame, DataFrame, ObisAddress};
use nevars_types::{
    clock, meter_info::split_identifier, ActiveEnergy, MeterInfo, ScheduleRecord,
    SeasonalScheduleEntry, SpecialDayScheduleEntry, TariffSchedule, TariffSchedulePart,
};

use crate::{
    error::{Error, Result},
    obis_codes,
    Meter,
};

impl Meter {
    /// Read the data message at `address`
    ///
    /// # Errors
    ///
    /// [`nevars_core::Error::ErrorCodeReceived`] when the meter answers with
    /// an error code such as `(ER03)`.
    pub async fn read(&mut self, address: &ObisAddress) -> Result<DataFrame> {
        self.send(&CommandFrame::read(address)).await?;
        let frame = self.receive().await?;

        if let Some(code) = frame.error_code() {
            return Err(nevars_core::Error::ErrorCodeReceived(format!(
                "{} at {}",
                code, address
            ))
            .into());
        }

        debug!("{} -> {}", address, frame);
        Ok(frame)
    }

    async fn read_code(&mut self, code: &str) -> Result<DataFrame> {
        let address = ObisAddress::parse(code)?;
        self.read(&address).await
    }

    /// Read a single value, parsed as `T`
    pub async fn read_scalar<T>(&mut self, address: &ObisAddress) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let frame = self.read(address).await?;
        parse_field(frame.first())
    }

    /// Read every field, each parsed as `T`
    pub async fn read_values<T>(&mut self, address: &ObisAddress) -> Result<Vec<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let frame = self.read(address).await?;
        frame.fields().iter().map(|f| parse_field(f)).collect()
    }

    /// Serial number, read once per session
    pub async fn serial_number(&mut self) -> Result<String> {
        if let Some(serial) = self.session().serial_number() {
            return Ok(serial.to_string());
        }

        let frame = self.read_code(obis_codes::SERIAL_NUMBER).await?;
        let serial = frame.first().to_string();
        Ok(self.session_mut().remember_serial_number(serial).to_string())
    }

    /// Device identifier reported at sign-on
    pub fn identifier(&self) -> Option<&str> {
        self.session().identifier()
    }

    /// Model part of the device identifier
    pub fn model(&self) -> Option<&str> {
        self.identifier().map(|id| split_identifier(id).0)
    }

    /// Version part of the device identifier
    pub fn version(&self) -> Option<&str> {
        self.identifier().and_then(|id| split_identifier(id).1)
    }

    /// Bus address; read once per session when none was configured
    pub async fn bus_address(&mut self) -> Result<String> {
        if !self.address().is_empty() {
            return Ok(self.address().to_string());
        }
        if let Some(address) = self.session().bus_address() {
            return Ok(address.to_string());
        }

        let frame = self.read_code(obis_codes::ADDRESS).await?;
        let address = frame.first().to_string();
        Ok(self.session_mut().remember_bus_address(address).to_string())
    }

    /// Identity of the connected meter
    pub async fn meter_info(&mut self) -> Result<MeterInfo> {
        let (vendor, identifier) = match self.session().identification() {
            Some(id) => (id.vendor().to_string(), id.identifier().to_string()),
            None => return Err(Error::NotConnected),
        };

        let serial_number = self.serial_number().await?;
        let address = self.bus_address().await?;
        Ok(MeterInfo::new(vendor, identifier)
            .with_serial_number(serial_number)
            .with_address(address))
    }

    pub async fn firmware(&mut self) -> Result<String> {
        let frame = self.read_code(obis_codes::FIRMWARE_ID).await?;
        Ok(frame.first().to_string())
    }

    /// Internal temperature [°C]
    pub async fn temperature(&mut self) -> Result<i32> {
        let frame = self.read_code(obis_codes::TEMPERATURE).await?;
        parse_temperature(frame.first())
    }

    /// Cumulative active energy since the first start of measurement
    pub async fn active_energy(&mut self) -> Result<ActiveEnergy> {
        self.read_energy(obis_codes::ACTIVE_ENERGY).await
    }

    /// Active energy accumulated this month
    pub async fn active_energy_last_month(&mut self) -> Result<ActiveEnergy> {
        let now = self.active_energy().await?;
        let baseline = self.read_energy(obis_codes::ACTIVE_ENERGY_PREV_MONTH).await?;
        Ok(now.since(&baseline))
    }

    /// Active energy accumulated today
    pub async fn active_energy_last_day(&mut self) -> Result<ActiveEnergy> {
        let now = self.active_energy().await?;
        let baseline = self.read_energy(obis_codes::ACTIVE_ENERGY_PREV_DAY).await?;
        Ok(now.since(&baseline))
    }

    async fn read_energy(&mut self, code: &str) -> Result<ActiveEnergy> {
        let address = ObisAddress::parse(code)?;
        let values: Vec<f64> = self.read_values(&address).await?;
        Ok(ActiveEnergy::from_values(&values)?)
    }

    /// Seasonal calendar
    ///
    /// Tariff schedules referenced by the entries are remembered for
    /// [`Meter::tariff_schedules`].
    pub async fn seasonal_schedules(&mut self) -> Result<Vec<SeasonalScheduleEntry>> {
        let entries: Vec<SeasonalScheduleEntry> =
            self.read_records(obis_codes::SEASONAL_SCHEDULES).await?;

        self.session_mut()
            .record_tariff_schedules(entries.iter().flat_map(|e| e.schedule_numbers()));
        Ok(entries)
    }

    /// Special days calendar
    pub async fn special_days_schedules(&mut self) -> Result<Vec<SpecialDayScheduleEntry>> {
        let entries: Vec<SpecialDayScheduleEntry> =
            self.read_records(obis_codes::SPECIAL_DAYS_SCHEDULES).await?;

        self.session_mut()
            .record_tariff_schedules(entries.iter().map(|e| e.schedule));
        Ok(entries)
    }

    /// Tariff schedules referenced by the calendars read so far
    ///
    /// Falls back to schedule #1 when no calendar has been read. Schedules
    /// without parts are omitted.
    pub async fn tariff_schedules(&mut self) -> Result<Vec<TariffSchedule>> {
        let mut numbers: Vec<u8> = self.session().tariff_schedules().iter().copied().collect();
        if numbers.is_empty() {
            numbers.push(1);
        }

        let base = ObisAddress::parse(obis_codes::TARIFF_SCHEDULE)?;
        let mut schedules = Vec::with_capacity(numbers.len());

        for number in numbers {
            let address = base.with_group(1, number)?;
            let frame = self.read(&address).await?;
            let parts: Vec<TariffSchedulePart> = decode_records(frame.fields())?;

            if parts.is_empty() {
                debug!("Tariff schedule #{} is empty", number);
                continue;
            }
            schedules.push(TariffSchedule::new(number, parts));
        }

        Ok(schedules)
    }

    async fn read_records<R: ScheduleRecord>(&mut self, code: &str) -> Result<Vec<R>> {
        let frame = self.read_code(code).await?;
        Ok(decode_records(frame.fields())?)
    }

    /// Meter date
    pub async fn date(&mut self) -> Result<NaiveDate> {
        let frame = self.read_code(obis_codes::DATE).await?;
        Ok(clock::parse_date(frame.first())?)
    }

    /// Meter time
    pub async fn time(&mut self) -> Result<NaiveTime> {
        let frame = self.read_code(obis_codes::TIME).await?;
        Ok(clock::parse_time(frame.first())?)
    }

    /// Meter date and time
    pub async fn datetime(&mut self) -> Result<NaiveDateTime> {
        let frame = self.read_code(obis_codes::DATETIME).await?;
        Ok(clock::parse_datetime(frame.first())?)
    }
}

fn parse_field<T>(field: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    field
        .parse()
        .map_err(|e| Error::InvalidResponse(format!("cannot parse {:?}: {}", field, e)))
}

fn parse_temperature(field: &str) -> Result<i32> {
    match field.strip_prefix('1') {
        Some(magnitude) => parse_field::<i32>(magnitude).map(|t| -t),
        _ => parse_field(field),
    }
}
