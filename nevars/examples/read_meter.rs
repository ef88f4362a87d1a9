//! Read identity, clock and calendars from a meter
//!
//! ```text
//! METER_URL=rfc2217://192.168.1.50:4001 METER_PASSWORD=00000000 cargo run --example read_meter
//! ```

use nevars::Meter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = std::env::var("METER_URL").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let address = std::env::var("METER_ADDRESS").unwrap_or_default();
    let password = std::env::var("METER_PASSWORD").unwrap_or_default();

    let mut meter = Meter::from_url(&url)?
        .with_address(address)
        .with_password(password);

    meter.start_session().await?;
    println!("Meter: {}", meter.meter_info().await?);
    println!("Clock: {}", meter.datetime().await?);

    println!("Active energy: {}", meter.active_energy().await?);
    println!("This month: {}", meter.active_energy_last_month().await?);

    for entry in meter.seasonal_schedules().await? {
        println!("Season from {:02}.{:02}: {:?}", entry.day, entry.month, entry.schedule_numbers());
    }
    for entry in meter.special_days_schedules().await? {
        println!("Special day {:02}.{:02}: schedule #{}", entry.day, entry.month, entry.schedule);
    }
    for schedule in meter.tariff_schedules().await? {
        println!("{}", schedule);
    }

    meter.close().await?;
    Ok(())
}
