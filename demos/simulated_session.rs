// Simulated session example
//
// Walks through generator, oscilloscope and I2C host on the in-process
// simulated library, so it runs without any hardware attached.

use std::sync::Arc;
use std::time::Duration;

use handyscope_rs::jitter::{intersample_peak, SyncOffsetTable};
use handyscope_rs::sdk::simulated::{SimulatedDevice, SimulatedSdk};
use handyscope_rs::{DeviceLocator, Generator, I2cHost, Oscilloscope, SessionConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Handyscope Simulated Session");
    println!("============================\n");

    let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope(
        "Handyscope HS5-540XMS",
        29_000,
    )]));
    let config = SessionConfig::default().with_poll_interval(Duration::from_millis(10));
    let locator = DeviceLocator::new(sdk).with_config(config);
    print!("{}", locator.overview()?);

    println!("\n1. Generator");
    let mut gen = Generator::open(&locator, "HS5")?;
    println!("  Signal types: {:?}", gen.signal_types()?);
    gen.set_signal_type("triangle")?;
    gen.set_frequency(5e3)?;
    gen.set_amplitude(2.0)?;
    gen.set_output_on(true)?;
    gen.start()?;
    println!(
        "  {} at {} Hz, {} V, status {:?}",
        gen.signal_type()?,
        gen.frequency()?,
        gen.amplitude()?,
        gen.status()?
    );

    println!("\n2. Oscilloscope");
    let mut scope = Oscilloscope::open(&locator, "HS5")?;
    scope.set_measure_mode("block")?;
    scope.set_sample_frequency(1e6)?;
    scope.set_record_length(2000)?;
    for channel in scope.channels()? {
        channel.set_enabled(true)?;
        channel.set_range(2.0)?;
    }
    let measurement = scope.measure()?;
    let frame = measurement.to_dataframe()?;
    println!("{}", frame.head(Some(5)));
    if let Some(samples) = measurement.channel(0) {
        println!("  Channel 1 peaks at sample {:?}", intersample_peak(samples));
    }
    gen.stop()?;

    println!("\n3. I2C host");
    let i2c = I2cHost::open(&locator, "HS5")?;
    i2c.write_byte_word(0x48, 0x01, 0x6083)?;
    println!("  Devices on the bus: {:02x?}", i2c.scan()?);

    println!("\n4. Sync offsets");
    let mut table = SyncOffsetTable::new();
    table.insert(scope.session().serial_number()?, scope.sample_frequency()?, 0.37);
    println!("  {}", serde_json::to_string(&table)?);

    Ok(())
}
