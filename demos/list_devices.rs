// Device list example
//
// Prints every instrument libtiepie can see, then opens the first
// oscilloscope and shows what the device reports about itself.

use handyscope_rs::{DeviceKind, DeviceLocator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Handyscope Device List");
    println!("======================\n");

    let locator = DeviceLocator::native()?;
    println!("libtiepie {}\n", locator.library_version()?);

    let devices = locator.list()?;
    if devices.is_empty() {
        println!("No instruments found. Connect a device and try again.");
        return Ok(());
    }
    print!("{}", locator.overview()?);

    let Some(info) = devices
        .iter()
        .find(|info| info.device_types.contains(&DeviceKind::Oscilloscope))
    else {
        println!("\nNone of the devices has an oscilloscope.");
        return Ok(());
    };

    let scope = locator
        .open_by_serial(info.serial_number, DeviceKind::Oscilloscope)?
        .into_oscilloscope()
        .ok_or("opened device is not an oscilloscope")?;
    let session = scope.session();
    println!("\n{}", session.name()?);
    println!("  Serial number:    {}", session.serial_number()?);
    println!("  Driver version:   {}", session.driver_version()?);
    println!("  Firmware version: {}", session.firmware_version()?);
    match session.calibration_date()? {
        Some(date) => println!("  Calibrated:       {date}"),
        None => println!("  Calibrated:       never"),
    }
    println!("  Channels:         {}", scope.channel_count()?);
    println!("  Max sample rate:  {:.0} Hz", scope.sample_frequency_max()?);
    println!("  Resolutions:      {:?}", scope.resolutions()?);
    for input in session.trigger_inputs()? {
        println!("  Trigger input {}: {}", input.index(), input.name()?);
    }

    Ok(())
}
