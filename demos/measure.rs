// Block measurement example
//
// Captures one block on the given channels and writes it to CSV.

use std::path::PathBuf;

use clap::Parser;
use handyscope_rs::{DeviceLocator, Oscilloscope, SessionConfig};

#[derive(Parser)]
#[command(name = "measure")]
#[command(version = "1.0")]
#[command(about = "Capture one block from a Handyscope oscilloscope")]
struct Args {
    /// Part of the product name, e.g. "HS5"
    device_name: String,

    #[arg(short = 'f', long, default_value_t = 1e6, help = "Sample frequency in Hz")]
    sample_frequency: f64,

    #[arg(short, long, default_value_t = 10_000, help = "Samples per channel")]
    record_length: u64,

    #[arg(short = 'p', long, default_value_t = 0.0, help = "Share of the record before the trigger")]
    pre_sample_ratio: f64,

    #[arg(long, default_value_t = 8.0, help = "Input range in volts")]
    range: f64,

    /// Zero based channels to enable
    #[arg(short, long, value_delimiter = ',', default_values_t = [0u16])]
    channels: Vec<u16>,

    #[arg(short, long, help = "TOML file with session settings")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "measurement.csv")]
    output: PathBuf,

    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    println!("Handyscope Block Measurement");
    println!("============================");
    println!("Device: {}", args.device_name);
    println!("Sample frequency: {} Hz", args.sample_frequency);
    println!("Record length: {}", args.record_length);
    println!("Channels: {:?}\n", args.channels);

    let locator = DeviceLocator::native()?.with_config(config);
    let mut scope = Oscilloscope::open(&locator, &args.device_name)?;
    println!("✓ Connected to {}", scope.session().name()?);

    scope.set_measure_mode("block")?;
    let frequency = scope.set_sample_frequency(args.sample_frequency)?;
    let length = scope.set_record_length(args.record_length)?;
    scope.set_pre_sample_ratio(args.pre_sample_ratio)?;
    for channel in scope.channels()? {
        let wanted = args.channels.contains(&channel.index());
        channel.set_enabled(wanted)?;
        if wanted {
            channel.set_range(args.range)?;
            channel.set_coupling("DCV")?;
        }
    }
    println!("Device settled on {frequency} Hz and {length} samples");

    let measurement = scope.measure()?;
    println!(
        "✓ Captured {} samples ({} before the trigger)",
        measurement.sample_count(),
        measurement.pre_samples
    );
    println!("{}", measurement.to_dataframe()?.head(Some(5)));

    measurement.write_csv(&args.output)?;
    println!("Written to {}", args.output.display());
    Ok(())
}
