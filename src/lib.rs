//! # handyscope-rs
//!
//! Typed access to TiePie Handyscope USB instruments (oscilloscope, signal
//! generator and I2C host) through the vendor's libtiepie SDK.
//!
//! The SDK speaks in numeric constants and a process-wide status code. This
//! crate puts string labels ("sine", "rising", "block") in front of the
//! constants, checks the status after every native call, and finds and opens
//! devices by a piece of their product name.
//!
//! ## Features
//!
//! - **Label-based enumerations**: see [`registry`] for every domain and label
//! - **Checked calls**: negative statuses become [`HandyscopeError::NativeCall`],
//!   positive ones (e.g. a clipped value) are logged as warnings
//! - **Device discovery**: [`DeviceLocator`] scans the device list by name
//! - **DataFrame output**: measurements convert to `polars` frames
//! - **Jitter-free measurements**: see [`jitter`] for re-aligning records
//!   against the generator
//! - **Simulated backend**: [`sdk::simulated::SimulatedSdk`] runs everything
//!   without hardware
//!
//! The real SDK binding is behind the `libtiepie` cargo feature.
//!
//! ## Examples
//!
//! ### Measuring
//!
//! ```rust,no_run
//! # #[cfg(feature = "libtiepie")]
//! # fn main() -> handyscope_rs::Result<()> {
//! use handyscope_rs::{DeviceLocator, Oscilloscope};
//!
//! let locator = DeviceLocator::native()?;
//! let mut scope = Oscilloscope::open(&locator, "HS5")?;
//! scope.set_measure_mode("block")?;
//! scope.set_sample_frequency(1e6)?;
//! scope.set_record_length(10_000)?;
//! scope.channel(0)?.set_range(8.0)?;
//!
//! let measurement = scope.measure()?;
//! println!("{}", measurement.to_dataframe()?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "libtiepie"))]
//! # fn main() {}
//! ```
//!
//! ### Generating
//!
//! ```rust
//! use std::sync::Arc;
//! use handyscope_rs::{DeviceKind, DeviceLocator, Generator};
//! use handyscope_rs::sdk::simulated::{SimulatedDevice, SimulatedSdk};
//!
//! let sdk = Arc::new(SimulatedSdk::with_devices(vec![
//!     SimulatedDevice::handyscope("Handyscope HS5-540XMS", 29_000),
//! ]));
//! let locator = DeviceLocator::new(sdk);
//!
//! let mut gen = Generator::open(&locator, "HS5")?;
//! gen.set_signal_type("square")?;
//! gen.set_frequency(10e3)?;
//! gen.set_amplitude(2.0)?;
//! gen.set_output_on(true)?;
//! gen.start()?;
//! # Ok::<(), handyscope_rs::HandyscopeError>(())
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod i2c;
pub mod jitter;
pub mod locator;
pub mod oscilloscope;
pub mod registry;
pub mod sdk;
pub mod session;
pub mod status;
pub mod trigger;

pub use config::SessionConfig;
pub use error::{HandyscopeError, Result};
pub use generator::Generator;
pub use i2c::I2cHost;
pub use jitter::{JitterFreeRecord, SyncOffsetSetup, SyncOffsetTable};
pub use locator::{DeviceInfo, DeviceLocator, OpenedDevice};
pub use oscilloscope::{
    Channel, Measurement, Oscilloscope, RawMeasurement, ScopeState,
    TRIG_HOLDOFF_ALL_PRE_SAMPLES,
};
pub use registry::Domain;
pub use sdk::RawSamples;
pub use session::{DeviceKind, DeviceSession};
pub use status::StatusCode;
pub use trigger::{TriggerInput, TriggerOutput};
