//! Jitter-free measurements with generator and oscilloscope of one device.
//!
//! The generator output is fed to channel 1 (the reference) and through the
//! device under test to channel 2. Each record of channel 2 is then shifted
//! so that the reference peak lands where the generated signal has its
//! peak, removing the trigger jitter between records.
//!
//! The fixed delay between the two channels (the sync offset) depends on the
//! device and the sample frequency. It is measured once with both channels
//! wired to the generator ([`calculate_sync_offset`]) and kept in a
//! [`SyncOffsetTable`].

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HandyscopeError, Result};
use crate::generator::Generator;
use crate::oscilloscope::Oscilloscope;

/// Center frequency of the calibration pulse in Hz.
const PULSE_CENTER_FREQUENCY: f64 = 1e6;
const PULSE_BANDWIDTH: f64 = 1.1;

/// Sync offsets in samples, keyed by serial number and sample frequency.
///
/// Stored as JSON, e.g. `{"29000": {"100000000.0": 0.37}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOffsetTable {
    offsets: BTreeMap<String, BTreeMap<String, f64>>,
}

fn frequency_key(sample_frequency: f64) -> String {
    format!("{sample_frequency:?}")
}

impl SyncOffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`Self::load`], but a missing file gives an empty table.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, serial_number: u32, sample_frequency: f64) -> Option<f64> {
        self.offsets
            .get(&serial_number.to_string())?
            .get(&frequency_key(sample_frequency))
            .copied()
    }

    pub fn offset(&self, serial_number: u32, sample_frequency: f64) -> Result<f64> {
        self.get(serial_number, sample_frequency)
            .ok_or(HandyscopeError::SyncOffsetUnknown {
                serial: serial_number,
                sample_frequency,
            })
    }

    pub fn insert(&mut self, serial_number: u32, sample_frequency: f64, offset: f64) {
        self.offsets
            .entry(serial_number.to_string())
            .or_default()
            .insert(frequency_key(sample_frequency), offset);
    }
}

/// Position of the largest magnitude in `signal`, refined between samples
/// by fitting a parabola through the peak and its neighbours.
pub fn intersample_peak(signal: &[f32]) -> Option<f64> {
    let (peak, _) = signal
        .iter()
        .map(|v| v.abs())
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })?;
    if peak == 0 || peak + 1 >= signal.len() {
        return Some(peak as f64);
    }
    let before = f64::from(signal[peak - 1].abs());
    let at = f64::from(signal[peak].abs());
    let after = f64::from(signal[peak + 1].abs());
    let curvature = before - 2.0 * at + after;
    if curvature == 0.0 {
        return Some(peak as f64);
    }
    Some(peak as f64 + 0.5 * (before - after) / curvature)
}

/// Sample `samples` at `i + shift` for every index, linearly interpolated and
/// held at the ends.
pub fn shift_samples(samples: &[f32], shift: f64) -> Vec<f32> {
    let last = samples.len().saturating_sub(1);
    (0..samples.len())
        .map(|i| {
            let x = i as f64 + shift;
            if x <= 0.0 {
                return samples[0];
            }
            if x >= last as f64 {
                return samples[last];
            }
            let low = x.floor() as usize;
            let frac = x - low as f64;
            let a = f64::from(samples[low]);
            let b = f64::from(samples[low + 1]);
            (a + (b - a) * frac) as f32
        })
        .collect()
}

/// Gaussian modulated sine at 1 MHz, sampled at `sample_frequency`, cut
/// where the envelope falls below -40 dB on either side and padded to twice
/// that width.
pub fn calibration_pulse(sample_frequency: f64) -> Vec<f32> {
    // envelope exp(-a t^2) is at -6 dB at the band edges
    let reference = 10f64.powf(-6.0 / 20.0);
    let a = -(PI * PULSE_CENTER_FREQUENCY * PULSE_BANDWIDTH).powi(2) / (4.0 * reference.ln());
    let cutoff = (-(10f64.powf(-40.0 / 20.0)).ln() / a).sqrt();

    let count = (4.0 * cutoff * sample_frequency).ceil() as usize;
    (0..count)
        .map(|i| {
            let t = -2.0 * cutoff + i as f64 / sample_frequency;
            ((-a * t * t).exp() * (2.0 * PI * PULSE_CENTER_FREQUENCY * t).cos()) as f32
        })
        .collect()
}

/// How the sync offset calculation drives the hardware.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOffsetSetup {
    /// Measurements averaged.
    pub runs: usize,
    /// Trigger input that fires on generator start.
    pub trigger_input: u16,
}

impl Default for SyncOffsetSetup {
    fn default() -> Self {
        Self {
            runs: 10_000,
            trigger_input: 3,
        }
    }
}

/// Start scope and generator, wait, and read channels 1 and 2.
fn measure_pair(gen: &mut Generator, scope: &mut Oscilloscope) -> Result<(Vec<f32>, Vec<f32>)> {
    scope.start()?;
    gen.start()?;
    let waited = scope.wait_for_data();
    gen.stop()?;
    waited?;

    let mut channels = scope.retrieve(&[0, 1])?.channels.into_iter().flatten();
    match (channels.next(), channels.next()) {
        (Some(ch1), Some(ch2)) => Ok((ch1, ch2)),
        _ => Err(HandyscopeError::NoChannelEnabled),
    }
}

struct SavedSettings {
    signal_type: &'static str,
    mode: &'static str,
    output_on: bool,
    burst_count: u64,
    frequency_mode: &'static str,
    frequency: f64,
    amplitude: f64,
    resolution: u8,
    trigger_timeout: f64,
    record_length: u64,
    ranges: [f64; 2],
    enabled: [bool; 2],
    trigger_enabled: [bool; 2],
    trigger_input_enabled: bool,
}

impl SavedSettings {
    fn save(gen: &Generator, scope: &Oscilloscope, trigger_input: u16) -> Result<Self> {
        let ch1 = scope.channel(0)?;
        let ch2 = scope.channel(1)?;
        Ok(Self {
            signal_type: gen.signal_type()?,
            mode: gen.mode()?,
            output_on: gen.is_output_on()?,
            burst_count: gen.burst_count()?,
            frequency_mode: gen.frequency_mode()?,
            frequency: gen.frequency()?,
            amplitude: gen.amplitude()?,
            resolution: scope.resolution()?,
            trigger_timeout: scope.trigger_timeout()?,
            record_length: scope.record_length()?,
            ranges: [ch1.range()?, ch2.range()?],
            enabled: [ch1.is_enabled()?, ch2.is_enabled()?],
            trigger_enabled: [ch1.is_trigger_enabled()?, ch2.is_trigger_enabled()?],
            trigger_input_enabled: scope
                .session()
                .trigger_input(trigger_input)?
                .is_enabled()?,
        })
    }

    fn restore(&self, gen: &Generator, scope: &Oscilloscope, trigger_input: u16) -> Result<()> {
        gen.set_signal_type(self.signal_type)?;
        gen.set_burst_count(self.burst_count)?;
        gen.set_mode(self.mode)?;
        gen.set_output_on(self.output_on)?;
        gen.set_frequency_mode(self.frequency_mode)?;
        gen.set_frequency(self.frequency)?;
        gen.set_amplitude(self.amplitude)?;
        scope.set_resolution(self.resolution)?;
        scope.set_trigger_timeout(self.trigger_timeout)?;
        scope.set_record_length(self.record_length)?;
        for (index, channel) in scope.channels()?.iter().take(2).enumerate() {
            channel.set_range(self.ranges[index])?;
            channel.set_enabled(self.enabled[index])?;
            channel.set_trigger_enabled(self.trigger_enabled[index])?;
        }
        scope
            .session()
            .trigger_input(trigger_input)?
            .set_enabled(self.trigger_input_enabled)?;
        Ok(())
    }
}

fn run_sync_offset(
    gen: &mut Generator,
    scope: &mut Oscilloscope,
    setup: &SyncOffsetSetup,
    pulse: &[f32],
    sample_frequency: f64,
) -> Result<f64> {
    gen.set_signal_type("arbitrary")?;
    gen.set_mode("burst count")?;
    gen.set_output_on(true)?;
    gen.set_burst_count(1)?;
    gen.set_frequency_mode("sample")?;
    gen.set_frequency(sample_frequency)?;
    gen.set_amplitude(12.0)?;
    gen.set_arbitrary_data(pulse)?;
    scope.set_resolution(12)?;
    scope.set_trigger_timeout(5.0)?;
    for channel in scope.channels()?.iter().take(2) {
        channel.set_range(20.0)?;
        channel.set_enabled(true)?;
        channel.set_trigger_enabled(false)?;
    }
    scope
        .session()
        .trigger_input(setup.trigger_input)?
        .set_enabled(true)?;
    scope.set_record_length(pulse.len() as u64)?;

    let mut sum_ch1 = 0.0;
    let mut sum_ch2 = 0.0;
    for run in 0..setup.runs {
        let (ch1, ch2) = measure_pair(gen, scope)?;
        sum_ch1 += intersample_peak(&ch1).unwrap_or_default();
        sum_ch2 += intersample_peak(&ch2).unwrap_or_default();
        if run % 500 == 0 {
            log::debug!("Sync offset run {run} of {}", setup.runs);
        }
    }
    let runs = setup.runs.max(1) as f64;
    Ok(((sum_ch1 - sum_ch2) / runs * 100.0).round() / 100.0)
}

/// Measure the delay of channel 2 against channel 1 in samples, at the
/// scope's current sample frequency.
///
/// Both channels must be wired to the generator output with cables of equal
/// length. Generator and scope settings touched here are restored
/// afterwards, except for the arbitrary waveform, which cannot be read back.
/// The result is rounded to two decimals.
#[tracing::instrument(skip_all, fields(runs = setup.runs))]
pub fn calculate_sync_offset(
    gen: &mut Generator,
    scope: &mut Oscilloscope,
    setup: &SyncOffsetSetup,
) -> Result<f64> {
    let sample_frequency = scope.sample_frequency()?;
    let pulse = calibration_pulse(sample_frequency);
    let saved = SavedSettings::save(gen, scope, setup.trigger_input)?;

    let result = run_sync_offset(gen, scope, setup, &pulse, sample_frequency);

    saved.restore(gen, scope, setup.trigger_input)?;
    let offset = result?;
    log::debug!("Sync offset at {sample_frequency} Hz: {offset}");
    Ok(offset)
}

/// One record of [`measure_jitter_free`].
#[derive(Debug, Clone, PartialEq)]
pub struct JitterFreeRecord {
    pub ch1: Vec<f32>,
    pub ch2: Vec<f32>,
    /// `ch2` realigned to the generated signal.
    pub jitter_free: Vec<f32>,
}

/// Take `runs` records of channels 1 and 2 and realign each channel 2 record.
///
/// `gen_signal` is the waveform loaded into the generator; `sync_offset`
/// comes from a [`SyncOffsetTable`].
#[tracing::instrument(skip(gen, scope, gen_signal))]
pub fn measure_jitter_free(
    gen: &mut Generator,
    scope: &mut Oscilloscope,
    gen_signal: &[f32],
    sync_offset: f64,
    runs: usize,
    pause: Duration,
) -> Result<Vec<JitterFreeRecord>> {
    let reference_peak = intersample_peak(gen_signal).unwrap_or_default();
    let mut records = Vec::with_capacity(runs);
    for _ in 0..runs {
        let (ch1, ch2) = measure_pair(gen, scope)?;
        let shift = reference_peak - intersample_peak(&ch1).unwrap_or_default() + sync_offset;
        let jitter_free = shift_samples(&ch2, shift);
        records.push(JitterFreeRecord {
            ch1,
            ch2,
            jitter_free,
        });
        thread::sleep(pause);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::locator::DeviceLocator;
    use crate::sdk::simulated::{SimulatedDevice, SimulatedSdk};
    use std::sync::Arc;

    fn triangle(len: usize, peak: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let distance = (i as f32 - peak as f32).abs();
                (1.0 - distance / 4.0).max(0.0)
            })
            .collect()
    }

    fn open() -> (Arc<SimulatedSdk>, Generator, Oscilloscope) {
        let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope(
            "Handyscope HS5-540XMS",
            29_000,
        )
        .with_trigger_inputs(4)]));
        let config = SessionConfig::default().with_poll_interval(Duration::from_millis(1));
        let locator = DeviceLocator::new(sdk.clone()).with_config(config);
        let gen = Generator::open(&locator, "HS5").unwrap();
        let scope = Oscilloscope::open(&locator, "HS5").unwrap();
        (sdk, gen, scope)
    }

    #[test]
    fn test_intersample_peak() {
        assert_eq!(intersample_peak(&[0.0, 0.5, 1.0, 0.5, 0.0]), Some(2.0));
        // neighbours 0.5 and 1.0 around a peak of 1.5 pull it towards the right
        let peak = intersample_peak(&[0.0, 0.5, 1.5, 1.0, 0.0]).unwrap();
        assert!((peak - 2.166_666).abs() < 1e-5, "{peak}");
        // magnitude counts
        assert_eq!(intersample_peak(&[0.0, -0.5, -2.0, -0.5]), Some(2.0));
        assert_eq!(intersample_peak(&[]), None);
        assert_eq!(intersample_peak(&[3.0, 1.0]), Some(0.0));
    }

    #[test]
    fn test_shift_samples() {
        let samples = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(shift_samples(&samples, 0.5), vec![0.5, 1.5, 2.5, 3.0]);
        assert_eq!(shift_samples(&samples, -1.0), vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_calibration_pulse() {
        let pulse = calibration_pulse(100e6);
        assert!(pulse.len() > 400 && pulse.len() < 420, "{}", pulse.len());
        let peak = intersample_peak(&pulse).unwrap();
        assert!((peak - pulse.len() as f64 / 2.0).abs() < 2.0);
    }

    #[test]
    fn test_table_round_trip_through_file() {
        let mut table = SyncOffsetTable::new();
        table.insert(29_000, 1e8, 0.37);
        table.insert(29_000, 5e8, -0.12);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_offsets.json");
        table.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"100000000.0\": 0.37"), "{text}");
        let loaded = SyncOffsetTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.get(29_000, 5e8), Some(-0.12));
        assert!(matches!(
            loaded.offset(1, 1e8),
            Err(HandyscopeError::SyncOffsetUnknown { serial: 1, .. })
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let table = SyncOffsetTable::load_or_default(dir.path().join("missing.json")).unwrap();
        assert_eq!(table, SyncOffsetTable::default());
    }

    #[test]
    fn test_calculate_sync_offset_restores_settings() {
        let (sdk, mut gen, mut scope) = open();
        scope.set_sample_frequency(100e6).unwrap();
        let len = calibration_pulse(100e6).len();
        sdk.set_waveform(0, triangle(len, 200));
        sdk.set_waveform(1, triangle(len, 197));

        let setup = SyncOffsetSetup {
            runs: 3,
            trigger_input: 3,
        };
        let offset = calculate_sync_offset(&mut gen, &mut scope, &setup).unwrap();
        assert_eq!(offset, 3.0);

        assert_eq!(gen.signal_type().unwrap(), "sine");
        assert_eq!(gen.mode().unwrap(), "continuous");
        assert!(!gen.is_output_on().unwrap());
        assert_eq!(scope.record_length().unwrap(), 5000);
        assert!(!scope.channel(1).unwrap().is_enabled().unwrap());
        assert_eq!(scope.channel(0).unwrap().range().unwrap(), 8.0);
    }

    #[test]
    fn test_measure_jitter_free() {
        let (sdk, mut gen, mut scope) = open();
        scope.set_record_length(64).unwrap();
        scope.channel(1).unwrap().set_enabled(true).unwrap();
        sdk.set_waveform(0, triangle(64, 30));
        sdk.set_waveform(1, triangle(64, 40));
        let gen_signal = triangle(64, 32);

        let records =
            measure_jitter_free(&mut gen, &mut scope, &gen_signal, 0.0, 2, Duration::ZERO)
                .unwrap();
        assert_eq!(records.len(), 2);
        let record = &records[0];
        assert_eq!(record.ch2.len(), 64);
        // shift of 2 samples moves the channel 2 peak from 40 to 38
        assert_eq!(intersample_peak(&record.jitter_free), Some(38.0));
    }
}
