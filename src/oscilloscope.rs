//! Oscilloscope sessions, their channels and the data they acquire.

use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Instant;

use polars::prelude::*;

use crate::error::{HandyscopeError, Result};
use crate::locator::DeviceLocator;
use crate::registry::Domain;
use crate::sdk::{
    each_raw, Action, BoolProperty, FloatProperty, IntProperty, ListProperty, RawSamples,
};
use crate::session::DeviceSession;

/// Hold-off value that makes the device wait for all pre samples before it
/// accepts a trigger.
pub const TRIG_HOLDOFF_ALL_PRE_SAMPLES: u64 = u64::MAX;

const TIME_COLUMN_NAME: &str = "time";

/// Where the scope is in its acquisition cycle, as far as this session has
/// observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    /// Started, waiting for a trigger.
    Armed,
    /// Triggered, collecting post samples.
    Acquiring,
}

/// Samples of one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub sample_frequency: f64,
    /// Samples before the trigger point. Zero in stream mode.
    pub pre_samples: usize,
    /// One entry per channel up to the highest retrieved one; `None` for
    /// channels that were not retrieved.
    pub channels: Vec<Option<Vec<f32>>>,
}

impl Measurement {
    pub fn sample_count(&self) -> usize {
        self.channels
            .iter()
            .flatten()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index)?.as_deref()
    }

    /// Sample times in seconds, zero at the trigger point.
    pub fn time(&self) -> Vec<f64> {
        let pre = self.pre_samples as f64;
        (0..self.sample_count())
            .map(|i| (i as f64 - pre) / self.sample_frequency)
            .collect()
    }

    /// A `time` column followed by one `chN` column (1-based, as printed on
    /// the device) per retrieved channel.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        #[cfg(feature = "cpu-profiling")]
        let _span = tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!("to_dataframe"), 0));

        let columns: Vec<Column> = self
            .channels
            .iter()
            .enumerate()
            .filter_map(|(index, samples)| {
                let samples = samples.as_ref()?;
                Some(Series::new(channel_column(index).into(), samples.as_slice()).into())
            })
            .collect();
        with_time_column(columns, self.pre_samples, self.sample_frequency)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }
}

/// An oscilloscope channel, borrowed from the scope's session.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    session: &'a DeviceSession,
    index: u16,
}

impl Channel<'_> {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn is_available(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ChIsAvailable(self.index))
    }

    pub fn connector_type(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ChConnectorType(self.index), Domain::ConnectorType)
    }

    pub fn is_differential(&self) -> Result<bool> {
        self.session
            .get_bool(BoolProperty::ChIsDifferential(self.index))
    }

    /// Input impedance in ohm.
    pub fn impedance(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ChImpedance(self.index))
    }

    pub fn couplings(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ChCouplings(self.index), Domain::Coupling)
    }

    pub fn coupling(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ChCoupling(self.index), Domain::Coupling)
    }

    pub fn set_coupling(&self, coupling: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::ChCoupling(self.index), Domain::Coupling, coupling)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ChEnabled(self.index))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::ChEnabled(self.index), enabled)
    }

    pub fn probe_gain(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ChProbeGain(self.index))
    }

    pub fn set_probe_gain(&self, gain: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ChProbeGain(self.index), gain)
    }

    pub fn probe_offset(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ChProbeOffset(self.index))
    }

    pub fn set_probe_offset(&self, offset: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ChProbeOffset(self.index), offset)
    }

    pub fn is_auto_ranging(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ChAutoRanging(self.index))
    }

    pub fn set_auto_ranging(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::ChAutoRanging(self.index), enabled)
    }

    pub fn ranges(&self) -> Result<Vec<f64>> {
        self.session.get_list(ListProperty::ChRanges(self.index))
    }

    pub fn range(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ChRange(self.index))
    }

    /// The device picks the smallest range that covers `range`.
    pub fn set_range(&self, range: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ChRange(self.index), range)
    }

    pub fn data_value_min(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ChDataValueMin(self.index))
    }

    pub fn data_value_max(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ChDataValueMax(self.index))
    }

    /// Type raw samples of this channel come in, e.g. "uint16".
    pub fn raw_data_type(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ChDataRawType(self.index), Domain::RawDataType)
    }

    /// Raw values for the bottom of the range, zero volt and the top of the
    /// range.
    pub fn raw_data_range(&self) -> Result<(i64, i64, i64)> {
        let index = self.index;
        self.session
            .call(|sdk, handle| sdk.raw_value_range(handle, index))
    }

    pub fn raw_value_min(&self) -> Result<i64> {
        Ok(self.raw_data_range()?.0)
    }

    /// Raw value of zero volt.
    pub fn raw_value_zero(&self) -> Result<i64> {
        Ok(self.raw_data_range()?.1)
    }

    pub fn raw_value_max(&self) -> Result<i64> {
        Ok(self.raw_data_range()?.2)
    }

    pub fn has_trigger(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ChHasTrigger(self.index))
    }

    pub fn is_trigger_enabled(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ChTrEnabled(self.index))
    }

    pub fn set_trigger_enabled(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::ChTrEnabled(self.index), enabled)
    }

    pub fn trigger_kinds(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ChTrKinds(self.index), Domain::TriggerKind)
    }

    pub fn trigger_kind(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ChTrKind(self.index), Domain::TriggerKind)
    }

    pub fn set_trigger_kind(&self, kind: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::ChTrKind(self.index), Domain::TriggerKind, kind)
    }

    pub fn trigger_level_modes(&self) -> Result<Vec<&'static str>> {
        self.session.get_labels(
            IntProperty::ChTrLevelModes(self.index),
            Domain::TriggerLevelMode,
        )
    }

    pub fn trigger_level_mode(&self) -> Result<&'static str> {
        self.session.get_label(
            IntProperty::ChTrLevelMode(self.index),
            Domain::TriggerLevelMode,
        )
    }

    pub fn set_trigger_level_mode(&self, mode: &str) -> Result<&'static str> {
        self.session.set_label(
            IntProperty::ChTrLevelMode(self.index),
            Domain::TriggerLevelMode,
            mode,
        )
    }

    pub fn trigger_level_count(&self) -> Result<u32> {
        Ok(self
            .session
            .get_int(IntProperty::ChTrLevelCount(self.index))? as u32)
    }

    /// All trigger levels; window kinds use two.
    pub fn trigger_levels(&self) -> Result<Vec<f64>> {
        (0..self.trigger_level_count()?)
            .map(|i| self.session.get_float(FloatProperty::ChTrLevel(self.index, i)))
            .collect()
    }

    /// Set levels from the first on; returns what the device applied.
    pub fn set_trigger_levels(&self, levels: &[f64]) -> Result<Vec<f64>> {
        self.set_indexed(levels, FloatProperty::ChTrLevel)
    }

    pub fn trigger_hysteresis_count(&self) -> Result<u32> {
        Ok(self
            .session
            .get_int(IntProperty::ChTrHysteresisCount(self.index))? as u32)
    }

    pub fn trigger_hystereses(&self) -> Result<Vec<f64>> {
        (0..self.trigger_hysteresis_count()?)
            .map(|i| {
                self.session
                    .get_float(FloatProperty::ChTrHysteresis(self.index, i))
            })
            .collect()
    }

    pub fn set_trigger_hystereses(&self, hystereses: &[f64]) -> Result<Vec<f64>> {
        self.set_indexed(hystereses, FloatProperty::ChTrHysteresis)
    }

    pub fn trigger_conditions(&self) -> Result<Vec<&'static str>> {
        self.session.get_labels(
            IntProperty::ChTrConditions(self.index),
            Domain::TriggerCondition,
        )
    }

    pub fn trigger_condition(&self) -> Result<&'static str> {
        self.session.get_label(
            IntProperty::ChTrCondition(self.index),
            Domain::TriggerCondition,
        )
    }

    pub fn set_trigger_condition(&self, condition: &str) -> Result<&'static str> {
        self.session.set_label(
            IntProperty::ChTrCondition(self.index),
            Domain::TriggerCondition,
            condition,
        )
    }

    pub fn trigger_time_count(&self) -> Result<u32> {
        Ok(self
            .session
            .get_int(IntProperty::ChTrTimeCount(self.index))? as u32)
    }

    /// Trigger times in seconds, used by the pulse width kinds and conditions.
    pub fn trigger_times(&self) -> Result<Vec<f64>> {
        (0..self.trigger_time_count()?)
            .map(|i| self.session.get_float(FloatProperty::ChTrTime(self.index, i)))
            .collect()
    }

    pub fn set_trigger_times(&self, times: &[f64]) -> Result<Vec<f64>> {
        self.set_indexed(times, FloatProperty::ChTrTime)
    }

    pub fn has_connection_test(&self) -> Result<bool> {
        self.session
            .get_bool(BoolProperty::ChHasConnectionTest(self.index))
    }

    fn set_indexed(
        &self,
        values: &[f64],
        property: fn(u16, u32) -> FloatProperty,
    ) -> Result<Vec<f64>> {
        values
            .iter()
            .zip(0u32..)
            .map(|(value, i)| self.session.set_float(property(self.index, i), *value))
            .collect()
    }
}

/// Samples of one acquisition in the device's own sample type, before the
/// conversion to volts.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub sample_frequency: f64,
    pub pre_samples: usize,
    pub channels: Vec<Option<RawSamples>>,
}

impl RawMeasurement {
    pub fn sample_count(&self) -> usize {
        self.channels
            .iter()
            .flatten()
            .map(RawSamples::len)
            .max()
            .unwrap_or(0)
    }

    pub fn channel(&self, index: usize) -> Option<&RawSamples> {
        self.channels.get(index)?.as_ref()
    }

    /// Like [`Measurement::to_dataframe`], with each channel column in its raw
    /// type.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .channels
            .iter()
            .enumerate()
            .filter_map(|(index, samples)| {
                let name = channel_column(index);
                let series = each_raw!(samples.as_ref()?, values => {
                    Series::new(name.into(), values.as_slice())
                });
                Some(series.into())
            })
            .collect();
        with_time_column(columns, self.pre_samples, self.sample_frequency)
    }
}

fn channel_column(index: usize) -> String {
    format!("ch{}", index + 1)
}

/// Prepend a `time` column, zero at the trigger point, to the channel columns.
fn with_time_column(
    columns: Vec<Column>,
    pre_samples: usize,
    sample_frequency: f64,
) -> Result<DataFrame> {
    let mut names = vec![col(TIME_COLUMN_NAME)];
    names.extend(columns.iter().map(|column| col(column.name().as_str())));
    let df = DataFrame::new(columns)?
        .lazy()
        .with_row_index("row_index", Some(0))
        .with_columns([((col("row_index").cast(DataType::Float64)
            - lit(pre_samples as f64))
            * lit(1.0 / sample_frequency))
        .alias(TIME_COLUMN_NAME)])
        .select(names)
        .collect()?;
    Ok(df)
}

/// An open oscilloscope.
#[derive(Debug)]
pub struct Oscilloscope {
    session: DeviceSession,
    state: ScopeState,
}

impl Oscilloscope {
    /// Open the first oscilloscope whose product name contains `name`.
    pub fn open(locator: &DeviceLocator, name: &str) -> Result<Self> {
        locator.open_oscilloscope(name)
    }

    pub(crate) fn new(session: DeviceSession) -> Self {
        Self {
            session,
            state: ScopeState::Idle,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn close(&mut self) -> Result<()> {
        self.state = ScopeState::Idle;
        self.session.close()
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn channel_count(&self) -> Result<u16> {
        Ok(self.session.get_int(IntProperty::ScpChannelCount)? as u16)
    }

    pub fn channel(&self, index: u16) -> Result<Channel<'_>> {
        let count = self.channel_count()?;
        if index >= count {
            return Err(HandyscopeError::InvalidChannel {
                index: usize::from(index),
                count: usize::from(count),
            });
        }
        Ok(Channel {
            session: &self.session,
            index,
        })
    }

    pub fn channels(&self) -> Result<Vec<Channel<'_>>> {
        let count = self.channel_count()?;
        Ok((0..count)
            .map(|index| Channel {
                session: &self.session,
                index,
            })
            .collect())
    }

    pub fn measure_modes(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ScpMeasureModes, Domain::MeasureMode)
    }

    pub fn measure_mode(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ScpMeasureMode, Domain::MeasureMode)
    }

    pub fn set_measure_mode(&self, mode: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::ScpMeasureMode, Domain::MeasureMode, mode)
    }

    /// Supported resolutions in bits.
    pub fn resolutions(&self) -> Result<Vec<u8>> {
        self.session.call(|sdk, handle| sdk.resolutions(handle))
    }

    pub fn resolution(&self) -> Result<u8> {
        Ok(self.session.get_int(IntProperty::ScpResolution)? as u8)
    }

    pub fn set_resolution(&self, bits: u8) -> Result<u8> {
        Ok(self
            .session
            .set_int(IntProperty::ScpResolution, u64::from(bits))? as u8)
    }

    pub fn is_resolution_enhanced(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsResolutionEnhanced)
    }

    pub fn auto_resolution_modes(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ScpAutoResolutionModes, Domain::AutoResolution)
    }

    pub fn auto_resolution_mode(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ScpAutoResolutionMode, Domain::AutoResolution)
    }

    pub fn set_auto_resolution_mode(&self, mode: &str) -> Result<&'static str> {
        self.session.set_label(
            IntProperty::ScpAutoResolutionMode,
            Domain::AutoResolution,
            mode,
        )
    }

    pub fn clock_sources(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ScpClockSources, Domain::ClockSource)
    }

    pub fn clock_source(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ScpClockSource, Domain::ClockSource)
    }

    pub fn set_clock_source(&self, source: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::ScpClockSource, Domain::ClockSource, source)
    }

    pub fn clock_source_frequencies(&self) -> Result<Vec<f64>> {
        self.session
            .get_list(ListProperty::ScpClockSourceFrequencies)
    }

    pub fn clock_source_frequency(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ScpClockSourceFrequency)
    }

    pub fn set_clock_source_frequency(&self, frequency: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ScpClockSourceFrequency, frequency)
    }

    pub fn clock_outputs(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::ScpClockOutputs, Domain::ClockOutput)
    }

    pub fn clock_output(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::ScpClockOutput, Domain::ClockOutput)
    }

    pub fn set_clock_output(&self, output: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::ScpClockOutput, Domain::ClockOutput, output)
    }

    pub fn clock_output_frequencies(&self) -> Result<Vec<f64>> {
        self.session
            .get_list(ListProperty::ScpClockOutputFrequencies)
    }

    pub fn clock_output_frequency(&self) -> Result<f64> {
        self.session
            .get_float(FloatProperty::ScpClockOutputFrequency)
    }

    pub fn set_clock_output_frequency(&self, frequency: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ScpClockOutputFrequency, frequency)
    }

    pub fn sample_frequency_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpSampleFrequencyMax)
    }

    /// Sample frequency in Hz.
    pub fn sample_frequency(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpSampleFrequency)
    }

    pub fn set_sample_frequency(&self, frequency: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ScpSampleFrequency, frequency)
    }

    pub fn verify_sample_frequency(&self, frequency: f64) -> Result<f64> {
        self.session
            .verify_float(FloatProperty::ScpSampleFrequency, frequency)
    }

    pub fn record_length_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpRecordLengthMax)
    }

    pub fn record_length(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpRecordLength)
    }

    pub fn set_record_length(&self, length: u64) -> Result<u64> {
        self.session.set_int(IntProperty::ScpRecordLength, length)
    }

    pub fn verify_record_length(&self, length: u64) -> Result<u64> {
        self.session.verify_int(IntProperty::ScpRecordLength, length)
    }

    /// Share of the record taken before the trigger, 0 to 1.
    pub fn pre_sample_ratio(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpPreSampleRatio)
    }

    pub fn set_pre_sample_ratio(&self, ratio: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ScpPreSampleRatio, ratio)
    }

    pub fn segment_count_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpSegmentCountMax)
    }

    pub fn segment_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpSegmentCount)
    }

    pub fn set_segment_count(&self, count: u64) -> Result<u64> {
        self.session.set_int(IntProperty::ScpSegmentCount, count)
    }

    pub fn verify_segment_count(&self, count: u64) -> Result<u64> {
        self.session.verify_int(IntProperty::ScpSegmentCount, count)
    }

    pub fn has_trigger(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpHasTrigger)
    }

    /// Seconds to wait for a trigger before triggering anyway; negative waits forever.
    pub fn trigger_timeout(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpTriggerTimeOut)
    }

    pub fn set_trigger_timeout(&self, timeout: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::ScpTriggerTimeOut, timeout)
    }

    pub fn verify_trigger_timeout(&self, timeout: f64) -> Result<f64> {
        self.session
            .verify_float(FloatProperty::ScpTriggerTimeOut, timeout)
    }

    pub fn has_trigger_delay(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpHasTriggerDelay)
    }

    pub fn trigger_delay_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpTriggerDelayMax)
    }

    pub fn trigger_delay(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::ScpTriggerDelay)
    }

    pub fn set_trigger_delay(&self, delay: f64) -> Result<f64> {
        self.session.set_float(FloatProperty::ScpTriggerDelay, delay)
    }

    pub fn verify_trigger_delay(&self, delay: f64) -> Result<f64> {
        self.session
            .verify_float(FloatProperty::ScpTriggerDelay, delay)
    }

    pub fn has_trigger_holdoff(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpHasTriggerHoldOff)
    }

    pub fn trigger_holdoff_count_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpTriggerHoldOffCountMax)
    }

    /// Samples recorded after a start before a trigger is accepted.
    pub fn trigger_holdoff_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpTriggerHoldOffCount)
    }

    /// Use [`TRIG_HOLDOFF_ALL_PRE_SAMPLES`] to always collect the full pre-trigger part.
    pub fn set_trigger_holdoff_count(&self, count: u64) -> Result<u64> {
        self.session
            .set_int(IntProperty::ScpTriggerHoldOffCount, count)
    }

    pub fn is_running(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsRunning)
    }

    pub fn is_triggered(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsTriggered)
    }

    pub fn is_timeout_triggered(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsTimeoutTriggered)
    }

    pub fn is_force_triggered(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsForceTriggered)
    }

    pub fn is_data_ready(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsDataReady)
    }

    pub fn is_data_overflow(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpIsDataOverflow)
    }

    /// Pre samples actually recorded in the last block measurement.
    pub fn valid_pre_sample_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::ScpValidPreSampleCount)
    }

    pub fn start(&mut self) -> Result<bool> {
        let started = self.session.action(Action::ScpStart)?;
        if started {
            self.state = ScopeState::Armed;
        }
        Ok(started)
    }

    /// The state only returns to idle once the device accepted the stop.
    pub fn stop(&mut self) -> Result<bool> {
        let stopped = self.session.action(Action::ScpStop)?;
        self.state = ScopeState::Idle;
        Ok(stopped)
    }

    pub fn force_trigger(&self) -> Result<bool> {
        self.session.action(Action::ScpForceTrigger)
    }

    /// Check the device once and advance [`ScopeState`]. Returns whether data is ready.
    pub fn poll(&mut self) -> Result<bool> {
        let ready = self.is_data_ready()?;
        if ready {
            self.state = ScopeState::Idle;
        } else if self.state == ScopeState::Armed && self.is_triggered()? {
            log::debug!("Triggered");
            self.state = ScopeState::Acquiring;
        }
        Ok(ready)
    }

    /// Poll until data is ready. Stops the acquisition and fails once the
    /// session's `measure_timeout` has passed.
    pub fn wait_for_data(&mut self) -> Result<()> {
        let config = self.session.config().clone();
        let started = Instant::now();
        while !self.poll()? {
            if started.elapsed() >= config.measure_timeout {
                log::debug!("No data after {:?}, stopping", config.measure_timeout);
                self.stop()?;
                return Err(HandyscopeError::MeasurementTimeout {
                    timeout: config.measure_timeout,
                });
            }
            thread::sleep(config.poll_interval);
        }
        Ok(())
    }

    /// First sample to read and number of samples holding valid data.
    fn sample_counts(&self) -> Result<(u64, u64)> {
        let record_length = self.record_length()?;
        if self.measure_mode()? != "block" {
            return Ok((0, record_length));
        }
        let post = ((1.0 - self.pre_sample_ratio()?) * record_length as f64).round() as u64;
        let valid = (post + self.valid_pre_sample_count()?).min(record_length);
        Ok((record_length - valid, valid))
    }

    /// Read mask for `channels`, up to the highest of them. Empty means every
    /// enabled channel.
    fn channel_mask(&self, channels: &[u16]) -> Result<Vec<bool>> {
        let wanted: Vec<u16> = if channels.is_empty() {
            let mut enabled = Vec::new();
            for channel in self.channels()? {
                if channel.is_enabled()? {
                    enabled.push(channel.index());
                }
            }
            enabled
        } else {
            for index in channels {
                if !self.channel(*index)?.is_enabled()? {
                    return Err(HandyscopeError::ChannelNotEnabled(usize::from(*index)));
                }
            }
            channels.to_vec()
        };
        let Some(highest) = wanted.iter().max() else {
            return Err(HandyscopeError::NoChannelEnabled);
        };
        Ok((0..=*highest).map(|i| wanted.contains(&i)).collect())
    }

    /// Samples before the trigger point in a read starting at `start`.
    fn pre_samples(&self, start: u64) -> Result<usize> {
        if self.measure_mode()? != "block" {
            return Ok(0);
        }
        let pre = (self.pre_sample_ratio()? * self.record_length()? as f64).round() as u64;
        Ok(pre.saturating_sub(start) as usize)
    }

    /// Read the samples of the last acquisition.
    ///
    /// With `channels` empty every enabled channel is read. Channels are
    /// zero based.
    pub fn retrieve(&self, channels: &[u16]) -> Result<Measurement> {
        let mask = self.channel_mask(channels)?;
        let (start, length) = self.sample_counts()?;
        log::debug!("Reading {length} samples from {start} on channels {mask:?}");
        let data = self
            .session
            .call(|sdk, handle| sdk.get_data(handle, &mask, start, length))?;
        Ok(Measurement {
            sample_frequency: self.sample_frequency()?,
            pre_samples: self.pre_samples(start)?,
            channels: data,
        })
    }

    /// [`Self::retrieve`] without the conversion to volts. Each channel comes
    /// in its [`Channel::raw_data_type`]; [`Channel::raw_data_range`] maps the
    /// values back onto the range.
    pub fn retrieve_raw(&self, channels: &[u16]) -> Result<RawMeasurement> {
        let mask = self.channel_mask(channels)?;
        let (start, length) = self.sample_counts()?;
        log::debug!("Reading {length} raw samples from {start} on channels {mask:?}");
        let data = self
            .session
            .call(|sdk, handle| sdk.get_data_raw(handle, &mask, start, length))?;
        Ok(RawMeasurement {
            sample_frequency: self.sample_frequency()?,
            pre_samples: self.pre_samples(start)?,
            channels: data,
        })
    }

    /// Start, wait for data and read every enabled channel.
    ///
    /// Blocks for at most the session's `measure_timeout`; on timeout the
    /// acquisition is stopped. With pre samples in block mode, an incomplete
    /// pre-trigger part fails the measurement when the session is `safe` and
    /// the device has a hold-off, and is logged otherwise.
    #[tracing::instrument(skip(self), fields(device = %self.session.product_name()))]
    pub fn measure(&mut self) -> Result<Measurement> {
        #[cfg(feature = "cpu-profiling")]
        let _span = tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!("measure"), 0));

        let config = self.session.config().clone();
        let block = self.measure_mode()? == "block";
        let ratio = self.pre_sample_ratio()?;
        let holdoff_available = block && ratio > 0.0 && self.has_trigger_holdoff()?;

        if holdoff_available {
            let wanted = ratio * self.record_length()? as f64;
            if (self.trigger_holdoff_count()? as f64) < wanted {
                log::warn!(
                    "Trigger hold-off does not cover all pre samples, the record may come out \
                     short. Set it to TRIG_HOLDOFF_ALL_PRE_SAMPLES for a predictable time base"
                );
            }
        }

        self.start()?;
        self.wait_for_data()?;

        if block && ratio > 0.0 {
            let expected = (ratio * self.record_length()? as f64).round() as u64;
            let valid = self.valid_pre_sample_count()?;
            if valid < expected {
                if config.safe && holdoff_available {
                    return Err(HandyscopeError::IncompletePreSamples { valid, expected });
                }
                log::warn!("Only {valid} of {expected} pre samples are valid");
            }
        }

        self.retrieve(&[])
    }

    /// Sample times of a full record in seconds, zero at the trigger point
    /// in block mode.
    pub fn time_vector(&self) -> Result<Vec<f64>> {
        let record_length = self.record_length()? as usize;
        let period = 1.0 / self.sample_frequency()?;
        let shift = if self.measure_mode()? == "block" {
            (self.pre_sample_ratio()? * record_length as f64) as usize
        } else {
            0
        };
        Ok((0..record_length)
            .map(|i| (i as f64 - shift as f64) * period)
            .collect())
    }

    pub fn has_connection_test(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::ScpHasConnectionTest)
    }

    pub fn start_connection_test(&self) -> Result<bool> {
        self.session.action(Action::ScpStartConnectionTest)
    }

    pub fn is_connection_test_completed(&self) -> Result<bool> {
        self.session
            .get_bool(BoolProperty::ScpIsConnectionTestCompleted)
    }

    /// Connection state label per channel.
    pub fn connection_test_data(&self) -> Result<Vec<&'static str>> {
        let count = self.channel_count()?;
        let states = self
            .session
            .call(|sdk, handle| sdk.connection_test_data(handle, count))?;
        states
            .into_iter()
            .map(|state| crate::registry::label_for(Domain::ConnectionState, u64::from(state)))
            .collect()
    }

    /// Run a connection test and wait for its result.
    ///
    /// `None` if the device has no connection test.
    #[tracing::instrument(skip(self), fields(device = %self.session.product_name()))]
    pub fn test_connection(&mut self) -> Result<Option<Vec<&'static str>>> {
        if !self.has_connection_test()? {
            return Ok(None);
        }
        if !self.start_connection_test()? {
            return Err(HandyscopeError::ConnectionTestFailed);
        }
        let config = self.session.config().clone();
        let started = Instant::now();
        while !self.is_connection_test_completed()? {
            if started.elapsed() >= config.connection_test_timeout {
                return Err(HandyscopeError::MeasurementTimeout {
                    timeout: config.connection_test_timeout,
                });
            }
            thread::sleep(config.poll_interval);
        }
        self.connection_test_data().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::sdk::simulated::{SimCall, SimulatedDevice, SimulatedSdk};
    use crate::status::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;

    fn open() -> (Arc<SimulatedSdk>, Oscilloscope) {
        let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope(
            "Handyscope HS5-540XMS",
            29_000,
        )]));
        let config = SessionConfig::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_measure_timeout(Duration::from_millis(50));
        let locator = DeviceLocator::new(sdk.clone()).with_config(config);
        let scope = Oscilloscope::open(&locator, "HS5").unwrap();
        (sdk, scope)
    }

    #[test]
    fn test_measure_mode_labels() {
        let (_sdk, scope) = open();
        assert_eq!(scope.measure_modes().unwrap(), vec!["stream", "block"]);
        assert_eq!(scope.measure_mode().unwrap(), "block");
        assert_eq!(scope.set_measure_mode("stream").unwrap(), "stream");
        assert_eq!(scope.measure_mode().unwrap(), "stream");
    }

    #[test]
    fn test_channel_out_of_range() {
        let (_sdk, scope) = open();
        assert!(matches!(
            scope.channel(2),
            Err(HandyscopeError::InvalidChannel { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_channel_settings() {
        let (_sdk, scope) = open();
        let ch = scope.channel(1).unwrap();
        assert_eq!(ch.set_range(3.0).unwrap(), 4.0);
        assert_eq!(ch.data_value_max().unwrap(), 4.0);
        assert_eq!(ch.couplings().unwrap(), vec!["DCV", "ACV"]);
        assert_eq!(ch.set_coupling("ACV").unwrap(), "ACV");
        assert_eq!(ch.connector_type().unwrap(), "BNC");
        assert_eq!(ch.set_probe_gain(10.0).unwrap(), 10.0);
    }

    #[test]
    fn test_window_trigger_uses_two_levels() {
        let (_sdk, scope) = open();
        let ch = scope.channel(0).unwrap();
        assert_eq!(ch.trigger_levels().unwrap().len(), 1);
        ch.set_trigger_kind("in window").unwrap();
        assert_eq!(ch.trigger_level_count().unwrap(), 2);
        let applied = ch.set_trigger_levels(&[0.3, 1.4]).unwrap();
        assert_eq!(applied, vec![0.3, 1.0]);
        assert_eq!(ch.trigger_levels().unwrap(), vec![0.3, 1.0]);
    }

    #[test]
    fn test_measure_cycles_states() {
        let (_sdk, mut scope) = open();
        scope.set_record_length(1000).unwrap();
        assert_eq!(scope.state(), ScopeState::Idle);
        scope.start().unwrap();
        assert_eq!(scope.state(), ScopeState::Armed);
        assert!(!scope.poll().unwrap());
        assert_eq!(scope.state(), ScopeState::Acquiring);
        assert!(scope.poll().unwrap());
        assert_eq!(scope.state(), ScopeState::Idle);
    }

    #[test]
    fn test_failed_stop_keeps_state() {
        let (sdk, mut scope) = open();
        scope.start().unwrap();
        sdk.fail_when(StatusCode::NOT_AVAILABLE, |call| {
            matches!(call, SimCall::Action(Action::ScpStop))
        });
        assert!(matches!(
            scope.stop(),
            Err(HandyscopeError::NativeCall {
                status: StatusCode::NOT_AVAILABLE,
                ..
            })
        ));
        assert_eq!(scope.state(), ScopeState::Armed);

        scope.stop().unwrap();
        assert_eq!(scope.state(), ScopeState::Idle);
    }

    #[test]
    fn test_measure_reads_enabled_channels() {
        let (_sdk, mut scope) = open();
        scope.set_record_length(1000).unwrap();
        scope.channel(1).unwrap().set_enabled(true).unwrap();
        let measurement = scope.measure().unwrap();
        assert_eq!(measurement.channels.len(), 2);
        assert_eq!(measurement.channel(0).unwrap().len(), 1000);
        assert_eq!(measurement.channel(1).unwrap().len(), 1000);
        assert_eq!(scope.state(), ScopeState::Idle);
    }

    #[test]
    fn test_measure_timeout_stops() {
        let (sdk, mut scope) = open();
        sdk.set_data_ready_after(None);
        let err = scope.measure().unwrap_err();
        assert!(matches!(err, HandyscopeError::MeasurementTimeout { .. }));
        assert!(sdk.calls().contains(&SimCall::Action(Action::ScpStop)));
        assert_eq!(scope.state(), ScopeState::Idle);
        assert!(!scope.is_running().unwrap());
    }

    #[test]
    fn test_measure_safe_rejects_missing_pre_samples() {
        let (sdk, mut scope) = open();
        scope.set_record_length(1000).unwrap();
        scope.set_pre_sample_ratio(0.5).unwrap();
        let handle = scope.session().handle().unwrap();
        sdk.preset_int(handle, IntProperty::ScpValidPreSampleCount, 200);
        assert!(matches!(
            scope.measure(),
            Err(HandyscopeError::IncompletePreSamples {
                valid: 200,
                expected: 500
            })
        ));

        let config = scope.session().config().clone().with_safe(false);
        scope.session_mut().set_config(config);
        let measurement = scope.measure().unwrap();
        // 500 post samples plus the 200 valid pre samples
        assert_eq!(measurement.sample_count(), 700);
        assert_eq!(measurement.pre_samples, 200);
    }

    #[test]
    fn test_retrieve_preconditions() {
        let (_sdk, mut scope) = open();
        scope.measure().unwrap();
        assert!(matches!(
            scope.retrieve(&[1]),
            Err(HandyscopeError::ChannelNotEnabled(1))
        ));
        scope.channel(0).unwrap().set_enabled(false).unwrap();
        assert!(matches!(
            scope.retrieve(&[]),
            Err(HandyscopeError::NoChannelEnabled)
        ));
    }

    #[test]
    fn test_raw_channel_properties() {
        let (_sdk, scope) = open();
        let ch = scope.channel(0).unwrap();
        assert_eq!(ch.raw_data_type().unwrap(), "uint16");
        let (min, zero, max) = ch.raw_data_range().unwrap();
        assert_eq!(ch.raw_value_min().unwrap(), min);
        assert_eq!(ch.raw_value_zero().unwrap(), zero);
        assert_eq!(ch.raw_value_max().unwrap(), max);
        assert!(min >= 0);
        assert!(min <= zero && zero <= max);

        scope.set_resolution(8).unwrap();
        assert_eq!(ch.raw_data_type().unwrap(), "uint8");
        assert_eq!(ch.raw_data_range().unwrap(), (0, 128, 255));
    }

    #[test]
    fn test_retrieve_raw() {
        let (_sdk, mut scope) = open();
        scope.set_record_length(1000).unwrap();
        scope.set_pre_sample_ratio(0.25).unwrap();
        scope.channel(1).unwrap().set_enabled(true).unwrap();
        scope.measure().unwrap();

        let raw = scope.retrieve_raw(&[1]).unwrap();
        assert_eq!(raw.sample_count(), 1000);
        assert_eq!(raw.pre_samples, 250);
        assert!(raw.channel(0).is_none());
        assert_eq!(raw.channel(1).unwrap().data_type(), "uint16");
        assert_eq!(raw.channel(1).unwrap().to_f64().len(), 1000);
        let (min, _zero, max) = scope.channel(1).unwrap().raw_data_range().unwrap();
        let Some(RawSamples::UInt16(samples)) = raw.channel(1) else {
            panic!("expected uint16 samples");
        };
        assert!(samples
            .iter()
            .all(|s| (min..=max).contains(&i64::from(*s))));
        assert!(samples.iter().collect::<std::collections::HashSet<_>>().len() > 1);

        let df = raw.to_dataframe().unwrap();
        assert_eq!(df.height(), 1000);
        assert_eq!(df.column("ch2").unwrap().dtype(), &DataType::UInt16);
    }

    #[test]
    fn test_retrieve_raw_before_data_is_ready() {
        let (_sdk, scope) = open();
        assert!(matches!(
            scope.retrieve_raw(&[]),
            Err(HandyscopeError::NativeCall {
                status: StatusCode::UNSUCCESSFUL,
                ..
            })
        ));
    }

    #[test]
    fn test_time_vector() {
        let (_sdk, scope) = open();
        scope.set_record_length(4).unwrap();
        scope.set_sample_frequency(2.0).unwrap();
        assert_eq!(scope.time_vector().unwrap(), vec![0.0, 0.5, 1.0, 1.5]);
        scope.set_pre_sample_ratio(0.5).unwrap();
        assert_eq!(scope.time_vector().unwrap(), vec![-1.0, -0.5, 0.0, 0.5]);
        scope.set_measure_mode("stream").unwrap();
        assert_eq!(scope.time_vector().unwrap()[0], 0.0);
    }

    #[test]
    fn test_dataframe_columns() {
        let measurement = Measurement {
            sample_frequency: 10.0,
            pre_samples: 1,
            channels: vec![None, Some(vec![1.0, 2.0, 3.0])],
        };
        let df = measurement.to_dataframe().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, ["time", "ch2"]);
        let time: Vec<f64> = df
            .column("time")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(time, vec![-0.1, 0.0, 0.1]);
        assert_eq!(measurement.time(), time);
    }

    #[test]
    fn test_write_csv() {
        let measurement = Measurement {
            sample_frequency: 1.0,
            pre_samples: 0,
            channels: vec![Some(vec![0.5, 0.25])],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        measurement.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("time,ch1\n"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_connection_test() {
        let (_sdk, mut scope) = open();
        let states = scope.test_connection().unwrap().unwrap();
        assert_eq!(states, vec!["connected", "connected"]);
    }

    #[test]
    fn test_connection_test_refused() {
        let (sdk, mut scope) = open();
        let handle = scope.session().handle().unwrap();
        sdk.preset_bool(handle, BoolProperty::ScpHasConnectionTest, false);
        assert_eq!(scope.test_connection().unwrap(), None);

        sdk.preset_bool(handle, BoolProperty::ScpHasConnectionTest, true);
        sdk.fail_when(StatusCode::NOT_AVAILABLE, |call| {
            matches!(call, SimCall::Action(Action::ScpStartConnectionTest))
        });
        assert!(matches!(
            scope.test_connection(),
            Err(HandyscopeError::NativeCall { .. })
        ));
    }

    #[test]
    fn test_resolution() {
        let (_sdk, scope) = open();
        assert_eq!(scope.resolutions().unwrap(), vec![8, 12, 14, 16]);
        assert_eq!(scope.set_resolution(14).unwrap(), 14);
        assert!(scope.set_resolution(10).is_err());
    }
}
