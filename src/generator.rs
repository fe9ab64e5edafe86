//! Arbitrary waveform generator.

use crate::error::Result;
use crate::locator::DeviceLocator;
use crate::registry::Domain;
use crate::sdk::{Action, BoolProperty, FloatProperty, IntProperty, ListProperty};
use crate::session::DeviceSession;

#[derive(Debug)]
pub struct Generator {
    session: DeviceSession,
}

impl Generator {
    /// Open the first generator whose product name contains `name`.
    pub fn open(locator: &DeviceLocator, name: &str) -> Result<Self> {
        locator.open_generator(name)
    }

    pub(crate) fn new(session: DeviceSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }

    pub fn connector_type(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::GenConnectorType, Domain::ConnectorType)
    }

    pub fn is_differential(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::GenIsDifferential)
    }

    /// Output impedance in ohm.
    pub fn impedance(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenImpedance)
    }

    /// DAC resolution in bits.
    pub fn resolution(&self) -> Result<u8> {
        Ok(self.session.get_int(IntProperty::GenResolution)? as u8)
    }

    pub fn output_value_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenOutputValueMin)
    }

    pub fn output_value_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenOutputValueMax)
    }

    pub fn is_controllable(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::GenIsControllable)
    }

    /// Status flags currently set, e.g. `["running"]`.
    pub fn status(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::GenStatus, Domain::GeneratorStatus)
    }

    pub fn is_output_on(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::GenOutputOn)
    }

    pub fn set_output_on(&self, on: bool) -> Result<bool> {
        self.session.set_bool(BoolProperty::GenOutputOn, on)
    }

    pub fn is_output_inverted(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::GenOutputInvert)
    }

    pub fn set_output_inverted(&self, inverted: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::GenOutputInvert, inverted)
    }

    pub fn start(&mut self) -> Result<bool> {
        log::debug!("Starting generator");
        self.session.action(Action::GenStart)
    }

    pub fn stop(&mut self) -> Result<bool> {
        log::debug!("Stopping generator");
        self.session.action(Action::GenStop)
    }

    pub fn signal_types(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::GenSignalTypes, Domain::SignalType)
    }

    pub fn signal_type(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::GenSignalType, Domain::SignalType)
    }

    pub fn set_signal_type(&self, signal_type: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::GenSignalType, Domain::SignalType, signal_type)
    }

    pub fn amplitude_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenAmplitudeMin)
    }

    pub fn amplitude_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenAmplitudeMax)
    }

    /// Amplitude in volt.
    pub fn amplitude(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenAmplitude)
    }

    pub fn set_amplitude(&self, amplitude: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::GenAmplitude, amplitude)
    }

    pub fn amplitude_ranges(&self) -> Result<Vec<f64>> {
        self.session.get_list(ListProperty::GenAmplitudeRanges)
    }

    pub fn amplitude_range(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenAmplitudeRange)
    }

    pub fn set_amplitude_range(&self, range: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::GenAmplitudeRange, range)
    }

    pub fn is_amplitude_auto_ranging(&self) -> Result<bool> {
        self.session
            .get_bool(BoolProperty::GenAmplitudeAutoRanging)
    }

    pub fn set_amplitude_auto_ranging(&self, enabled: bool) -> Result<bool> {
        self.session
            .set_bool(BoolProperty::GenAmplitudeAutoRanging, enabled)
    }

    pub fn offset_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenOffsetMin)
    }

    pub fn offset_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenOffsetMax)
    }

    pub fn offset(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenOffset)
    }

    pub fn set_offset(&self, offset: f64) -> Result<f64> {
        self.session.set_float(FloatProperty::GenOffset, offset)
    }

    pub fn frequency_modes(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::GenFrequencyModes, Domain::FrequencyMode)
    }

    /// "signal": frequency is the signal's; "sample": it is the DAC rate.
    pub fn frequency_mode(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::GenFrequencyMode, Domain::FrequencyMode)
    }

    pub fn set_frequency_mode(&self, mode: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::GenFrequencyMode, Domain::FrequencyMode, mode)
    }

    pub fn frequency_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenFrequencyMin)
    }

    pub fn frequency_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenFrequencyMax)
    }

    pub fn frequency(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenFrequency)
    }

    pub fn set_frequency(&self, frequency: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::GenFrequency, frequency)
    }

    pub fn phase_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenPhaseMin)
    }

    pub fn phase_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenPhaseMax)
    }

    /// Phase as a fraction of a period.
    pub fn phase(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenPhase)
    }

    pub fn set_phase(&self, phase: f64) -> Result<f64> {
        self.session.set_float(FloatProperty::GenPhase, phase)
    }

    pub fn symmetry_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenSymmetryMin)
    }

    pub fn symmetry_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenSymmetryMax)
    }

    pub fn symmetry(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenSymmetry)
    }

    pub fn set_symmetry(&self, symmetry: f64) -> Result<f64> {
        self.session
            .set_float(FloatProperty::GenSymmetry, symmetry)
    }

    pub fn width_min(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenWidthMin)
    }

    pub fn width_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenWidthMax)
    }

    /// Pulse width in seconds.
    pub fn width(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::GenWidth)
    }

    pub fn set_width(&self, width: f64) -> Result<f64> {
        self.session.set_float(FloatProperty::GenWidth, width)
    }

    pub fn data_length_min(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenDataLengthMin)
    }

    pub fn data_length_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenDataLengthMax)
    }

    /// Length of the loaded arbitrary waveform.
    pub fn data_length(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenDataLength)
    }

    /// Load the waveform played by the "arbitrary" signal type. The device
    /// scales it to the configured amplitude.
    pub fn set_arbitrary_data(&self, data: &[f32]) -> Result<()> {
        log::debug!("Loading {} arbitrary samples", data.len());
        self.session
            .call(|sdk, handle| sdk.gen_set_data(handle, data))
    }

    /// Modes the hardware supports, independent of the signal type.
    pub fn modes_native(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::GenModesNative, Domain::GeneratorMode)
    }

    /// Modes available with the current signal type and frequency mode.
    pub fn modes(&self) -> Result<Vec<&'static str>> {
        self.session
            .get_labels(IntProperty::GenModes, Domain::GeneratorMode)
    }

    pub fn mode(&self) -> Result<&'static str> {
        self.session
            .get_label(IntProperty::GenMode, Domain::GeneratorMode)
    }

    pub fn set_mode(&self, mode: &str) -> Result<&'static str> {
        self.session
            .set_label(IntProperty::GenMode, Domain::GeneratorMode, mode)
    }

    pub fn is_burst_active(&self) -> Result<bool> {
        self.session.get_bool(BoolProperty::GenIsBurstActive)
    }

    pub fn burst_count_min(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstCountMin)
    }

    pub fn burst_count_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstCountMax)
    }

    /// Periods per burst in "burst count" mode.
    pub fn burst_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstCount)
    }

    pub fn set_burst_count(&self, count: u64) -> Result<u64> {
        self.session.set_int(IntProperty::GenBurstCount, count)
    }

    pub fn burst_sample_count_min(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSampleCountMin)
    }

    pub fn burst_sample_count_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSampleCountMax)
    }

    pub fn burst_sample_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSampleCount)
    }

    pub fn set_burst_sample_count(&self, count: u64) -> Result<u64> {
        self.session
            .set_int(IntProperty::GenBurstSampleCount, count)
    }

    pub fn burst_segment_count_min(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSegmentCountMin)
    }

    pub fn burst_segment_count_max(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSegmentCountMax)
    }

    pub fn burst_segment_count(&self) -> Result<u64> {
        self.session.get_int(IntProperty::GenBurstSegmentCount)
    }

    pub fn set_burst_segment_count(&self, count: u64) -> Result<u64> {
        self.session
            .set_int(IntProperty::GenBurstSegmentCount, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandyscopeError;
    use crate::sdk::simulated::{SimCall, SimulatedDevice, SimulatedSdk};
    use crate::session::DeviceKind;
    use crate::status::StatusCode;
    use std::sync::Arc;

    fn open() -> (Arc<SimulatedSdk>, Generator) {
        let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::new(
            "Handyscope HS3",
        )
        .with_kind(DeviceKind::Generator)]));
        let gen = Generator::open(&DeviceLocator::new(sdk.clone()), "HS3").unwrap();
        (sdk, gen)
    }

    #[test]
    fn test_signal_type_reaches_device_as_code() {
        let (sdk, gen) = open();
        assert_eq!(gen.set_signal_type("sine").unwrap(), "sine");
        assert!(sdk
            .calls()
            .contains(&SimCall::SetInt(IntProperty::GenSignalType, 1)));
        assert_eq!(gen.signal_type().unwrap(), "sine");
    }

    #[test]
    fn test_unknown_signal_type_is_refused_by_device() {
        let (_sdk, gen) = open();
        match gen.set_signal_type("unknown") {
            Err(HandyscopeError::NativeCall { status, .. }) => {
                assert_eq!(status, StatusCode::NOT_SUPPORTED);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            gen.set_signal_type("sawtooth"),
            Err(HandyscopeError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn test_amplitude_is_clipped() {
        let (_sdk, gen) = open();
        let max = gen.amplitude_max().unwrap();
        assert_eq!(gen.set_amplitude(max + 5.0).unwrap(), max);
        assert_eq!(gen.amplitude().unwrap(), max);
    }

    #[test]
    fn test_start_stop_status() {
        let (_sdk, mut gen) = open();
        assert_eq!(gen.status().unwrap(), vec!["stopped"]);
        gen.start().unwrap();
        assert_eq!(gen.status().unwrap(), vec!["running"]);
        gen.stop().unwrap();
        assert_eq!(gen.status().unwrap(), vec!["stopped"]);
    }

    #[test]
    fn test_burst_mode() {
        let (_sdk, gen) = open();
        assert!(gen.modes().unwrap().contains(&"burst count"));
        assert_eq!(gen.set_mode("burst count").unwrap(), "burst count");
        assert_eq!(gen.set_burst_count(0).unwrap(), 1);
        assert_eq!(gen.set_burst_count(10).unwrap(), 10);
        assert!(gen.set_mode("gated").is_err());
    }

    #[test]
    fn test_arbitrary_data() {
        let (_sdk, gen) = open();
        gen.set_signal_type("arbitrary").unwrap();
        let data: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0) * 2.0 - 1.0).collect();
        gen.set_arbitrary_data(&data).unwrap();
        assert_eq!(gen.data_length().unwrap(), 256);
        assert!(gen.set_arbitrary_data(&[]).is_err());
    }

    #[test]
    fn test_frequency_mode() {
        let (_sdk, gen) = open();
        assert_eq!(gen.frequency_modes().unwrap(), vec!["signal", "sample"]);
        assert_eq!(gen.set_frequency_mode("sample").unwrap(), "sample");
    }
}
