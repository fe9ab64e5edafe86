//! In-process stand-in for libtiepie.
//!
//! `SimulatedSdk` keeps a device list, per-handle property storage and the
//! process-wide last status the way the real library does. Tests use it to
//! script failures ([`SimulatedSdk::fail_next`], [`SimulatedSdk::fail_when`])
//! and to inspect what reached the native layer ([`SimulatedSdk::calls`]).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use handyscope_rs::{DeviceKind, DeviceLocator, Generator};
//! use handyscope_rs::sdk::simulated::{SimulatedDevice, SimulatedSdk};
//!
//! let sdk = Arc::new(SimulatedSdk::with_devices(vec![
//!     SimulatedDevice::new("Handyscope HS3").with_kind(DeviceKind::Generator),
//! ]));
//! let locator = DeviceLocator::new(sdk);
//! let mut gen = Generator::open(&locator, "HS3")?;
//! gen.set_signal_type("sine")?;
//! assert_eq!(gen.signal_type()?, "sine");
//! # Ok::<(), handyscope_rs::HandyscopeError>(())
//! ```

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::{Mutex, MutexGuard};

use crate::sdk::{
    Action, BoolProperty, FloatProperty, Handle, IntProperty, ListField, ListProperty, NameKind,
    RawSamples, Sdk, StringProperty,
};
use crate::session::DeviceKind;
use crate::status::StatusCode;

const ID_KIND_PRODUCT_ID: u64 = 1;
const ID_KIND_INDEX: u64 = 2;
const ID_KIND_SERIAL_NUMBER: u64 = 4;

const RANGES: [f64; 9] = [0.2, 0.4, 0.8, 2.0, 4.0, 8.0, 20.0, 40.0, 80.0];
const AMPLITUDE_RANGES: [f64; 3] = [0.2, 2.0, 12.0];
const RESOLUTIONS: [u8; 4] = [8, 12, 14, 16];

/// One native call as it reached the simulated library.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Update,
    Count,
    ListName(u32, NameKind),
    ListField(u32, ListField),
    CanOpen(u32, u64),
    Open { id_kind: u64, id: u64, device_type: u64 },
    Close(Handle),
    GetBool(BoolProperty),
    SetBool(BoolProperty, bool),
    GetInt(IntProperty),
    SetInt(IntProperty, u64),
    GetFloat(FloatProperty),
    SetFloat(FloatProperty, f64),
    VerifyInt(IntProperty, u64),
    VerifyFloat(FloatProperty, f64),
    GetList(ListProperty),
    GetString(StringProperty),
    Resolutions,
    Action(Action),
    GetData { start: u64, length: u64 },
    GetDataRaw { start: u64, length: u64 },
    RawValueRange(u16),
    ConnectionTestData,
    SetData(usize),
    I2cIsInternalAddress(u16),
    I2cRead(u16, usize),
    I2cWrite(u16, Vec<u8>),
}

type Matcher = Box<dyn Fn(&SimCall) -> bool + Send>;

struct Injection {
    status: StatusCode,
    matcher: Option<Matcher>,
}

/// A device as it appears in the simulated device list.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub name: String,
    pub serial_number: u32,
    pub product_id: u64,
    pub types: u64,
    pub channel_count: u16,
    pub trigger_inputs: u16,
    pub trigger_outputs: u16,
    pub driver_version: u64,
    pub firmware_version: u64,
    /// `year << 16 | month << 8 | day`
    pub calibration_date: u32,
    pub can_open: bool,
}

impl SimulatedDevice {
    /// A device with no capabilities yet; add them with [`Self::with_kind`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            serial_number: 27_000,
            product_id: 0,
            types: 0,
            channel_count: 2,
            trigger_inputs: 3,
            trigger_outputs: 3,
            driver_version: 0x0002_0000_0000_0000,
            firmware_version: 0x0001_0002_0003_0004,
            calibration_date: (2021 << 16) | (6 << 8) | 15,
            can_open: true,
        }
    }

    /// A Handyscope exposing oscilloscope, generator and I2C host.
    pub fn handyscope(name: &str, serial_number: u32) -> Self {
        Self::new(name)
            .with_kind(DeviceKind::Oscilloscope)
            .with_kind(DeviceKind::Generator)
            .with_kind(DeviceKind::I2cHost)
            .with_serial_number(serial_number)
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.types |= kind.code();
        self
    }

    pub fn with_serial_number(mut self, serial_number: u32) -> Self {
        self.serial_number = serial_number;
        self
    }

    pub fn with_product_id(mut self, product_id: u64) -> Self {
        self.product_id = product_id;
        self
    }

    pub fn with_channel_count(mut self, channel_count: u16) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn with_trigger_inputs(mut self, count: u16) -> Self {
        self.trigger_inputs = count;
        self
    }

    /// Listed, but already in use elsewhere.
    pub fn in_use(mut self) -> Self {
        self.can_open = false;
        self
    }

    fn short_name(&self) -> &str {
        self.name.rsplit(' ').next().unwrap_or(&self.name)
    }

    fn shortest_name(&self) -> &str {
        let short = self.short_name();
        short.split('-').next().unwrap_or(short)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Acquisition {
    Idle,
    Running { polls: u32 },
    Ready,
}

struct OpenDevice {
    device: SimulatedDevice,
    bools: HashMap<BoolProperty, bool>,
    ints: HashMap<IntProperty, u64>,
    floats: HashMap<FloatProperty, f64>,
    acquisition: Acquisition,
    connection_test_started: bool,
    generator_running: bool,
    i2c: HashMap<u16, Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Device,
    Channel(u16),
    TriggerInput(u16),
    TriggerOutput(u16),
}

struct State {
    devices: Vec<SimulatedDevice>,
    open: HashMap<Handle, OpenDevice>,
    next_handle: Handle,
    status: StatusCode,
    calls: Vec<SimCall>,
    injections: Vec<Injection>,
    data_ready_after: Option<u32>,
    waveforms: HashMap<u16, Vec<f32>>,
    internal_addresses: Vec<u16>,
}

pub struct SimulatedSdk {
    state: Mutex<State>,
}

impl SimulatedSdk {
    /// An empty device list.
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn with_devices(devices: Vec<SimulatedDevice>) -> Self {
        Self {
            state: Mutex::new(State {
                devices,
                open: HashMap::new(),
                next_handle: 1,
                status: StatusCode::SUCCESS,
                calls: Vec::new(),
                injections: Vec::new(),
                data_ready_after: Some(2),
                waveforms: HashMap::new(),
                internal_addresses: vec![0x50],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not take the other tests down with it
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_device(&self, device: SimulatedDevice) {
        self.lock().devices.push(device);
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// The next native call fails with `status` and has no effect.
    pub fn fail_next(&self, status: StatusCode) {
        self.lock().injections.push(Injection {
            status,
            matcher: None,
        });
    }

    /// The first future call matching `matcher` fails with `status`.
    pub fn fail_when(
        &self,
        status: StatusCode,
        matcher: impl Fn(&SimCall) -> bool + Send + 'static,
    ) {
        self.lock().injections.push(Injection {
            status,
            matcher: Some(Box::new(matcher)),
        });
    }

    /// Number of `IsDataReady` polls after a start before data is ready.
    /// `None` means the acquisition never completes.
    pub fn set_data_ready_after(&self, polls: Option<u32>) {
        self.lock().data_ready_after = polls;
    }

    /// Samples returned for `channel` instead of the default sine.
    pub fn set_waveform(&self, channel: u16, samples: Vec<f32>) {
        self.lock().waveforms.insert(channel, samples);
    }

    /// Store a value as if the device reported it, without recording a call.
    pub fn preset_int(&self, handle: Handle, property: IntProperty, value: u64) {
        if let Some(device) = self.lock().open.get_mut(&handle) {
            device.ints.insert(property, value);
        }
    }

    pub fn preset_bool(&self, handle: Handle, property: BoolProperty, value: bool) {
        if let Some(device) = self.lock().open.get_mut(&handle) {
            device.bools.insert(property, value);
        }
    }

    pub fn preset_float(&self, handle: Handle, property: FloatProperty, value: f64) {
        if let Some(device) = self.lock().open.get_mut(&handle) {
            device.floats.insert(property, value);
        }
    }

    pub fn is_open(&self, handle: Handle) -> bool {
        self.lock().open.contains_key(&handle)
    }

    /// Record `call`, apply a pending injection or run `op`.
    fn dispatch<T>(
        &self,
        call: SimCall,
        neutral: T,
        op: impl FnOnce(&mut State) -> Result<T, StatusCode>,
    ) -> T {
        let mut state = self.lock();
        state.status = StatusCode::SUCCESS;

        let hit = state
            .injections
            .iter()
            .position(|inj| inj.matcher.as_ref().is_none_or(|m| m(&call)));
        state.calls.push(call);
        if let Some(pos) = hit {
            let injection = state.injections.remove(pos);
            state.status = injection.status;
            if injection.status.is_error() {
                return neutral;
            }
        }

        match op(&mut state) {
            Ok(value) => value,
            Err(status) => {
                state.status = status;
                neutral
            }
        }
    }
}

impl Default for SimulatedSdk {
    fn default() -> Self {
        Self::new()
    }
}

fn bool_scope(property: BoolProperty) -> Scope {
    use BoolProperty::*;
    match property {
        TrInEnabled(i) | TrInIsAvailable(i) => Scope::TriggerInput(i),
        TrOutEnabled(i) => Scope::TriggerOutput(i),
        ChIsAvailable(ch) | ChIsDifferential(ch) | ChEnabled(ch) | ChAutoRanging(ch)
        | ChHasTrigger(ch) | ChTrEnabled(ch) | ChHasConnectionTest(ch) => Scope::Channel(ch),
        _ => Scope::Device,
    }
}

fn int_scope(property: IntProperty) -> Scope {
    use IntProperty::*;
    match property {
        TrInKinds(i) | TrInKind(i) | TrInId(i) => Scope::TriggerInput(i),
        TrOutEvents(i) | TrOutEvent(i) | TrOutId(i) => Scope::TriggerOutput(i),
        ChConnectorType(ch) | ChCouplings(ch) | ChCoupling(ch) | ChTrKinds(ch) | ChTrKind(ch)
        | ChTrLevelModes(ch) | ChTrLevelMode(ch) | ChTrLevelCount(ch)
        | ChTrHysteresisCount(ch) | ChTrConditions(ch) | ChTrCondition(ch)
        | ChTrTimeCount(ch) | ChDataRawType(ch) => Scope::Channel(ch),
        _ => Scope::Device,
    }
}

fn float_scope(property: FloatProperty) -> Scope {
    use FloatProperty::*;
    match property {
        ChImpedance(ch) | ChProbeGain(ch) | ChProbeOffset(ch) | ChRange(ch)
        | ChDataValueMin(ch) | ChDataValueMax(ch) | ChTrLevel(ch, _) | ChTrHysteresis(ch, _)
        | ChTrTime(ch, _) => Scope::Channel(ch),
        _ => Scope::Device,
    }
}

/// The stored waveform for `ch`, or a sine with a per-channel phase.
fn samples_for(
    waveforms: &HashMap<u16, Vec<f32>>,
    ch: u16,
    offset: usize,
    length: usize,
) -> Vec<f32> {
    match waveforms.get(&ch) {
        Some(samples) if !samples.is_empty() => (0..length)
            .map(|i| samples[(offset + i) % samples.len()])
            .collect(),
        _ => (0..length)
            .map(|i| {
                let phase = (offset + i) as f32 / 100.0 + f32::from(ch) * 0.25;
                (TAU * phase).sin()
            })
            .collect(),
    }
}

fn trigger_io_id(index: u16) -> u64 {
    (3 << 20) | (u64::from(index) + 1) << 8
}

fn is_window_kind(kind: u64) -> bool {
    matches!(kind, 4 | 8 | 32 | 64)
}

/// Capability mask an enumerated setter is checked against.
fn mask_of(property: IntProperty) -> Option<IntProperty> {
    use IntProperty::*;
    Some(match property {
        TrInKind(i) => TrInKinds(i),
        TrOutEvent(i) => TrOutEvents(i),
        ScpMeasureMode => ScpMeasureModes,
        ScpAutoResolutionMode => ScpAutoResolutionModes,
        ScpClockSource => ScpClockSources,
        ScpClockOutput => ScpClockOutputs,
        ChCoupling(ch) => ChCouplings(ch),
        ChTrKind(ch) => ChTrKinds(ch),
        ChTrLevelMode(ch) => ChTrLevelModes(ch),
        ChTrCondition(ch) => ChTrConditions(ch),
        GenSignalType => GenSignalTypes,
        GenFrequencyMode => GenFrequencyModes,
        GenMode => GenModes,
        _ => return None,
    })
}

impl OpenDevice {
    fn new(device: SimulatedDevice) -> Self {
        Self {
            device,
            bools: HashMap::new(),
            ints: HashMap::new(),
            floats: HashMap::new(),
            acquisition: Acquisition::Idle,
            connection_test_started: false,
            generator_running: false,
            i2c: HashMap::new(),
        }
    }

    fn check_scope(&self, scope: Scope) -> Result<(), StatusCode> {
        match scope {
            Scope::Device => Ok(()),
            Scope::Channel(ch) if ch < self.device.channel_count => Ok(()),
            Scope::Channel(_) => Err(StatusCode::INVALID_CHANNEL),
            Scope::TriggerInput(i) if i < self.device.trigger_inputs => Ok(()),
            Scope::TriggerOutput(i) if i < self.device.trigger_outputs => Ok(()),
            Scope::TriggerInput(_) | Scope::TriggerOutput(_) => Err(StatusCode::INVALID_INDEX),
        }
    }

    /// Data can only be read once an acquisition completed.
    fn check_readable(&self, channels: usize) -> Result<(), StatusCode> {
        if channels > usize::from(self.device.channel_count) {
            return Err(StatusCode::INVALID_CHANNEL);
        }
        if self.acquisition != Acquisition::Ready {
            return Err(StatusCode::UNSUCCESSFUL);
        }
        Ok(())
    }

    /// Unsigned raw samples as wide as the resolution, zero volt mid scale.
    fn raw_range(&self) -> (i64, i64, i64) {
        let bits = self.int_value(IntProperty::ScpResolution).clamp(1, 32);
        (0, 1 << (bits - 1), (1 << bits) - 1)
    }

    fn bool_value(&self, property: BoolProperty) -> bool {
        use BoolProperty::*;
        match property {
            ScpIsRunning => matches!(self.acquisition, Acquisition::Running { .. }),
            ScpIsTriggered => match self.acquisition {
                Acquisition::Running { polls } => polls > 0,
                Acquisition::Ready => true,
                Acquisition::Idle => false,
            },
            ScpIsDataReady => self.acquisition == Acquisition::Ready,
            ScpIsConnectionTestCompleted => self.connection_test_started,
            GenIsBurstActive => false,
            _ => self.bools.get(&property).copied().unwrap_or(match property {
                TrInIsAvailable(_) | ScpHasTrigger | ScpHasTriggerDelay | ScpHasTriggerHoldOff
                | ScpHasConnectionTest | ChIsAvailable(_) | ChHasTrigger(_)
                | ChHasConnectionTest(_) | GenIsControllable | GenAmplitudeAutoRanging => true,
                ChEnabled(ch) => ch == 0,
                _ => false,
            }),
        }
    }

    fn int_value(&self, property: IntProperty) -> u64 {
        use IntProperty::*;
        if let Some(value) = self.ints.get(&property) {
            return *value;
        }
        let device = &self.device;
        match property {
            DevDriverVersion => device.driver_version,
            DevFirmwareVersion => device.firmware_version,
            DevCalibrationDate => u64::from(device.calibration_date),
            DevSerialNumber => u64::from(device.serial_number),
            DevProductId => device.product_id,
            DevTriggerInputCount => u64::from(device.trigger_inputs),
            DevTriggerOutputCount => u64::from(device.trigger_outputs),
            TrInKinds(_) => 1 | 2,
            TrInKind(_) | TrOutEvent(_) => 1,
            TrInId(i) | TrOutId(i) => trigger_io_id(i),
            TrOutEvents(_) => 63,

            ScpChannelCount => u64::from(device.channel_count),
            ScpMeasureModes | ScpClockSources => 1 | 2,
            ScpMeasureMode | ScpClockSource => 2,
            ScpResolution => 12,
            ScpAutoResolutionModes | ScpClockOutputs => 1 | 2 | 4,
            ScpAutoResolutionMode | ScpClockOutput => 1,
            ScpRecordLengthMax => 64 << 20,
            ScpRecordLength => 5000,
            ScpSegmentCountMax => 1024,
            ScpSegmentCount => 1,
            ScpTriggerHoldOffCountMax => 1 << 24,
            ScpTriggerHoldOffCount => 0,
            ScpValidPreSampleCount => {
                let ratio = self.float_value(FloatProperty::ScpPreSampleRatio);
                let record_length = self.int_value(ScpRecordLength);
                (ratio * record_length as f64).round() as u64
            }

            ChConnectorType(_) | GenConnectorType => 1,
            ChCouplings(_) => 1 | 2,
            ChCoupling(_) | ChTrKind(_) | ChTrLevelMode(_) | ChTrTimeCount(_) => 1,
            ChTrKinds(_) => 511,
            ChTrLevelModes(_) => 1 | 2,
            ChTrLevelCount(ch) | ChTrHysteresisCount(ch) => {
                if is_window_kind(self.int_value(ChTrKind(ch))) {
                    2
                } else {
                    1
                }
            }
            ChTrConditions(_) => 1 | 2 | 4 | 8,
            ChTrCondition(_) => 0,
            ChDataRawType(_) => {
                if self.int_value(ScpResolution) <= 8 {
                    16
                } else {
                    32
                }
            }

            GenResolution => 14,
            GenStatus => {
                if self.generator_running {
                    2
                } else {
                    1
                }
            }
            GenSignalTypes => 127,
            GenSignalType | GenFrequencyMode | GenMode => 1,
            GenFrequencyModes => 1 | 2,
            GenDataLengthMin | GenBurstCountMin | GenBurstSampleCountMin
            | GenBurstSegmentCountMin | GenBurstCount | GenBurstSampleCount
            | GenBurstSegmentCount => 1,
            GenDataLengthMax | GenBurstSampleCountMax => 1 << 16,
            GenDataLength => 0,
            GenModesNative | GenModes => 1 | 2 | 256 | 1024,
            GenBurstCountMax => 1 << 20,
            GenBurstSegmentCountMax => 1024,
        }
    }

    fn float_value(&self, property: FloatProperty) -> f64 {
        use FloatProperty::*;
        if let Some(value) = self.floats.get(&property) {
            return *value;
        }
        match property {
            ScpClockSourceFrequency | ScpClockOutputFrequency => 10e6,
            ScpSampleFrequencyMax => 500e6,
            ScpSampleFrequency => 1e6,
            ScpPreSampleRatio | ScpTriggerDelay | ChProbeOffset(_) | GenOffset | GenPhase
            | GenPhaseMin | GenSymmetryMin | GenAmplitudeMin => 0.0,
            ScpTriggerTimeOut => 0.1,
            ScpTriggerDelayMax | ChProbeGain(_) | GenAmplitude | GenPhaseMax | GenSymmetryMax
            | GenWidthMax => 1.0,
            ChImpedance(_) => 1e6,
            ChRange(_) => 8.0,
            ChDataValueMin(ch) => -self.float_value(ChRange(ch)),
            ChDataValueMax(ch) => self.float_value(ChRange(ch)),
            ChTrLevel(_, _) | GenSymmetry => 0.5,
            ChTrHysteresis(_, _) => 0.05,
            ChTrTime(_, _) | GenWidth => 1e-3,
            GenImpedance => 50.0,
            GenOutputValueMin | GenOffsetMin => -12.0,
            GenOutputValueMax | GenOffsetMax | GenAmplitudeMax | GenAmplitudeRange => 12.0,
            GenFrequencyMin => 1e-3,
            GenFrequencyMax => 30e6,
            GenFrequency => 1e3,
            GenWidthMin => 1e-8,
            I2cSpeedMax => 400e3,
            I2cSpeed => 100e3,
        }
    }

    /// Bounds a setter clips to.
    fn float_limits(&self, property: FloatProperty) -> Option<(f64, f64)> {
        use FloatProperty::*;
        let between = |min, max| Some((self.float_value(min), self.float_value(max)));
        match property {
            GenAmplitude => between(GenAmplitudeMin, GenAmplitudeMax),
            GenOffset => between(GenOffsetMin, GenOffsetMax),
            GenFrequency => between(GenFrequencyMin, GenFrequencyMax),
            GenPhase => between(GenPhaseMin, GenPhaseMax),
            GenSymmetry => between(GenSymmetryMin, GenSymmetryMax),
            GenWidth => between(GenWidthMin, GenWidthMax),
            ScpSampleFrequency => Some((1.0, self.float_value(ScpSampleFrequencyMax))),
            ScpTriggerDelay => Some((0.0, self.float_value(ScpTriggerDelayMax))),
            I2cSpeed => Some((0.0, self.float_value(I2cSpeedMax))),
            ScpPreSampleRatio | ChTrHysteresis(_, _) => Some((0.0, 1.0)),
            ChTrLevel(ch, _) if self.int_value(IntProperty::ChTrLevelMode(ch)) == 1 => {
                Some((0.0, 1.0))
            }
            ChProbeGain(_) | ChProbeOffset(_) => Some((-1e6, 1e6)),
            _ => None,
        }
    }

    fn int_limits(&self, property: IntProperty) -> Option<(u64, u64)> {
        use IntProperty::*;
        let between = |min, max| Some((self.int_value(min), self.int_value(max)));
        match property {
            ScpRecordLength => Some((1, self.int_value(ScpRecordLengthMax))),
            ScpSegmentCount => Some((1, self.int_value(ScpSegmentCountMax))),
            GenBurstCount => between(GenBurstCountMin, GenBurstCountMax),
            GenBurstSampleCount => between(GenBurstSampleCountMin, GenBurstSampleCountMax),
            GenBurstSegmentCount => between(GenBurstSegmentCountMin, GenBurstSegmentCountMax),
            _ => None,
        }
    }

    /// What a set would store, and the status it leaves.
    fn resolve_float(&self, property: FloatProperty, value: f64) -> (f64, StatusCode) {
        if let FloatProperty::ChRange(_) | FloatProperty::GenAmplitudeRange = property {
            let ranges: &[f64] = if property == FloatProperty::GenAmplitudeRange {
                &AMPLITUDE_RANGES
            } else {
                &RANGES
            };
            let snapped = ranges
                .iter()
                .copied()
                .find(|r| *r >= value.abs())
                .unwrap_or(ranges[ranges.len() - 1]);
            return (snapped, StatusCode::SUCCESS);
        }
        match self.float_limits(property) {
            Some((min, max)) if value < min || value > max => {
                (value.clamp(min, max), StatusCode::VALUE_CLIPPED)
            }
            _ => (value, StatusCode::SUCCESS),
        }
    }

    fn resolve_int(&self, property: IntProperty, value: u64) -> Result<(u64, StatusCode), StatusCode> {
        if let Some(mask) = mask_of(property) {
            let allowed = self.int_value(mask);
            let zero_ok = matches!(property, IntProperty::ChTrCondition(_));
            if (value == 0 && !zero_ok) || allowed & value != value {
                return Err(StatusCode::NOT_SUPPORTED);
            }
        }
        if property == IntProperty::ScpResolution
            && !RESOLUTIONS.iter().any(|r| u64::from(*r) == value)
        {
            return Err(StatusCode::INVALID_VALUE);
        }
        Ok(match self.int_limits(property) {
            Some((min, max)) if value < min || value > max => {
                (value.clamp(min, max), StatusCode::VALUE_CLIPPED)
            }
            _ => (value, StatusCode::SUCCESS),
        })
    }
}

impl State {
    fn device(&mut self, handle: Handle) -> Result<&mut OpenDevice, StatusCode> {
        self.open.get_mut(&handle).ok_or(StatusCode::INVALID_HANDLE)
    }

    fn listed(&self, index: u32) -> Result<&SimulatedDevice, StatusCode> {
        self.devices
            .get(index as usize)
            .ok_or(StatusCode::INVALID_DEVICE_INDEX)
    }
}

impl Sdk for SimulatedSdk {
    fn last_status(&self) -> StatusCode {
        self.lock().status
    }

    fn last_status_str(&self) -> String {
        self.lock().status.name().to_string()
    }

    fn library_version(&self) -> u64 {
        0x0000_0009_0000_0000
    }

    fn lst_update(&self) {
        self.dispatch(SimCall::Update, (), |_| Ok(()));
    }

    fn lst_count(&self) -> u32 {
        self.dispatch(SimCall::Count, 0, |state| Ok(state.devices.len() as u32))
    }

    fn lst_dev_name(&self, index: u32, kind: NameKind) -> String {
        self.dispatch(SimCall::ListName(index, kind), String::new(), |state| {
            let device = state.listed(index)?;
            Ok(match kind {
                NameKind::Long => device.name.clone(),
                NameKind::Short => device.short_name().to_string(),
                NameKind::Shortest => device.shortest_name().to_string(),
            })
        })
    }

    fn lst_dev_field(&self, index: u32, field: ListField) -> u64 {
        self.dispatch(SimCall::ListField(index, field), 0, |state| {
            let device = state.listed(index)?;
            Ok(match field {
                ListField::ProductId => device.product_id,
                ListField::SerialNumber => u64::from(device.serial_number),
                ListField::Types => device.types,
                ListField::DriverVersion => device.driver_version,
                ListField::FirmwareVersion => device.firmware_version,
                ListField::CalibrationDate => u64::from(device.calibration_date),
            })
        })
    }

    fn lst_dev_can_open(&self, index: u32, device_type: u64) -> bool {
        self.dispatch(SimCall::CanOpen(index, device_type), false, |state| {
            let device = state.listed(index)?;
            Ok(device.can_open && device.types & device_type == device_type)
        })
    }

    fn lst_open_device(&self, id_kind: u64, id: u64, device_type: u64) -> Handle {
        let call = SimCall::Open {
            id_kind,
            id,
            device_type,
        };
        self.dispatch(call, 0, |state| {
            let found = match id_kind {
                ID_KIND_INDEX => state.devices.get(id as usize),
                ID_KIND_SERIAL_NUMBER => state
                    .devices
                    .iter()
                    .find(|d| u64::from(d.serial_number) == id),
                ID_KIND_PRODUCT_ID => state.devices.iter().find(|d| d.product_id == id),
                _ => return Err(StatusCode::INVALID_VALUE),
            };
            let device = found.cloned().ok_or(match id_kind {
                ID_KIND_SERIAL_NUMBER => StatusCode::INVALID_DEVICE_SERIALNUMBER,
                ID_KIND_PRODUCT_ID => StatusCode::INVALID_PRODUCT_ID,
                _ => StatusCode::INVALID_DEVICE_INDEX,
            })?;
            if device.types & device_type != device_type || device_type == 0 {
                return Err(StatusCode::INVALID_DEVICE_TYPE);
            }
            if !device.can_open {
                return Err(StatusCode::UNSUCCESSFUL);
            }
            let handle = state.next_handle;
            state.next_handle += 1;
            state.open.insert(handle, OpenDevice::new(device));
            Ok(handle)
        })
    }

    fn close(&self, handle: Handle) {
        self.dispatch(SimCall::Close(handle), (), |state| {
            state
                .open
                .remove(&handle)
                .map(|_| ())
                .ok_or(StatusCode::INVALID_HANDLE)
        });
    }

    fn get_bool(&self, handle: Handle, property: BoolProperty) -> bool {
        let ready_after = self.lock().data_ready_after;
        self.dispatch(SimCall::GetBool(property), false, |state| {
            let device = state.device(handle)?;
            device.check_scope(bool_scope(property))?;
            if property == BoolProperty::ScpIsDataReady {
                if let Acquisition::Running { polls } = device.acquisition {
                    let polls = polls + 1;
                    device.acquisition = match ready_after {
                        Some(after) if polls >= after => Acquisition::Ready,
                        _ => Acquisition::Running { polls },
                    };
                }
            }
            Ok(device.bool_value(property))
        })
    }

    fn set_bool(&self, handle: Handle, property: BoolProperty, value: bool) -> bool {
        self.dispatch(SimCall::SetBool(property, value), false, |state| {
            let device = state.device(handle)?;
            device.check_scope(bool_scope(property))?;
            device.bools.insert(property, value);
            Ok(value)
        })
    }

    fn get_int(&self, handle: Handle, property: IntProperty) -> u64 {
        self.dispatch(SimCall::GetInt(property), 0, |state| {
            let device = state.device(handle)?;
            device.check_scope(int_scope(property))?;
            Ok(device.int_value(property))
        })
    }

    fn set_int(&self, handle: Handle, property: IntProperty, value: u64) -> u64 {
        self.dispatch(SimCall::SetInt(property, value), 0, |state| {
            let device = state.device(handle)?;
            device.check_scope(int_scope(property))?;
            let (value, status) = device.resolve_int(property, value)?;
            device.ints.insert(property, value);
            state.status = status;
            Ok(value)
        })
    }

    fn get_float(&self, handle: Handle, property: FloatProperty) -> f64 {
        self.dispatch(SimCall::GetFloat(property), 0.0, |state| {
            let device = state.device(handle)?;
            device.check_scope(float_scope(property))?;
            Ok(device.float_value(property))
        })
    }

    fn set_float(&self, handle: Handle, property: FloatProperty, value: f64) -> f64 {
        self.dispatch(SimCall::SetFloat(property, value), 0.0, |state| {
            let device = state.device(handle)?;
            device.check_scope(float_scope(property))?;
            let (value, status) = device.resolve_float(property, value);
            device.floats.insert(property, value);
            state.status = status;
            Ok(value)
        })
    }

    fn verify_int(&self, handle: Handle, property: IntProperty, value: u64) -> u64 {
        self.dispatch(SimCall::VerifyInt(property, value), 0, |state| {
            let device = state.device(handle)?;
            device.check_scope(int_scope(property))?;
            Ok(device.resolve_int(property, value)?.0)
        })
    }

    fn verify_float(&self, handle: Handle, property: FloatProperty, value: f64) -> f64 {
        self.dispatch(SimCall::VerifyFloat(property, value), 0.0, |state| {
            let device = state.device(handle)?;
            device.check_scope(float_scope(property))?;
            Ok(device.resolve_float(property, value).0)
        })
    }

    fn get_list(&self, handle: Handle, property: ListProperty) -> Vec<f64> {
        self.dispatch(SimCall::GetList(property), Vec::new(), |state| {
            let device = state.device(handle)?;
            Ok(match property {
                ListProperty::ChRanges(ch) => {
                    device.check_scope(Scope::Channel(ch))?;
                    RANGES.to_vec()
                }
                ListProperty::ScpClockSourceFrequencies
                | ListProperty::ScpClockOutputFrequencies => vec![10e6],
                ListProperty::GenAmplitudeRanges => AMPLITUDE_RANGES.to_vec(),
            })
        })
    }

    fn get_string(&self, handle: Handle, property: StringProperty) -> String {
        self.dispatch(SimCall::GetString(property), String::new(), |state| {
            let device = state.device(handle)?;
            Ok(match property {
                StringProperty::DevName => device.device.name.clone(),
                StringProperty::DevNameShort => device.device.short_name().to_string(),
                StringProperty::DevNameShortest => device.device.shortest_name().to_string(),
                StringProperty::TrInName(i) => {
                    device.check_scope(Scope::TriggerInput(i))?;
                    format!("EXT {}", i + 1)
                }
                StringProperty::TrOutName(i) => {
                    device.check_scope(Scope::TriggerOutput(i))?;
                    format!("EXT {}", i + 1)
                }
            })
        })
    }

    fn resolutions(&self, handle: Handle) -> Vec<u8> {
        self.dispatch(SimCall::Resolutions, Vec::new(), |state| {
            state.device(handle)?;
            Ok(RESOLUTIONS.to_vec())
        })
    }

    fn action(&self, handle: Handle, action: Action) -> bool {
        self.dispatch(SimCall::Action(action), false, |state| {
            let device = state.device(handle)?;
            match action {
                Action::ScpStart => {
                    if matches!(device.acquisition, Acquisition::Running { .. }) {
                        return Ok(false);
                    }
                    device.acquisition = Acquisition::Running { polls: 0 };
                }
                Action::ScpStop => {
                    if let Acquisition::Running { .. } = device.acquisition {
                        device.acquisition = Acquisition::Idle;
                    }
                }
                Action::ScpForceTrigger => {
                    if !matches!(device.acquisition, Acquisition::Running { .. }) {
                        return Ok(false);
                    }
                    device.acquisition = Acquisition::Ready;
                }
                Action::ScpStartConnectionTest => device.connection_test_started = true,
                Action::GenStart => device.generator_running = true,
                Action::GenStop => device.generator_running = false,
                Action::TrOutTrigger(i) => device.check_scope(Scope::TriggerOutput(i))?,
            }
            Ok(true)
        })
    }

    fn get_data(
        &self,
        handle: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<Vec<f32>>> {
        let neutral = vec![None; channels.len()];
        self.dispatch(SimCall::GetData { start, length }, neutral, |state| {
            let waveforms = state.waveforms.clone();
            let device = state.device(handle)?;
            device.check_readable(channels.len())?;
            Ok((0u16..)
                .zip(channels)
                .map(|(ch, wanted)| {
                    wanted.then(|| samples_for(&waveforms, ch, start as usize, length as usize))
                })
                .collect())
        })
    }

    fn get_data_raw(
        &self,
        handle: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<RawSamples>> {
        let neutral = vec![None; channels.len()];
        self.dispatch(SimCall::GetDataRaw { start, length }, neutral, |state| {
            let waveforms = state.waveforms.clone();
            let device = state.device(handle)?;
            device.check_readable(channels.len())?;
            let (min, zero, max) = device.raw_range();
            let narrow = max <= i64::from(u8::MAX);
            Ok((0u16..)
                .zip(channels)
                .map(|(ch, wanted)| {
                    wanted.then(|| {
                        let range = device.float_value(FloatProperty::ChRange(ch));
                        let scale = (max - zero) as f64 / range;
                        let codes = samples_for(&waveforms, ch, start as usize, length as usize)
                            .into_iter()
                            .map(|volt| {
                                let code = zero as f64 + (f64::from(volt) * scale).round();
                                code.clamp(min as f64, max as f64)
                            });
                        if narrow {
                            RawSamples::UInt8(codes.map(|code| code as u8).collect())
                        } else {
                            RawSamples::UInt16(codes.map(|code| code as u16).collect())
                        }
                    })
                })
                .collect())
        })
    }

    fn raw_value_range(&self, handle: Handle, ch: u16) -> (i64, i64, i64) {
        self.dispatch(SimCall::RawValueRange(ch), (0, 0, 0), |state| {
            let device = state.device(handle)?;
            device.check_scope(Scope::Channel(ch))?;
            Ok(device.raw_range())
        })
    }

    fn connection_test_data(&self, handle: Handle, channel_count: u16) -> Vec<u8> {
        self.dispatch(SimCall::ConnectionTestData, Vec::new(), |state| {
            let device = state.device(handle)?;
            if !device.connection_test_started {
                return Err(StatusCode::UNSUCCESSFUL);
            }
            Ok(vec![1; usize::from(channel_count)])
        })
    }

    fn gen_set_data(&self, handle: Handle, data: &[f32]) {
        self.dispatch(SimCall::SetData(data.len()), (), |state| {
            let device = state.device(handle)?;
            let max = device.int_value(IntProperty::GenDataLengthMax);
            if data.is_empty() || data.len() as u64 > max {
                return Err(StatusCode::INVALID_VALUE);
            }
            device
                .ints
                .insert(IntProperty::GenDataLength, data.len() as u64);
            Ok(())
        });
    }

    fn i2c_is_internal_address(&self, handle: Handle, address: u16) -> bool {
        self.dispatch(SimCall::I2cIsInternalAddress(address), false, |state| {
            let internal = state.internal_addresses.contains(&address);
            state.device(handle)?;
            Ok(internal)
        })
    }

    fn i2c_read(&self, handle: Handle, address: u16, length: usize, _stop: bool) -> Vec<u8> {
        self.dispatch(SimCall::I2cRead(address, length), Vec::new(), |state| {
            let device = state.device(handle)?;
            let stored = device.i2c.get(&address).ok_or(StatusCode::NO_ACKNOWLEDGE)?;
            // a device only has as many bytes as were written to it
            Ok(stored.iter().copied().take(length).collect())
        })
    }

    fn i2c_write(&self, handle: Handle, address: u16, data: &[u8], _stop: bool) -> bool {
        self.dispatch(SimCall::I2cWrite(address, data.to_vec()), false, |state| {
            if state.internal_addresses.contains(&address) {
                return Err(StatusCode::INTERNAL_ADDRESS);
            }
            let device = state.device(handle)?;
            device.i2c.insert(address, data.to_vec());
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_scope(sdk: &SimulatedSdk) -> Handle {
        let handle = sdk.lst_open_device(ID_KIND_INDEX, 0, DeviceKind::Oscilloscope.code());
        assert!(sdk.last_status().is_success());
        handle
    }

    #[test]
    fn test_names_are_derived_from_long_name() {
        let device = SimulatedDevice::new("Handyscope HS5-540XMS");
        assert_eq!(device.short_name(), "HS5-540XMS");
        assert_eq!(device.shortest_name(), "HS5");
    }

    #[test]
    fn test_open_checks_capability() {
        let sdk = SimulatedSdk::with_devices(vec![
            SimulatedDevice::new("Handyscope HS3").with_kind(DeviceKind::Generator)
        ]);
        sdk.lst_open_device(ID_KIND_INDEX, 0, DeviceKind::Oscilloscope.code());
        assert_eq!(sdk.last_status(), StatusCode::INVALID_DEVICE_TYPE);
    }

    #[test]
    fn test_acquisition_completes_after_polls() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        sdk.set_data_ready_after(Some(3));
        let handle = open_scope(&sdk);
        assert!(sdk.action(handle, Action::ScpStart));
        assert!(!sdk.get_bool(handle, BoolProperty::ScpIsDataReady));
        assert!(sdk.get_bool(handle, BoolProperty::ScpIsTriggered));
        assert!(!sdk.get_bool(handle, BoolProperty::ScpIsDataReady));
        assert!(sdk.get_bool(handle, BoolProperty::ScpIsDataReady));
        assert!(!sdk.get_bool(handle, BoolProperty::ScpIsRunning));
    }

    #[test]
    fn test_raw_type_follows_resolution() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        let handle = open_scope(&sdk);
        assert_eq!(sdk.get_int(handle, IntProperty::ChDataRawType(0)), 32);
        assert_eq!(sdk.raw_value_range(handle, 0), (0, 2048, 4095));

        sdk.set_int(handle, IntProperty::ScpResolution, 8);
        assert_eq!(sdk.get_int(handle, IntProperty::ChDataRawType(1)), 16);
        assert_eq!(sdk.raw_value_range(handle, 1), (0, 128, 255));

        sdk.raw_value_range(handle, 2);
        assert_eq!(sdk.last_status(), StatusCode::INVALID_CHANNEL);
    }

    #[test]
    fn test_setter_clips_and_warns() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        let handle = open_scope(&sdk);
        let gain = sdk.set_float(handle, FloatProperty::ChProbeGain(0), 2e6);
        assert_eq!(gain, 1e6);
        assert_eq!(sdk.last_status(), StatusCode::VALUE_CLIPPED);
    }

    #[test]
    fn test_unsupported_enumeration_value() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        let handle = open_scope(&sdk);
        sdk.set_int(handle, IntProperty::ChTrKind(0), 0);
        assert_eq!(sdk.last_status(), StatusCode::NOT_SUPPORTED);
        assert_eq!(sdk.get_int(handle, IntProperty::ChTrKind(0)), 1);
    }

    #[test]
    fn test_invalid_channel() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        let handle = open_scope(&sdk);
        sdk.get_float(handle, FloatProperty::ChRange(7));
        assert_eq!(sdk.last_status(), StatusCode::INVALID_CHANNEL);
    }

    #[test]
    fn test_fail_when_matches_only_its_call() {
        let sdk = SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope("HS5", 1)]);
        let handle = open_scope(&sdk);
        sdk.fail_when(StatusCode::NOT_AVAILABLE, |call| {
            matches!(call, SimCall::GetFloat(FloatProperty::ScpSampleFrequency))
        });
        sdk.get_int(handle, IntProperty::ScpRecordLength);
        assert!(sdk.last_status().is_success());
        sdk.get_float(handle, FloatProperty::ScpSampleFrequency);
        assert_eq!(sdk.last_status(), StatusCode::NOT_AVAILABLE);
        sdk.get_float(handle, FloatProperty::ScpSampleFrequency);
        assert!(sdk.last_status().is_success());
    }
}
