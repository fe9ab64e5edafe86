//! The native call surface this crate is written against.
//!
//! libtiepie exposes one C function per property and per action, all keyed by
//! a device handle. [`Sdk`] mirrors that surface with one trait method per
//! value type, and the property enums below name the native function a call
//! maps to (`ChRange(ch)` is `ScpChGetRange` / `ScpChSetRange`, and so on).
//!
//! Implementations report failures the way libtiepie does: the call returns a
//! neutral value and the outcome is left in [`Sdk::last_status`]. Callers never
//! read that themselves, they go through [`crate::status::checked`].

pub mod simulated;

#[cfg(feature = "libtiepie")]
pub mod native;

use crate::registry::{self, Domain};
use crate::status::StatusCode;

/// Native device handle.
pub type Handle = u32;

/// Which of the three name strings the SDK keeps per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// "Handyscope HS5-540XMS"
    Long,
    /// "HS5-540XMS"
    Short,
    /// "HS5"
    Shortest,
}

/// Numeric fields of a device list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListField {
    ProductId,
    SerialNumber,
    Types,
    DriverVersion,
    FirmwareVersion,
    CalibrationDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolProperty {
    DevIsRemoved,
    TrInEnabled(u16),
    TrInIsAvailable(u16),
    TrOutEnabled(u16),

    ScpIsRunning,
    ScpIsTriggered,
    ScpIsTimeoutTriggered,
    ScpIsForceTriggered,
    ScpIsDataReady,
    ScpIsDataOverflow,
    ScpIsResolutionEnhanced,
    ScpHasTrigger,
    ScpHasTriggerDelay,
    ScpHasTriggerHoldOff,
    ScpHasConnectionTest,
    ScpIsConnectionTestCompleted,

    ChIsAvailable(u16),
    ChIsDifferential(u16),
    ChEnabled(u16),
    ChAutoRanging(u16),
    ChHasTrigger(u16),
    ChTrEnabled(u16),
    ChHasConnectionTest(u16),

    GenIsDifferential,
    GenIsControllable,
    GenOutputOn,
    GenOutputInvert,
    GenAmplitudeAutoRanging,
    GenIsBurstActive,
}

/// Integer properties. Enumerated properties carry the native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntProperty {
    DevDriverVersion,
    DevFirmwareVersion,
    DevCalibrationDate,
    DevSerialNumber,
    DevProductId,
    DevTriggerInputCount,
    DevTriggerOutputCount,
    TrInKinds(u16),
    TrInKind(u16),
    TrInId(u16),
    TrOutEvents(u16),
    TrOutEvent(u16),
    TrOutId(u16),

    ScpChannelCount,
    ScpMeasureModes,
    ScpMeasureMode,
    ScpResolution,
    ScpAutoResolutionModes,
    ScpAutoResolutionMode,
    ScpClockSources,
    ScpClockSource,
    ScpClockOutputs,
    ScpClockOutput,
    ScpRecordLengthMax,
    ScpRecordLength,
    ScpSegmentCountMax,
    ScpSegmentCount,
    ScpTriggerHoldOffCountMax,
    ScpTriggerHoldOffCount,
    ScpValidPreSampleCount,

    ChConnectorType(u16),
    ChCouplings(u16),
    ChCoupling(u16),
    ChTrKinds(u16),
    ChTrKind(u16),
    ChTrLevelModes(u16),
    ChTrLevelMode(u16),
    ChTrLevelCount(u16),
    ChTrHysteresisCount(u16),
    ChTrConditions(u16),
    ChTrCondition(u16),
    ChTrTimeCount(u16),
    /// Read only.
    ChDataRawType(u16),

    GenConnectorType,
    GenResolution,
    GenStatus,
    GenSignalTypes,
    GenSignalType,
    GenFrequencyModes,
    GenFrequencyMode,
    GenDataLengthMin,
    GenDataLengthMax,
    GenDataLength,
    GenModesNative,
    GenModes,
    GenMode,
    GenBurstCountMin,
    GenBurstCountMax,
    GenBurstCount,
    GenBurstSampleCountMin,
    GenBurstSampleCountMax,
    GenBurstSampleCount,
    GenBurstSegmentCountMin,
    GenBurstSegmentCountMax,
    GenBurstSegmentCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatProperty {
    ScpClockSourceFrequency,
    ScpClockOutputFrequency,
    ScpSampleFrequencyMax,
    ScpSampleFrequency,
    ScpPreSampleRatio,
    ScpTriggerTimeOut,
    ScpTriggerDelayMax,
    ScpTriggerDelay,

    ChImpedance(u16),
    ChProbeGain(u16),
    ChProbeOffset(u16),
    ChRange(u16),
    ChDataValueMin(u16),
    ChDataValueMax(u16),
    /// Channel, level index
    ChTrLevel(u16, u32),
    ChTrHysteresis(u16, u32),
    ChTrTime(u16, u32),

    GenImpedance,
    GenOutputValueMin,
    GenOutputValueMax,
    GenAmplitudeMin,
    GenAmplitudeMax,
    GenAmplitude,
    GenAmplitudeRange,
    GenOffsetMin,
    GenOffsetMax,
    GenOffset,
    GenFrequencyMin,
    GenFrequencyMax,
    GenFrequency,
    GenPhaseMin,
    GenPhaseMax,
    GenPhase,
    GenSymmetryMin,
    GenSymmetryMax,
    GenSymmetry,
    GenWidthMin,
    GenWidthMax,
    GenWidth,

    I2cSpeedMax,
    I2cSpeed,
}

/// Properties the SDK hands out as arrays of doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListProperty {
    ChRanges(u16),
    ScpClockSourceFrequencies,
    ScpClockOutputFrequencies,
    GenAmplitudeRanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringProperty {
    DevName,
    DevNameShort,
    DevNameShortest,
    TrInName(u16),
    TrOutName(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ScpStart,
    ScpStop,
    ScpForceTrigger,
    ScpStartConnectionTest,
    GenStart,
    GenStop,
    TrOutTrigger(u16),
}

/// One channel's samples in the type the device stores them in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Run `$body` with `$samples` bound to the inner vector, whatever its type.
macro_rules! each_raw {
    ($raw:expr, $samples:ident => $body:expr) => {
        match $raw {
            $crate::sdk::RawSamples::Int8($samples) => $body,
            $crate::sdk::RawSamples::Int16($samples) => $body,
            $crate::sdk::RawSamples::Int32($samples) => $body,
            $crate::sdk::RawSamples::Int64($samples) => $body,
            $crate::sdk::RawSamples::UInt8($samples) => $body,
            $crate::sdk::RawSamples::UInt16($samples) => $body,
            $crate::sdk::RawSamples::UInt32($samples) => $body,
            $crate::sdk::RawSamples::UInt64($samples) => $body,
            $crate::sdk::RawSamples::Float32($samples) => $body,
            $crate::sdk::RawSamples::Float64($samples) => $body,
        }
    };
}
pub(crate) use each_raw;

impl RawSamples {
    /// `length` zeroes of the type behind a native raw data type code.
    pub fn zeroed(code: u64, length: usize) -> Option<Self> {
        Some(match registry::label_for(Domain::RawDataType, code).ok()? {
            "int8" => Self::Int8(vec![0; length]),
            "int16" => Self::Int16(vec![0; length]),
            "int32" => Self::Int32(vec![0; length]),
            "int64" => Self::Int64(vec![0; length]),
            "uint8" => Self::UInt8(vec![0; length]),
            "uint16" => Self::UInt16(vec![0; length]),
            "uint32" => Self::UInt32(vec![0; length]),
            "uint64" => Self::UInt64(vec![0; length]),
            "float32" => Self::Float32(vec![0.0; length]),
            "float64" => Self::Float64(vec![0.0; length]),
            _ => return None,
        })
    }

    /// Raw data type label, as in [`Domain::RawDataType`].
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
        }
    }

    pub fn len(&self) -> usize {
        each_raw!(self, samples => samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn truncate(&mut self, length: usize) {
        each_raw!(self, samples => samples.truncate(length))
    }

    /// Every sample widened to `f64`. 64 bit integers may lose precision.
    pub fn to_f64(&self) -> Vec<f64> {
        each_raw!(self, samples => samples.iter().map(|s| *s as f64).collect())
    }
}

pub trait Sdk: Send + Sync {
    fn last_status(&self) -> StatusCode;
    fn last_status_str(&self) -> String;
    /// Packed as four 16 bit fields, major first.
    fn library_version(&self) -> u64;

    fn lst_update(&self);
    fn lst_count(&self) -> u32;
    fn lst_dev_name(&self, index: u32, kind: NameKind) -> String;
    fn lst_dev_field(&self, index: u32, field: ListField) -> u64;
    fn lst_dev_can_open(&self, index: u32, device_type: u64) -> bool;
    fn lst_open_device(&self, id_kind: u64, id: u64, device_type: u64) -> Handle;

    fn close(&self, handle: Handle);

    fn get_bool(&self, handle: Handle, property: BoolProperty) -> bool;
    /// Returns the value the device accepted.
    fn set_bool(&self, handle: Handle, property: BoolProperty, value: bool) -> bool;
    fn get_int(&self, handle: Handle, property: IntProperty) -> u64;
    fn set_int(&self, handle: Handle, property: IntProperty, value: u64) -> u64;
    fn get_float(&self, handle: Handle, property: FloatProperty) -> f64;
    fn set_float(&self, handle: Handle, property: FloatProperty, value: f64) -> f64;
    /// The value a set would end up with, without applying it.
    fn verify_int(&self, handle: Handle, property: IntProperty, value: u64) -> u64;
    fn verify_float(&self, handle: Handle, property: FloatProperty, value: f64) -> f64;
    fn get_list(&self, handle: Handle, property: ListProperty) -> Vec<f64>;
    fn get_string(&self, handle: Handle, property: StringProperty) -> String;
    fn resolutions(&self, handle: Handle) -> Vec<u8>;
    fn action(&self, handle: Handle, action: Action) -> bool;

    /// Copy `length` samples starting at `start` for every channel flagged in
    /// `channels`; unflagged channels come back as `None`.
    fn get_data(
        &self,
        handle: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<Vec<f32>>>;
    /// [`Sdk::get_data`] without the conversion to volts. Each buffer has
    /// the channel's [`IntProperty::ChDataRawType`].
    fn get_data_raw(
        &self,
        handle: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<RawSamples>>;
    /// Raw values for the bottom of the range, zero volt and the top of the
    /// range, in that order.
    fn raw_value_range(&self, handle: Handle, ch: u16) -> (i64, i64, i64);
    fn connection_test_data(&self, handle: Handle, channel_count: u16) -> Vec<u8>;
    fn gen_set_data(&self, handle: Handle, data: &[f32]);

    fn i2c_is_internal_address(&self, handle: Handle, address: u16) -> bool;
    fn i2c_read(&self, handle: Handle, address: u16, length: usize, stop: bool) -> Vec<u8>;
    fn i2c_write(&self, handle: Handle, address: u16, data: &[u8], stop: bool) -> bool;
}
