//! [`Sdk`] on top of the vendor's libtiepie shared library.
//!
//! Bindings follow `libtiepie.h` (0.9 series). The library is initialised
//! once per process and never torn down, device handles are closed by their
//! sessions.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::{Mutex, OnceLock};

use super::{
    each_raw, Action, BoolProperty, FloatProperty, Handle, IntProperty, ListField, ListProperty,
    NameKind, RawSamples, Sdk, StringProperty,
};
use crate::error::{HandyscopeError, Result};
use crate::status::StatusCode;

#[allow(non_snake_case, dead_code)]
mod ffi {
    use std::ffi::{c_char, c_void};

    pub type BOOL8 = u8;
    pub type TpStatus = i32;
    pub type TpHandle = u32;

    #[link(name = "tiepie")]
    extern "C" {
        pub fn LibInit();
        pub fn LibIsInitialized() -> BOOL8;
        pub fn LibGetVersion() -> u64;
        pub fn LibGetLastStatus() -> TpStatus;
        pub fn LibGetLastStatusStr() -> *const c_char;

        pub fn LstUpdate();
        pub fn LstGetCount() -> u32;
        pub fn LstDevGetName(id_kind: u32, id: u32, buffer: *mut c_char, length: u32) -> u32;
        pub fn LstDevGetNameShort(id_kind: u32, id: u32, buffer: *mut c_char, length: u32)
            -> u32;
        pub fn LstDevGetNameShortest(
            id_kind: u32,
            id: u32,
            buffer: *mut c_char,
            length: u32,
        ) -> u32;
        pub fn LstDevGetProductId(id_kind: u32, id: u32) -> u32;
        pub fn LstDevGetSerialNumber(id_kind: u32, id: u32) -> u32;
        pub fn LstDevGetTypes(id_kind: u32, id: u32) -> u32;
        pub fn LstDevGetDriverVersion(id_kind: u32, id: u32) -> u64;
        pub fn LstDevGetFirmwareVersion(id_kind: u32, id: u32) -> u64;
        pub fn LstDevGetCalibrationDate(id_kind: u32, id: u32) -> u32;
        pub fn LstDevCanOpen(id_kind: u32, id: u32, device_type: u32) -> BOOL8;
        pub fn LstOpenDevice(id_kind: u32, id: u32, device_type: u32) -> TpHandle;

        pub fn ObjClose(handle: TpHandle) -> BOOL8;
        pub fn ObjIsRemoved(handle: TpHandle) -> BOOL8;

        pub fn DevGetDriverVersion(handle: TpHandle) -> u64;
        pub fn DevGetFirmwareVersion(handle: TpHandle) -> u64;
        pub fn DevGetCalibrationDate(handle: TpHandle) -> u32;
        pub fn DevGetSerialNumber(handle: TpHandle) -> u32;
        pub fn DevGetProductId(handle: TpHandle) -> u32;
        pub fn DevGetName(handle: TpHandle, buffer: *mut c_char, length: u32) -> u32;
        pub fn DevGetNameShort(handle: TpHandle, buffer: *mut c_char, length: u32) -> u32;
        pub fn DevGetNameShortest(handle: TpHandle, buffer: *mut c_char, length: u32) -> u32;

        pub fn DevTrGetInputCount(handle: TpHandle) -> u16;
        pub fn DevTrInIsAvailable(handle: TpHandle, input: u16) -> BOOL8;
        pub fn DevTrInGetEnabled(handle: TpHandle, input: u16) -> BOOL8;
        pub fn DevTrInSetEnabled(handle: TpHandle, input: u16, value: BOOL8) -> BOOL8;
        pub fn DevTrInGetKinds(handle: TpHandle, input: u16) -> u64;
        pub fn DevTrInGetKind(handle: TpHandle, input: u16) -> u64;
        pub fn DevTrInSetKind(handle: TpHandle, input: u16, value: u64) -> u64;
        pub fn DevTrInGetId(handle: TpHandle, input: u16) -> u32;
        pub fn DevTrInGetName(
            handle: TpHandle,
            input: u16,
            buffer: *mut c_char,
            length: u32,
        ) -> u32;

        pub fn DevTrGetOutputCount(handle: TpHandle) -> u16;
        pub fn DevTrOutGetEnabled(handle: TpHandle, output: u16) -> BOOL8;
        pub fn DevTrOutSetEnabled(handle: TpHandle, output: u16, value: BOOL8) -> BOOL8;
        pub fn DevTrOutGetEvents(handle: TpHandle, output: u16) -> u64;
        pub fn DevTrOutGetEvent(handle: TpHandle, output: u16) -> u64;
        pub fn DevTrOutSetEvent(handle: TpHandle, output: u16, value: u64) -> u64;
        pub fn DevTrOutGetId(handle: TpHandle, output: u16) -> u32;
        pub fn DevTrOutGetName(
            handle: TpHandle,
            output: u16,
            buffer: *mut c_char,
            length: u32,
        ) -> u32;
        pub fn DevTrOutTrigger(handle: TpHandle, output: u16) -> BOOL8;

        pub fn ScpGetChannelCount(handle: TpHandle) -> u16;
        pub fn ScpChIsAvailable(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChGetConnectorType(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChIsDifferential(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChGetImpedance(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChGetCouplings(handle: TpHandle, ch: u16) -> u64;
        pub fn ScpChGetCoupling(handle: TpHandle, ch: u16) -> u64;
        pub fn ScpChSetCoupling(handle: TpHandle, ch: u16, value: u64) -> u64;
        pub fn ScpChGetEnabled(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChSetEnabled(handle: TpHandle, ch: u16, value: BOOL8) -> BOOL8;
        pub fn ScpChGetProbeGain(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChSetProbeGain(handle: TpHandle, ch: u16, value: f64) -> f64;
        pub fn ScpChGetProbeOffset(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChSetProbeOffset(handle: TpHandle, ch: u16, value: f64) -> f64;
        pub fn ScpChGetAutoRanging(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChSetAutoRanging(handle: TpHandle, ch: u16, value: BOOL8) -> BOOL8;
        pub fn ScpChGetRanges(handle: TpHandle, ch: u16, list: *mut f64, length: u32) -> u32;
        pub fn ScpChGetRange(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChSetRange(handle: TpHandle, ch: u16, value: f64) -> f64;
        pub fn ScpChGetDataValueMin(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChGetDataValueMax(handle: TpHandle, ch: u16) -> f64;
        pub fn ScpChGetDataRawType(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChGetDataRawValueRange(
            handle: TpHandle,
            ch: u16,
            min: *mut i64,
            zero: *mut i64,
            max: *mut i64,
        );
        pub fn ScpChHasTrigger(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChHasConnectionTest(handle: TpHandle, ch: u16) -> BOOL8;

        pub fn ScpChTrGetEnabled(handle: TpHandle, ch: u16) -> BOOL8;
        pub fn ScpChTrSetEnabled(handle: TpHandle, ch: u16, value: BOOL8) -> BOOL8;
        pub fn ScpChTrGetKinds(handle: TpHandle, ch: u16) -> u64;
        pub fn ScpChTrGetKind(handle: TpHandle, ch: u16) -> u64;
        pub fn ScpChTrSetKind(handle: TpHandle, ch: u16, value: u64) -> u64;
        pub fn ScpChTrGetLevelModes(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrGetLevelMode(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrSetLevelMode(handle: TpHandle, ch: u16, value: u32) -> u32;
        pub fn ScpChTrGetLevelCount(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrGetLevel(handle: TpHandle, ch: u16, index: u32) -> f64;
        pub fn ScpChTrSetLevel(handle: TpHandle, ch: u16, index: u32, value: f64) -> f64;
        pub fn ScpChTrGetHysteresisCount(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrGetHysteresis(handle: TpHandle, ch: u16, index: u32) -> f64;
        pub fn ScpChTrSetHysteresis(handle: TpHandle, ch: u16, index: u32, value: f64) -> f64;
        pub fn ScpChTrGetConditions(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrGetCondition(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrSetCondition(handle: TpHandle, ch: u16, value: u32) -> u32;
        pub fn ScpChTrGetTimeCount(handle: TpHandle, ch: u16) -> u32;
        pub fn ScpChTrGetTime(handle: TpHandle, ch: u16, index: u32) -> f64;
        pub fn ScpChTrSetTime(handle: TpHandle, ch: u16, index: u32, value: f64) -> f64;

        pub fn ScpGetData(
            handle: TpHandle,
            buffers: *mut *mut f32,
            channel_count: u16,
            start: u64,
            length: u64,
        ) -> u64;
        pub fn ScpGetDataRaw(
            handle: TpHandle,
            buffers: *mut *mut c_void,
            channel_count: u16,
            start: u64,
            length: u64,
        ) -> u64;
        pub fn ScpGetValidPreSampleCount(handle: TpHandle) -> u64;
        pub fn ScpIsRunning(handle: TpHandle) -> BOOL8;
        pub fn ScpStart(handle: TpHandle) -> BOOL8;
        pub fn ScpStop(handle: TpHandle) -> BOOL8;
        pub fn ScpForceTrigger(handle: TpHandle) -> BOOL8;
        pub fn ScpIsTriggered(handle: TpHandle) -> BOOL8;
        pub fn ScpIsTimeOutTriggered(handle: TpHandle) -> BOOL8;
        pub fn ScpIsForceTriggered(handle: TpHandle) -> BOOL8;
        pub fn ScpIsDataReady(handle: TpHandle) -> BOOL8;
        pub fn ScpIsDataOverflow(handle: TpHandle) -> BOOL8;

        pub fn ScpGetMeasureModes(handle: TpHandle) -> u32;
        pub fn ScpGetMeasureMode(handle: TpHandle) -> u32;
        pub fn ScpSetMeasureMode(handle: TpHandle, value: u32) -> u32;
        pub fn ScpGetResolutions(handle: TpHandle, list: *mut u8, length: u32) -> u32;
        pub fn ScpGetResolution(handle: TpHandle) -> u8;
        pub fn ScpSetResolution(handle: TpHandle, value: u8) -> u8;
        pub fn ScpIsResolutionEnhanced(handle: TpHandle) -> BOOL8;
        pub fn ScpGetAutoResolutionModes(handle: TpHandle) -> u32;
        pub fn ScpGetAutoResolutionMode(handle: TpHandle) -> u32;
        pub fn ScpSetAutoResolutionMode(handle: TpHandle, value: u32) -> u32;
        pub fn ScpGetClockSources(handle: TpHandle) -> u32;
        pub fn ScpGetClockSource(handle: TpHandle) -> u32;
        pub fn ScpSetClockSource(handle: TpHandle, value: u32) -> u32;
        pub fn ScpGetClockSourceFrequencies(handle: TpHandle, list: *mut f64, length: u32)
            -> u32;
        pub fn ScpGetClockSourceFrequency(handle: TpHandle) -> f64;
        pub fn ScpSetClockSourceFrequency(handle: TpHandle, value: f64) -> f64;
        pub fn ScpGetClockOutputs(handle: TpHandle) -> u32;
        pub fn ScpGetClockOutput(handle: TpHandle) -> u32;
        pub fn ScpSetClockOutput(handle: TpHandle, value: u32) -> u32;
        pub fn ScpGetClockOutputFrequencies(handle: TpHandle, list: *mut f64, length: u32)
            -> u32;
        pub fn ScpGetClockOutputFrequency(handle: TpHandle) -> f64;
        pub fn ScpSetClockOutputFrequency(handle: TpHandle, value: f64) -> f64;
        pub fn ScpGetSampleFrequencyMax(handle: TpHandle) -> f64;
        pub fn ScpGetSampleFrequency(handle: TpHandle) -> f64;
        pub fn ScpSetSampleFrequency(handle: TpHandle, value: f64) -> f64;
        pub fn ScpVerifySampleFrequency(handle: TpHandle, value: f64) -> f64;
        pub fn ScpGetRecordLengthMax(handle: TpHandle) -> u64;
        pub fn ScpGetRecordLength(handle: TpHandle) -> u64;
        pub fn ScpSetRecordLength(handle: TpHandle, value: u64) -> u64;
        pub fn ScpVerifyRecordLength(handle: TpHandle, value: u64) -> u64;
        pub fn ScpGetPreSampleRatio(handle: TpHandle) -> f64;
        pub fn ScpSetPreSampleRatio(handle: TpHandle, value: f64) -> f64;
        pub fn ScpGetSegmentCountMax(handle: TpHandle) -> u32;
        pub fn ScpGetSegmentCount(handle: TpHandle) -> u32;
        pub fn ScpSetSegmentCount(handle: TpHandle, value: u32) -> u32;
        pub fn ScpVerifySegmentCount(handle: TpHandle, value: u32) -> u32;
        pub fn ScpHasTrigger(handle: TpHandle) -> BOOL8;
        pub fn ScpGetTriggerTimeOut(handle: TpHandle) -> f64;
        pub fn ScpSetTriggerTimeOut(handle: TpHandle, value: f64) -> f64;
        pub fn ScpVerifyTriggerTimeOut(handle: TpHandle, value: f64) -> f64;
        pub fn ScpHasTriggerDelay(handle: TpHandle) -> BOOL8;
        pub fn ScpGetTriggerDelayMax(handle: TpHandle) -> f64;
        pub fn ScpGetTriggerDelay(handle: TpHandle) -> f64;
        pub fn ScpSetTriggerDelay(handle: TpHandle, value: f64) -> f64;
        pub fn ScpVerifyTriggerDelay(handle: TpHandle, value: f64) -> f64;
        pub fn ScpHasTriggerHoldOff(handle: TpHandle) -> BOOL8;
        pub fn ScpGetTriggerHoldOffCountMax(handle: TpHandle) -> u64;
        pub fn ScpGetTriggerHoldOffCount(handle: TpHandle) -> u64;
        pub fn ScpSetTriggerHoldOffCount(handle: TpHandle, value: u64) -> u64;
        pub fn ScpHasConnectionTest(handle: TpHandle) -> BOOL8;
        pub fn ScpStartConnectionTest(handle: TpHandle) -> BOOL8;
        pub fn ScpIsConnectionTestCompleted(handle: TpHandle) -> BOOL8;
        pub fn ScpGetConnectionTestData(handle: TpHandle, buffer: *mut u8, length: u16) -> u16;

        pub fn GenGetConnectorType(handle: TpHandle) -> u32;
        pub fn GenIsDifferential(handle: TpHandle) -> BOOL8;
        pub fn GenGetImpedance(handle: TpHandle) -> f64;
        pub fn GenGetResolution(handle: TpHandle) -> u8;
        pub fn GenGetOutputValueMin(handle: TpHandle) -> f64;
        pub fn GenGetOutputValueMax(handle: TpHandle) -> f64;
        pub fn GenIsControllable(handle: TpHandle) -> BOOL8;
        pub fn GenGetStatus(handle: TpHandle) -> u32;
        pub fn GenGetOutputOn(handle: TpHandle) -> BOOL8;
        pub fn GenSetOutputOn(handle: TpHandle, value: BOOL8) -> BOOL8;
        pub fn GenGetOutputInvert(handle: TpHandle) -> BOOL8;
        pub fn GenSetOutputInvert(handle: TpHandle, value: BOOL8) -> BOOL8;
        pub fn GenStart(handle: TpHandle) -> BOOL8;
        pub fn GenStop(handle: TpHandle) -> BOOL8;
        pub fn GenGetSignalTypes(handle: TpHandle) -> u32;
        pub fn GenGetSignalType(handle: TpHandle) -> u32;
        pub fn GenSetSignalType(handle: TpHandle, value: u32) -> u32;
        pub fn GenGetAmplitudeMin(handle: TpHandle) -> f64;
        pub fn GenGetAmplitudeMax(handle: TpHandle) -> f64;
        pub fn GenGetAmplitude(handle: TpHandle) -> f64;
        pub fn GenSetAmplitude(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetAmplitudeRanges(handle: TpHandle, list: *mut f64, length: u32) -> u32;
        pub fn GenGetAmplitudeRange(handle: TpHandle) -> f64;
        pub fn GenSetAmplitudeRange(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetAmplitudeAutoRanging(handle: TpHandle) -> BOOL8;
        pub fn GenSetAmplitudeAutoRanging(handle: TpHandle, value: BOOL8) -> BOOL8;
        pub fn GenGetOffsetMin(handle: TpHandle) -> f64;
        pub fn GenGetOffsetMax(handle: TpHandle) -> f64;
        pub fn GenGetOffset(handle: TpHandle) -> f64;
        pub fn GenSetOffset(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetFrequencyModes(handle: TpHandle) -> u32;
        pub fn GenGetFrequencyMode(handle: TpHandle) -> u32;
        pub fn GenSetFrequencyMode(handle: TpHandle, value: u32) -> u32;
        pub fn GenGetFrequencyMin(handle: TpHandle) -> f64;
        pub fn GenGetFrequencyMax(handle: TpHandle) -> f64;
        pub fn GenGetFrequency(handle: TpHandle) -> f64;
        pub fn GenSetFrequency(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetPhaseMin(handle: TpHandle) -> f64;
        pub fn GenGetPhaseMax(handle: TpHandle) -> f64;
        pub fn GenGetPhase(handle: TpHandle) -> f64;
        pub fn GenSetPhase(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetSymmetryMin(handle: TpHandle) -> f64;
        pub fn GenGetSymmetryMax(handle: TpHandle) -> f64;
        pub fn GenGetSymmetry(handle: TpHandle) -> f64;
        pub fn GenSetSymmetry(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetWidthMin(handle: TpHandle) -> f64;
        pub fn GenGetWidthMax(handle: TpHandle) -> f64;
        pub fn GenGetWidth(handle: TpHandle) -> f64;
        pub fn GenSetWidth(handle: TpHandle, value: f64) -> f64;
        pub fn GenGetDataLengthMin(handle: TpHandle) -> u64;
        pub fn GenGetDataLengthMax(handle: TpHandle) -> u64;
        pub fn GenGetDataLength(handle: TpHandle) -> u64;
        pub fn GenSetData(handle: TpHandle, buffer: *const f32, length: u64);
        pub fn GenGetModesNative(handle: TpHandle) -> u64;
        pub fn GenGetModes(handle: TpHandle) -> u64;
        pub fn GenGetMode(handle: TpHandle) -> u64;
        pub fn GenSetMode(handle: TpHandle, value: u64) -> u64;
        pub fn GenIsBurstActive(handle: TpHandle) -> BOOL8;
        pub fn GenGetBurstCountMin(handle: TpHandle) -> u64;
        pub fn GenGetBurstCountMax(handle: TpHandle) -> u64;
        pub fn GenGetBurstCount(handle: TpHandle) -> u64;
        pub fn GenSetBurstCount(handle: TpHandle, value: u64) -> u64;
        pub fn GenGetBurstSampleCountMin(handle: TpHandle) -> u64;
        pub fn GenGetBurstSampleCountMax(handle: TpHandle) -> u64;
        pub fn GenGetBurstSampleCount(handle: TpHandle) -> u64;
        pub fn GenSetBurstSampleCount(handle: TpHandle, value: u64) -> u64;
        pub fn GenGetBurstSegmentCountMin(handle: TpHandle) -> u64;
        pub fn GenGetBurstSegmentCountMax(handle: TpHandle) -> u64;
        pub fn GenGetBurstSegmentCount(handle: TpHandle) -> u64;
        pub fn GenSetBurstSegmentCount(handle: TpHandle, value: u64) -> u64;

        pub fn I2CIsInternalAddress(handle: TpHandle, address: u16) -> BOOL8;
        pub fn I2CRead(
            handle: TpHandle,
            address: u16,
            buffer: *mut c_void,
            size: u32,
            stop: BOOL8,
        ) -> BOOL8;
        pub fn I2CWrite(
            handle: TpHandle,
            address: u16,
            buffer: *const c_void,
            size: u32,
            stop: BOOL8,
        ) -> BOOL8;
        pub fn I2CGetSpeedMax(handle: TpHandle) -> f64;
        pub fn I2CGetSpeed(handle: TpHandle) -> f64;
        pub fn I2CSetSpeed(handle: TpHandle, value: f64) -> f64;
    }
}

/// List entries are addressed by index.
const IDKIND_INDEX: u32 = 2;

static INIT: OnceLock<()> = OnceLock::new();

fn bool8(value: bool) -> ffi::BOOL8 {
    u8::from(value)
}

/// Read a string through the SDK's two-pass buffer protocol: ask for the
/// length with a null buffer, then fill.
fn read_string(read: impl Fn(*mut c_char, u32) -> u32) -> String {
    let length = read(ptr::null_mut(), 0);
    if length == 0 {
        return String::new();
    }
    let mut buffer = vec![0u8; length as usize + 1];
    read(buffer.as_mut_ptr().cast(), length + 1);
    CStr::from_bytes_until_nul(&buffer)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_list<T: Default + Clone>(read: impl Fn(*mut T, u32) -> u32) -> Vec<T> {
    let length = read(ptr::null_mut(), 0);
    let mut list = vec![T::default(); length as usize];
    let written = read(list.as_mut_ptr(), length);
    list.truncate(written as usize);
    list
}

/// The process-wide libtiepie instance.
#[derive(Debug, Default)]
pub struct LibTiePie {
    /// Status for calls this binding refuses before reaching the library.
    refused: Mutex<Option<StatusCode>>,
}

impl LibTiePie {
    /// Initialise the library on first use.
    pub fn init() -> Result<Self> {
        INIT.get_or_init(|| unsafe { ffi::LibInit() });
        if unsafe { ffi::LibIsInitialized() } == 0 {
            return Err(HandyscopeError::NativeCall {
                status: StatusCode::INITIALIZATION_FAILED,
                message: "libtiepie could not be initialised".to_string(),
            });
        }
        let sdk = Self::default();
        log::info!(
            "libtiepie {} initialised",
            crate::session::format_version(sdk.library_version())
        );
        Ok(sdk)
    }

    fn refuse<T>(&self, status: StatusCode, neutral: T) -> T {
        if let Ok(mut refused) = self.refused.lock() {
            *refused = Some(status);
        }
        neutral
    }

    fn clear(&self) {
        if let Ok(mut refused) = self.refused.lock() {
            *refused = None;
        }
    }

    fn refused(&self) -> Option<StatusCode> {
        self.refused.lock().ok().and_then(|refused| *refused)
    }
}

impl Sdk for LibTiePie {
    fn last_status(&self) -> StatusCode {
        self.refused()
            .unwrap_or_else(|| StatusCode(unsafe { ffi::LibGetLastStatus() }))
    }

    fn last_status_str(&self) -> String {
        if let Some(status) = self.refused() {
            return status.name().to_string();
        }
        let message = unsafe { ffi::LibGetLastStatusStr() };
        if message.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }

    fn library_version(&self) -> u64 {
        unsafe { ffi::LibGetVersion() }
    }

    fn lst_update(&self) {
        self.clear();
        unsafe { ffi::LstUpdate() }
    }

    fn lst_count(&self) -> u32 {
        self.clear();
        unsafe { ffi::LstGetCount() }
    }

    fn lst_dev_name(&self, index: u32, kind: NameKind) -> String {
        self.clear();
        read_string(|buffer, length| unsafe {
            match kind {
                NameKind::Long => ffi::LstDevGetName(IDKIND_INDEX, index, buffer, length),
                NameKind::Short => ffi::LstDevGetNameShort(IDKIND_INDEX, index, buffer, length),
                NameKind::Shortest => {
                    ffi::LstDevGetNameShortest(IDKIND_INDEX, index, buffer, length)
                }
            }
        })
    }

    fn lst_dev_field(&self, index: u32, field: ListField) -> u64 {
        self.clear();
        unsafe {
            match field {
                ListField::ProductId => u64::from(ffi::LstDevGetProductId(IDKIND_INDEX, index)),
                ListField::SerialNumber => {
                    u64::from(ffi::LstDevGetSerialNumber(IDKIND_INDEX, index))
                }
                ListField::Types => u64::from(ffi::LstDevGetTypes(IDKIND_INDEX, index)),
                ListField::DriverVersion => ffi::LstDevGetDriverVersion(IDKIND_INDEX, index),
                ListField::FirmwareVersion => ffi::LstDevGetFirmwareVersion(IDKIND_INDEX, index),
                ListField::CalibrationDate => {
                    u64::from(ffi::LstDevGetCalibrationDate(IDKIND_INDEX, index))
                }
            }
        }
    }

    fn lst_dev_can_open(&self, index: u32, device_type: u64) -> bool {
        self.clear();
        unsafe { ffi::LstDevCanOpen(IDKIND_INDEX, index, device_type as u32) != 0 }
    }

    fn lst_open_device(&self, id_kind: u64, id: u64, device_type: u64) -> Handle {
        self.clear();
        unsafe { ffi::LstOpenDevice(id_kind as u32, id as u32, device_type as u32) }
    }

    fn close(&self, handle: Handle) {
        self.clear();
        unsafe {
            ffi::ObjClose(handle);
        }
    }

    fn get_bool(&self, h: Handle, property: BoolProperty) -> bool {
        use BoolProperty::*;
        self.clear();
        let value = unsafe {
            match property {
                DevIsRemoved => ffi::ObjIsRemoved(h),
                TrInEnabled(i) => ffi::DevTrInGetEnabled(h, i),
                TrInIsAvailable(i) => ffi::DevTrInIsAvailable(h, i),
                TrOutEnabled(i) => ffi::DevTrOutGetEnabled(h, i),
                ScpIsRunning => ffi::ScpIsRunning(h),
                ScpIsTriggered => ffi::ScpIsTriggered(h),
                ScpIsTimeoutTriggered => ffi::ScpIsTimeOutTriggered(h),
                ScpIsForceTriggered => ffi::ScpIsForceTriggered(h),
                ScpIsDataReady => ffi::ScpIsDataReady(h),
                ScpIsDataOverflow => ffi::ScpIsDataOverflow(h),
                ScpIsResolutionEnhanced => ffi::ScpIsResolutionEnhanced(h),
                ScpHasTrigger => ffi::ScpHasTrigger(h),
                ScpHasTriggerDelay => ffi::ScpHasTriggerDelay(h),
                ScpHasTriggerHoldOff => ffi::ScpHasTriggerHoldOff(h),
                ScpHasConnectionTest => ffi::ScpHasConnectionTest(h),
                ScpIsConnectionTestCompleted => ffi::ScpIsConnectionTestCompleted(h),
                ChIsAvailable(ch) => ffi::ScpChIsAvailable(h, ch),
                ChIsDifferential(ch) => ffi::ScpChIsDifferential(h, ch),
                ChEnabled(ch) => ffi::ScpChGetEnabled(h, ch),
                ChAutoRanging(ch) => ffi::ScpChGetAutoRanging(h, ch),
                ChHasTrigger(ch) => ffi::ScpChHasTrigger(h, ch),
                ChTrEnabled(ch) => ffi::ScpChTrGetEnabled(h, ch),
                ChHasConnectionTest(ch) => ffi::ScpChHasConnectionTest(h, ch),
                GenIsDifferential => ffi::GenIsDifferential(h),
                GenIsControllable => ffi::GenIsControllable(h),
                GenOutputOn => ffi::GenGetOutputOn(h),
                GenOutputInvert => ffi::GenGetOutputInvert(h),
                GenAmplitudeAutoRanging => ffi::GenGetAmplitudeAutoRanging(h),
                GenIsBurstActive => ffi::GenIsBurstActive(h),
            }
        };
        value != 0
    }

    fn set_bool(&self, h: Handle, property: BoolProperty, value: bool) -> bool {
        use BoolProperty::*;
        self.clear();
        let v = bool8(value);
        let accepted = unsafe {
            match property {
                TrInEnabled(i) => ffi::DevTrInSetEnabled(h, i, v),
                TrOutEnabled(i) => ffi::DevTrOutSetEnabled(h, i, v),
                ChEnabled(ch) => ffi::ScpChSetEnabled(h, ch, v),
                ChAutoRanging(ch) => ffi::ScpChSetAutoRanging(h, ch, v),
                ChTrEnabled(ch) => ffi::ScpChTrSetEnabled(h, ch, v),
                GenOutputOn => ffi::GenSetOutputOn(h, v),
                GenOutputInvert => ffi::GenSetOutputInvert(h, v),
                GenAmplitudeAutoRanging => ffi::GenSetAmplitudeAutoRanging(h, v),
                _ => return self.refuse(StatusCode::NOT_SUPPORTED, false),
            }
        };
        accepted != 0
    }

    fn get_int(&self, h: Handle, property: IntProperty) -> u64 {
        use IntProperty::*;
        self.clear();
        unsafe {
            match property {
                DevDriverVersion => ffi::DevGetDriverVersion(h),
                DevFirmwareVersion => ffi::DevGetFirmwareVersion(h),
                DevCalibrationDate => u64::from(ffi::DevGetCalibrationDate(h)),
                DevSerialNumber => u64::from(ffi::DevGetSerialNumber(h)),
                DevProductId => u64::from(ffi::DevGetProductId(h)),
                DevTriggerInputCount => u64::from(ffi::DevTrGetInputCount(h)),
                DevTriggerOutputCount => u64::from(ffi::DevTrGetOutputCount(h)),
                TrInKinds(i) => ffi::DevTrInGetKinds(h, i),
                TrInKind(i) => ffi::DevTrInGetKind(h, i),
                TrInId(i) => u64::from(ffi::DevTrInGetId(h, i)),
                TrOutEvents(i) => ffi::DevTrOutGetEvents(h, i),
                TrOutEvent(i) => ffi::DevTrOutGetEvent(h, i),
                TrOutId(i) => u64::from(ffi::DevTrOutGetId(h, i)),

                ScpChannelCount => u64::from(ffi::ScpGetChannelCount(h)),
                ScpMeasureModes => u64::from(ffi::ScpGetMeasureModes(h)),
                ScpMeasureMode => u64::from(ffi::ScpGetMeasureMode(h)),
                ScpResolution => u64::from(ffi::ScpGetResolution(h)),
                ScpAutoResolutionModes => u64::from(ffi::ScpGetAutoResolutionModes(h)),
                ScpAutoResolutionMode => u64::from(ffi::ScpGetAutoResolutionMode(h)),
                ScpClockSources => u64::from(ffi::ScpGetClockSources(h)),
                ScpClockSource => u64::from(ffi::ScpGetClockSource(h)),
                ScpClockOutputs => u64::from(ffi::ScpGetClockOutputs(h)),
                ScpClockOutput => u64::from(ffi::ScpGetClockOutput(h)),
                ScpRecordLengthMax => ffi::ScpGetRecordLengthMax(h),
                ScpRecordLength => ffi::ScpGetRecordLength(h),
                ScpSegmentCountMax => u64::from(ffi::ScpGetSegmentCountMax(h)),
                ScpSegmentCount => u64::from(ffi::ScpGetSegmentCount(h)),
                ScpTriggerHoldOffCountMax => ffi::ScpGetTriggerHoldOffCountMax(h),
                ScpTriggerHoldOffCount => ffi::ScpGetTriggerHoldOffCount(h),
                ScpValidPreSampleCount => ffi::ScpGetValidPreSampleCount(h),

                ChConnectorType(ch) => u64::from(ffi::ScpChGetConnectorType(h, ch)),
                ChCouplings(ch) => ffi::ScpChGetCouplings(h, ch),
                ChCoupling(ch) => ffi::ScpChGetCoupling(h, ch),
                ChTrKinds(ch) => ffi::ScpChTrGetKinds(h, ch),
                ChTrKind(ch) => ffi::ScpChTrGetKind(h, ch),
                ChTrLevelModes(ch) => u64::from(ffi::ScpChTrGetLevelModes(h, ch)),
                ChTrLevelMode(ch) => u64::from(ffi::ScpChTrGetLevelMode(h, ch)),
                ChTrLevelCount(ch) => u64::from(ffi::ScpChTrGetLevelCount(h, ch)),
                ChTrHysteresisCount(ch) => u64::from(ffi::ScpChTrGetHysteresisCount(h, ch)),
                ChTrConditions(ch) => u64::from(ffi::ScpChTrGetConditions(h, ch)),
                ChTrCondition(ch) => u64::from(ffi::ScpChTrGetCondition(h, ch)),
                ChTrTimeCount(ch) => u64::from(ffi::ScpChTrGetTimeCount(h, ch)),
                ChDataRawType(ch) => u64::from(ffi::ScpChGetDataRawType(h, ch)),

                GenConnectorType => u64::from(ffi::GenGetConnectorType(h)),
                GenResolution => u64::from(ffi::GenGetResolution(h)),
                GenStatus => u64::from(ffi::GenGetStatus(h)),
                GenSignalTypes => u64::from(ffi::GenGetSignalTypes(h)),
                GenSignalType => u64::from(ffi::GenGetSignalType(h)),
                GenFrequencyModes => u64::from(ffi::GenGetFrequencyModes(h)),
                GenFrequencyMode => u64::from(ffi::GenGetFrequencyMode(h)),
                GenDataLengthMin => ffi::GenGetDataLengthMin(h),
                GenDataLengthMax => ffi::GenGetDataLengthMax(h),
                GenDataLength => ffi::GenGetDataLength(h),
                GenModesNative => ffi::GenGetModesNative(h),
                GenModes => ffi::GenGetModes(h),
                GenMode => ffi::GenGetMode(h),
                GenBurstCountMin => ffi::GenGetBurstCountMin(h),
                GenBurstCountMax => ffi::GenGetBurstCountMax(h),
                GenBurstCount => ffi::GenGetBurstCount(h),
                GenBurstSampleCountMin => ffi::GenGetBurstSampleCountMin(h),
                GenBurstSampleCountMax => ffi::GenGetBurstSampleCountMax(h),
                GenBurstSampleCount => ffi::GenGetBurstSampleCount(h),
                GenBurstSegmentCountMin => ffi::GenGetBurstSegmentCountMin(h),
                GenBurstSegmentCountMax => ffi::GenGetBurstSegmentCountMax(h),
                GenBurstSegmentCount => ffi::GenGetBurstSegmentCount(h),
            }
        }
    }

    fn set_int(&self, h: Handle, property: IntProperty, value: u64) -> u64 {
        use IntProperty::*;
        self.clear();
        let narrow = value as u32;
        unsafe {
            match property {
                TrInKind(i) => ffi::DevTrInSetKind(h, i, value),
                TrOutEvent(i) => ffi::DevTrOutSetEvent(h, i, value),
                ScpMeasureMode => u64::from(ffi::ScpSetMeasureMode(h, narrow)),
                ScpResolution => u64::from(ffi::ScpSetResolution(h, value as u8)),
                ScpAutoResolutionMode => u64::from(ffi::ScpSetAutoResolutionMode(h, narrow)),
                ScpClockSource => u64::from(ffi::ScpSetClockSource(h, narrow)),
                ScpClockOutput => u64::from(ffi::ScpSetClockOutput(h, narrow)),
                ScpRecordLength => ffi::ScpSetRecordLength(h, value),
                ScpSegmentCount => u64::from(ffi::ScpSetSegmentCount(h, narrow)),
                ScpTriggerHoldOffCount => ffi::ScpSetTriggerHoldOffCount(h, value),
                ChCoupling(ch) => ffi::ScpChSetCoupling(h, ch, value),
                ChTrKind(ch) => ffi::ScpChTrSetKind(h, ch, value),
                ChTrLevelMode(ch) => u64::from(ffi::ScpChTrSetLevelMode(h, ch, narrow)),
                ChTrCondition(ch) => u64::from(ffi::ScpChTrSetCondition(h, ch, narrow)),
                GenSignalType => u64::from(ffi::GenSetSignalType(h, narrow)),
                GenFrequencyMode => u64::from(ffi::GenSetFrequencyMode(h, narrow)),
                GenMode => ffi::GenSetMode(h, value),
                GenBurstCount => ffi::GenSetBurstCount(h, value),
                GenBurstSampleCount => ffi::GenSetBurstSampleCount(h, value),
                GenBurstSegmentCount => ffi::GenSetBurstSegmentCount(h, value),
                _ => self.refuse(StatusCode::NOT_SUPPORTED, 0),
            }
        }
    }

    fn get_float(&self, h: Handle, property: FloatProperty) -> f64 {
        use FloatProperty::*;
        self.clear();
        unsafe {
            match property {
                ScpClockSourceFrequency => ffi::ScpGetClockSourceFrequency(h),
                ScpClockOutputFrequency => ffi::ScpGetClockOutputFrequency(h),
                ScpSampleFrequencyMax => ffi::ScpGetSampleFrequencyMax(h),
                ScpSampleFrequency => ffi::ScpGetSampleFrequency(h),
                ScpPreSampleRatio => ffi::ScpGetPreSampleRatio(h),
                ScpTriggerTimeOut => ffi::ScpGetTriggerTimeOut(h),
                ScpTriggerDelayMax => ffi::ScpGetTriggerDelayMax(h),
                ScpTriggerDelay => ffi::ScpGetTriggerDelay(h),

                ChImpedance(ch) => ffi::ScpChGetImpedance(h, ch),
                ChProbeGain(ch) => ffi::ScpChGetProbeGain(h, ch),
                ChProbeOffset(ch) => ffi::ScpChGetProbeOffset(h, ch),
                ChRange(ch) => ffi::ScpChGetRange(h, ch),
                ChDataValueMin(ch) => ffi::ScpChGetDataValueMin(h, ch),
                ChDataValueMax(ch) => ffi::ScpChGetDataValueMax(h, ch),
                ChTrLevel(ch, i) => ffi::ScpChTrGetLevel(h, ch, i),
                ChTrHysteresis(ch, i) => ffi::ScpChTrGetHysteresis(h, ch, i),
                ChTrTime(ch, i) => ffi::ScpChTrGetTime(h, ch, i),

                GenImpedance => ffi::GenGetImpedance(h),
                GenOutputValueMin => ffi::GenGetOutputValueMin(h),
                GenOutputValueMax => ffi::GenGetOutputValueMax(h),
                GenAmplitudeMin => ffi::GenGetAmplitudeMin(h),
                GenAmplitudeMax => ffi::GenGetAmplitudeMax(h),
                GenAmplitude => ffi::GenGetAmplitude(h),
                GenAmplitudeRange => ffi::GenGetAmplitudeRange(h),
                GenOffsetMin => ffi::GenGetOffsetMin(h),
                GenOffsetMax => ffi::GenGetOffsetMax(h),
                GenOffset => ffi::GenGetOffset(h),
                GenFrequencyMin => ffi::GenGetFrequencyMin(h),
                GenFrequencyMax => ffi::GenGetFrequencyMax(h),
                GenFrequency => ffi::GenGetFrequency(h),
                GenPhaseMin => ffi::GenGetPhaseMin(h),
                GenPhaseMax => ffi::GenGetPhaseMax(h),
                GenPhase => ffi::GenGetPhase(h),
                GenSymmetryMin => ffi::GenGetSymmetryMin(h),
                GenSymmetryMax => ffi::GenGetSymmetryMax(h),
                GenSymmetry => ffi::GenGetSymmetry(h),
                GenWidthMin => ffi::GenGetWidthMin(h),
                GenWidthMax => ffi::GenGetWidthMax(h),
                GenWidth => ffi::GenGetWidth(h),

                I2cSpeedMax => ffi::I2CGetSpeedMax(h),
                I2cSpeed => ffi::I2CGetSpeed(h),
            }
        }
    }

    fn set_float(&self, h: Handle, property: FloatProperty, value: f64) -> f64 {
        use FloatProperty::*;
        self.clear();
        unsafe {
            match property {
                ScpClockSourceFrequency => ffi::ScpSetClockSourceFrequency(h, value),
                ScpClockOutputFrequency => ffi::ScpSetClockOutputFrequency(h, value),
                ScpSampleFrequency => ffi::ScpSetSampleFrequency(h, value),
                ScpPreSampleRatio => ffi::ScpSetPreSampleRatio(h, value),
                ScpTriggerTimeOut => ffi::ScpSetTriggerTimeOut(h, value),
                ScpTriggerDelay => ffi::ScpSetTriggerDelay(h, value),
                ChProbeGain(ch) => ffi::ScpChSetProbeGain(h, ch, value),
                ChProbeOffset(ch) => ffi::ScpChSetProbeOffset(h, ch, value),
                ChRange(ch) => ffi::ScpChSetRange(h, ch, value),
                ChTrLevel(ch, i) => ffi::ScpChTrSetLevel(h, ch, i, value),
                ChTrHysteresis(ch, i) => ffi::ScpChTrSetHysteresis(h, ch, i, value),
                ChTrTime(ch, i) => ffi::ScpChTrSetTime(h, ch, i, value),
                GenAmplitude => ffi::GenSetAmplitude(h, value),
                GenAmplitudeRange => ffi::GenSetAmplitudeRange(h, value),
                GenOffset => ffi::GenSetOffset(h, value),
                GenFrequency => ffi::GenSetFrequency(h, value),
                GenPhase => ffi::GenSetPhase(h, value),
                GenSymmetry => ffi::GenSetSymmetry(h, value),
                GenWidth => ffi::GenSetWidth(h, value),
                I2cSpeed => ffi::I2CSetSpeed(h, value),
                _ => self.refuse(StatusCode::NOT_SUPPORTED, 0.0),
            }
        }
    }

    fn verify_int(&self, h: Handle, property: IntProperty, value: u64) -> u64 {
        self.clear();
        unsafe {
            match property {
                IntProperty::ScpRecordLength => ffi::ScpVerifyRecordLength(h, value),
                IntProperty::ScpSegmentCount => {
                    u64::from(ffi::ScpVerifySegmentCount(h, value as u32))
                }
                _ => self.refuse(StatusCode::NOT_SUPPORTED, 0),
            }
        }
    }

    fn verify_float(&self, h: Handle, property: FloatProperty, value: f64) -> f64 {
        self.clear();
        unsafe {
            match property {
                FloatProperty::ScpSampleFrequency => ffi::ScpVerifySampleFrequency(h, value),
                FloatProperty::ScpTriggerTimeOut => ffi::ScpVerifyTriggerTimeOut(h, value),
                FloatProperty::ScpTriggerDelay => ffi::ScpVerifyTriggerDelay(h, value),
                _ => self.refuse(StatusCode::NOT_SUPPORTED, 0.0),
            }
        }
    }

    fn get_list(&self, h: Handle, property: ListProperty) -> Vec<f64> {
        self.clear();
        read_list(|list, length| unsafe {
            match property {
                ListProperty::ChRanges(ch) => ffi::ScpChGetRanges(h, ch, list, length),
                ListProperty::ScpClockSourceFrequencies => {
                    ffi::ScpGetClockSourceFrequencies(h, list, length)
                }
                ListProperty::ScpClockOutputFrequencies => {
                    ffi::ScpGetClockOutputFrequencies(h, list, length)
                }
                ListProperty::GenAmplitudeRanges => ffi::GenGetAmplitudeRanges(h, list, length),
            }
        })
    }

    fn get_string(&self, h: Handle, property: StringProperty) -> String {
        self.clear();
        read_string(|buffer, length| unsafe {
            match property {
                StringProperty::DevName => ffi::DevGetName(h, buffer, length),
                StringProperty::DevNameShort => ffi::DevGetNameShort(h, buffer, length),
                StringProperty::DevNameShortest => ffi::DevGetNameShortest(h, buffer, length),
                StringProperty::TrInName(i) => ffi::DevTrInGetName(h, i, buffer, length),
                StringProperty::TrOutName(i) => ffi::DevTrOutGetName(h, i, buffer, length),
            }
        })
    }

    fn resolutions(&self, h: Handle) -> Vec<u8> {
        self.clear();
        read_list(|list, length| unsafe { ffi::ScpGetResolutions(h, list, length) })
    }

    fn action(&self, h: Handle, action: Action) -> bool {
        self.clear();
        let done = unsafe {
            match action {
                Action::ScpStart => ffi::ScpStart(h),
                Action::ScpStop => ffi::ScpStop(h),
                Action::ScpForceTrigger => ffi::ScpForceTrigger(h),
                Action::ScpStartConnectionTest => ffi::ScpStartConnectionTest(h),
                Action::GenStart => ffi::GenStart(h),
                Action::GenStop => ffi::GenStop(h),
                Action::TrOutTrigger(i) => ffi::DevTrOutTrigger(h, i),
            }
        };
        done != 0
    }

    fn get_data(
        &self,
        h: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<Vec<f32>>> {
        self.clear();
        let mut buffers: Vec<Option<Vec<f32>>> = channels
            .iter()
            .map(|wanted| wanted.then(|| vec![0.0; length as usize]))
            .collect();
        let mut pointers: Vec<*mut f32> = buffers
            .iter_mut()
            .map(|buffer| {
                buffer
                    .as_mut()
                    .map_or(ptr::null_mut(), |samples| samples.as_mut_ptr())
            })
            .collect();
        let read = unsafe {
            ffi::ScpGetData(
                h,
                pointers.as_mut_ptr(),
                pointers.len() as u16,
                start,
                length,
            )
        };
        for samples in buffers.iter_mut().flatten() {
            samples.truncate(read as usize);
        }
        buffers
    }

    fn get_data_raw(
        &self,
        h: Handle,
        channels: &[bool],
        start: u64,
        length: u64,
    ) -> Vec<Option<RawSamples>> {
        let mut buffers = Vec::with_capacity(channels.len());
        for (ch, wanted) in (0u16..).zip(channels) {
            if !*wanted {
                buffers.push(None);
                continue;
            }
            let code = self.get_int(h, IntProperty::ChDataRawType(ch));
            if !self.last_status().is_success() {
                return vec![None; channels.len()];
            }
            match RawSamples::zeroed(code, length as usize) {
                Some(samples) => buffers.push(Some(samples)),
                None => return self.refuse(StatusCode::NOT_SUPPORTED, vec![None; channels.len()]),
            }
        }
        self.clear();
        let mut pointers: Vec<*mut c_void> = buffers
            .iter_mut()
            .map(|buffer| match buffer {
                Some(raw) => each_raw!(raw, samples => samples.as_mut_ptr().cast::<c_void>()),
                None => ptr::null_mut(),
            })
            .collect();
        let read = unsafe {
            ffi::ScpGetDataRaw(
                h,
                pointers.as_mut_ptr(),
                pointers.len() as u16,
                start,
                length,
            )
        };
        for samples in buffers.iter_mut().flatten() {
            samples.truncate(read as usize);
        }
        buffers
    }

    fn raw_value_range(&self, h: Handle, ch: u16) -> (i64, i64, i64) {
        self.clear();
        let (mut min, mut zero, mut max) = (0i64, 0i64, 0i64);
        unsafe { ffi::ScpChGetDataRawValueRange(h, ch, &mut min, &mut zero, &mut max) };
        (min, zero, max)
    }

    fn connection_test_data(&self, h: Handle, channel_count: u16) -> Vec<u8> {
        self.clear();
        let mut states = vec![0u8; usize::from(channel_count)];
        let read = unsafe { ffi::ScpGetConnectionTestData(h, states.as_mut_ptr(), channel_count) };
        states.truncate(usize::from(read));
        states
    }

    fn gen_set_data(&self, h: Handle, data: &[f32]) {
        self.clear();
        unsafe { ffi::GenSetData(h, data.as_ptr(), data.len() as u64) }
    }

    fn i2c_is_internal_address(&self, h: Handle, address: u16) -> bool {
        self.clear();
        unsafe { ffi::I2CIsInternalAddress(h, address) != 0 }
    }

    fn i2c_read(&self, h: Handle, address: u16, length: usize, stop: bool) -> Vec<u8> {
        self.clear();
        let mut data = vec![0u8; length];
        let ok = unsafe {
            ffi::I2CRead(
                h,
                address,
                data.as_mut_ptr().cast::<c_void>(),
                length as u32,
                bool8(stop),
            )
        };
        if ok == 0 {
            data.clear();
        }
        data
    }

    fn i2c_write(&self, h: Handle, address: u16, data: &[u8], stop: bool) -> bool {
        self.clear();
        unsafe {
            ffi::I2CWrite(
                h,
                address,
                data.as_ptr().cast::<c_void>(),
                data.len() as u32,
                bool8(stop),
            ) != 0
        }
    }
}
