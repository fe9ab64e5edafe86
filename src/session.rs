//! An open native device handle and the properties every device shares.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::SessionConfig;
use crate::error::{HandyscopeError, Result};
use crate::registry::{self, Domain};
use crate::sdk::{
    Action, BoolProperty, FloatProperty, Handle, IntProperty, ListProperty, Sdk, StringProperty,
};
use crate::status::checked;
use crate::trigger::{TriggerInput, TriggerOutput};

/// The capability a device was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Oscilloscope,
    Generator,
    I2cHost,
}

impl DeviceKind {
    pub const ALL: [Self; 3] = [Self::Oscilloscope, Self::Generator, Self::I2cHost];

    /// Native device type bit.
    pub fn code(&self) -> u64 {
        match self {
            Self::Oscilloscope => 1,
            Self::Generator => 2,
            Self::I2cHost => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oscilloscope => "oscilloscope",
            Self::Generator => "generator",
            Self::I2cHost => "i2c host",
        }
    }

    /// Kinds whose bit is set in a native device type mask.
    pub fn from_mask(mask: u64) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|kind| mask & kind.code() != 0)
            .collect()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a packed version (four 16 bit fields) as `major.minor.release.build`.
pub fn format_version(version: u64) -> String {
    format!(
        "{}.{}.{}.{}",
        (version >> 48) & 0xFFFF,
        (version >> 32) & 0xFFFF,
        (version >> 16) & 0xFFFF,
        version & 0xFFFF
    )
}

/// Decode a packed calibration date (`year << 16 | month << 8 | day`).
///
/// Uncalibrated devices report 0, which is not a date.
pub fn decode_calibration_date(packed: u64) -> Option<NaiveDate> {
    let year = (packed >> 16) as i32;
    let month = ((packed >> 8) & 0xFF) as u32;
    let day = (packed & 0xFF) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Owns one native handle.
///
/// Property accessors take `&self`: the device holds the state, and channel
/// and trigger views borrow the session. Closing takes `&mut self`.
pub struct DeviceSession {
    sdk: Arc<dyn Sdk>,
    handle: Option<Handle>,
    kind: DeviceKind,
    product_name: String,
    config: SessionConfig,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("product_name", &self.product_name)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    pub(crate) fn new(
        sdk: Arc<dyn Sdk>,
        handle: Handle,
        kind: DeviceKind,
        product_name: String,
        config: SessionConfig,
    ) -> Self {
        log::debug!("Opened {kind} '{product_name}' as handle {handle}");
        Self {
            sdk,
            handle: Some(handle),
            kind,
            product_name,
            config,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Full product name from the device list entry this session was opened from.
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Result<Handle> {
        self.handle.ok_or(HandyscopeError::SessionClosed)
    }

    pub(crate) fn sdk(&self) -> &dyn Sdk {
        self.sdk.as_ref()
    }

    /// Release the native handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        log::debug!("Closing {} handle {handle}", self.kind);
        checked(self.sdk(), |sdk| sdk.close(handle))
    }

    /// One checked native call against the open handle.
    pub(crate) fn call<T>(&self, call: impl FnOnce(&dyn Sdk, Handle) -> T) -> Result<T> {
        let handle = self.handle()?;
        checked(self.sdk(), |sdk| call(sdk, handle))
    }

    pub(crate) fn get_bool(&self, property: BoolProperty) -> Result<bool> {
        self.call(|sdk, handle| sdk.get_bool(handle, property))
    }

    pub(crate) fn set_bool(&self, property: BoolProperty, value: bool) -> Result<bool> {
        self.call(|sdk, handle| sdk.set_bool(handle, property, value))
    }

    pub(crate) fn get_int(&self, property: IntProperty) -> Result<u64> {
        self.call(|sdk, handle| sdk.get_int(handle, property))
    }

    pub(crate) fn set_int(&self, property: IntProperty, value: u64) -> Result<u64> {
        self.call(|sdk, handle| sdk.set_int(handle, property, value))
    }

    pub(crate) fn verify_int(&self, property: IntProperty, value: u64) -> Result<u64> {
        self.call(|sdk, handle| sdk.verify_int(handle, property, value))
    }

    pub(crate) fn get_float(&self, property: FloatProperty) -> Result<f64> {
        self.call(|sdk, handle| sdk.get_float(handle, property))
    }

    pub(crate) fn set_float(&self, property: FloatProperty, value: f64) -> Result<f64> {
        self.call(|sdk, handle| sdk.set_float(handle, property, value))
    }

    pub(crate) fn verify_float(&self, property: FloatProperty, value: f64) -> Result<f64> {
        self.call(|sdk, handle| sdk.verify_float(handle, property, value))
    }

    pub(crate) fn get_list(&self, property: ListProperty) -> Result<Vec<f64>> {
        self.call(|sdk, handle| sdk.get_list(handle, property))
    }

    pub(crate) fn get_string(&self, property: StringProperty) -> Result<String> {
        self.call(|sdk, handle| sdk.get_string(handle, property))
    }

    pub(crate) fn action(&self, action: Action) -> Result<bool> {
        self.call(|sdk, handle| sdk.action(handle, action))
    }

    /// Read an enumerated property as its label.
    pub(crate) fn get_label(&self, property: IntProperty, domain: Domain) -> Result<&'static str> {
        registry::label_for(domain, self.get_int(property)?)
    }

    /// Set an enumerated property by label and return the label the device applied.
    ///
    /// An unknown label fails before anything reaches the device.
    pub(crate) fn set_label(
        &self,
        property: IntProperty,
        domain: Domain,
        label: &str,
    ) -> Result<&'static str> {
        let code = registry::code_for(domain, label)?;
        let applied = self.set_int(property, code)?;
        registry::label_for(domain, applied)
    }

    /// Read a capability mask as the labels it contains.
    pub(crate) fn get_labels(
        &self,
        property: IntProperty,
        domain: Domain,
    ) -> Result<Vec<&'static str>> {
        Ok(registry::labels_in_mask(domain, self.get_int(property)?))
    }

    pub fn name(&self) -> Result<String> {
        self.get_string(StringProperty::DevName)
    }

    pub fn short_name(&self) -> Result<String> {
        self.get_string(StringProperty::DevNameShort)
    }

    pub fn shortest_name(&self) -> Result<String> {
        self.get_string(StringProperty::DevNameShortest)
    }

    pub fn driver_version(&self) -> Result<String> {
        Ok(format_version(self.get_int(IntProperty::DevDriverVersion)?))
    }

    pub fn firmware_version(&self) -> Result<String> {
        Ok(format_version(self.get_int(IntProperty::DevFirmwareVersion)?))
    }

    pub fn calibration_date(&self) -> Result<Option<NaiveDate>> {
        Ok(decode_calibration_date(
            self.get_int(IntProperty::DevCalibrationDate)?,
        ))
    }

    pub fn serial_number(&self) -> Result<u32> {
        Ok(self.get_int(IntProperty::DevSerialNumber)? as u32)
    }

    pub fn product_id(&self) -> Result<&'static str> {
        self.get_label(IntProperty::DevProductId, Domain::ProductId)
    }

    pub fn is_removed(&self) -> Result<bool> {
        self.get_bool(BoolProperty::DevIsRemoved)
    }

    pub fn trigger_input_count(&self) -> Result<u16> {
        Ok(self.get_int(IntProperty::DevTriggerInputCount)? as u16)
    }

    pub fn trigger_input(&self, index: u16) -> Result<TriggerInput<'_>> {
        let count = self.trigger_input_count()?;
        if index >= count {
            return Err(HandyscopeError::InvalidChannel {
                index: usize::from(index),
                count: usize::from(count),
            });
        }
        Ok(TriggerInput::new(self, index))
    }

    pub fn trigger_inputs(&self) -> Result<Vec<TriggerInput<'_>>> {
        let count = self.trigger_input_count()?;
        Ok((0..count).map(|i| TriggerInput::new(self, i)).collect())
    }

    pub fn trigger_output_count(&self) -> Result<u16> {
        Ok(self.get_int(IntProperty::DevTriggerOutputCount)? as u16)
    }

    pub fn trigger_output(&self, index: u16) -> Result<TriggerOutput<'_>> {
        let count = self.trigger_output_count()?;
        if index >= count {
            return Err(HandyscopeError::InvalidChannel {
                index: usize::from(index),
                count: usize::from(count),
            });
        }
        Ok(TriggerOutput::new(self, index))
    }

    pub fn trigger_outputs(&self) -> Result<Vec<TriggerOutput<'_>>> {
        let count = self.trigger_output_count()?;
        Ok((0..count).map(|i| TriggerOutput::new(self, i)).collect())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close {} '{}': {e}", self.kind, self.product_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::simulated::{SimCall, SimulatedDevice, SimulatedSdk};
    use crate::status::StatusCode;

    fn open(sdk: &Arc<SimulatedSdk>) -> DeviceSession {
        let handle = sdk.lst_open_device(2, 0, DeviceKind::Oscilloscope.code());
        DeviceSession::new(
            sdk.clone(),
            handle,
            DeviceKind::Oscilloscope,
            "Handyscope HS5-540XMS".to_string(),
            SessionConfig::default(),
        )
    }

    fn sdk() -> Arc<SimulatedSdk> {
        Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::handyscope(
            "Handyscope HS5-540XMS",
            29_123,
        )
        .with_product_id(22)]))
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(0x0001_0002_0003_0004), "1.2.3.4");
        assert_eq!(format_version(0), "0.0.0.0");
    }

    #[test]
    fn test_decode_calibration_date() {
        let date = decode_calibration_date((2021 << 16) | (6 << 8) | 15).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 6, 15).unwrap());
        assert!(decode_calibration_date(0).is_none());
    }

    #[test]
    fn test_device_kind_mask() {
        assert_eq!(
            DeviceKind::from_mask(1 | 4),
            vec![DeviceKind::Oscilloscope, DeviceKind::I2cHost]
        );
        assert_eq!(DeviceKind::I2cHost.to_string(), "i2c host");
    }

    #[test]
    fn test_device_properties() {
        let sdk = sdk();
        let session = open(&sdk);
        assert_eq!(session.serial_number().unwrap(), 29_123);
        assert_eq!(session.product_id().unwrap(), "HS5");
        assert_eq!(session.short_name().unwrap(), "HS5-540XMS");
        assert_eq!(session.firmware_version().unwrap(), "1.2.3.4");
        assert!(session.calibration_date().unwrap().is_some());
        assert!(!session.is_removed().unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let sdk = sdk();
        let mut session = open(&sdk);
        let handle = session.handle().unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert!(!sdk.is_open(handle));
        let closes = sdk
            .calls()
            .iter()
            .filter(|c| matches!(c, SimCall::Close(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn test_closed_session_makes_no_native_call() {
        let sdk = sdk();
        let mut session = open(&sdk);
        session.close().unwrap();
        sdk.clear_calls();
        assert!(matches!(
            session.serial_number(),
            Err(HandyscopeError::SessionClosed)
        ));
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn test_drop_closes() {
        let sdk = sdk();
        let session = open(&sdk);
        let handle = session.handle().unwrap();
        drop(session);
        assert!(!sdk.is_open(handle));
    }

    #[test]
    fn test_unknown_label_skips_native_call() {
        let sdk = sdk();
        let session = open(&sdk);
        sdk.clear_calls();
        let err = session
            .set_label(IntProperty::ScpMeasureMode, Domain::MeasureMode, "burst")
            .unwrap_err();
        assert!(matches!(err, HandyscopeError::UnknownLabel { .. }));
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn test_failure_leaves_session_usable() {
        let sdk = sdk();
        let session = open(&sdk);
        sdk.fail_next(StatusCode::OBJECT_GONE);
        match session.name() {
            Err(HandyscopeError::NativeCall { status, message }) => {
                assert_eq!(status, StatusCode::OBJECT_GONE);
                assert_eq!(message, "OBJECT_GONE");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(session.name().unwrap(), "Handyscope HS5-540XMS");
    }

    #[test]
    fn test_trigger_input_range() {
        let sdk = sdk();
        let session = open(&sdk);
        assert_eq!(session.trigger_inputs().unwrap().len(), 3);
        assert!(matches!(
            session.trigger_input(3),
            Err(HandyscopeError::InvalidChannel { index: 3, count: 3 })
        ));
    }
}
