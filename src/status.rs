//! Status codes reported by libtiepie and the wrapper that checks them.
//!
//! libtiepie keeps one "last status" per process. Every call this crate makes
//! goes through [`checked`], which reads that status right after the call:
//! negative codes become [`HandyscopeError::NativeCall`], positive codes
//! (the SDK applied the call with a side effect, e.g. clipped the value) are
//! logged as warnings.

use std::fmt;

use crate::error::{HandyscopeError, Result};
use crate::sdk::Sdk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const VALUE_CLIPPED: Self = Self(1);
    pub const VALUE_MODIFIED: Self = Self(2);
    pub const UNSUCCESSFUL: Self = Self(-1);
    pub const NOT_SUPPORTED: Self = Self(-2);
    pub const INVALID_HANDLE: Self = Self(-3);
    pub const INVALID_VALUE: Self = Self(-4);
    pub const INVALID_CHANNEL: Self = Self(-5);
    pub const INVALID_TRIGGER_SOURCE: Self = Self(-6);
    pub const INVALID_DEVICE_TYPE: Self = Self(-7);
    pub const INVALID_DEVICE_INDEX: Self = Self(-8);
    pub const INVALID_PRODUCT_ID: Self = Self(-9);
    pub const INVALID_DEVICE_SERIALNUMBER: Self = Self(-10);
    pub const OBJECT_GONE: Self = Self(-11);
    pub const INTERNAL_ADDRESS: Self = Self(-12);
    pub const NOT_CONTROLLABLE: Self = Self(-13);
    pub const NO_ACKNOWLEDGE: Self = Self(-14);
    pub const BIT_ERROR: Self = Self(-15);
    pub const INVALID_CONTAINED_DEVICE_SERIALNUMBER: Self = Self(-16);
    pub const INVALID_INPUT: Self = Self(-17);
    pub const INVALID_OUTPUT: Self = Self(-18);
    pub const INVALID_DRIVER: Self = Self(-19);
    pub const NOT_AVAILABLE: Self = Self(-20);
    pub const INVALID_FIRMWARE: Self = Self(-21);
    pub const INVALID_INDEX: Self = Self(-22);
    pub const INVALID_EEPROM: Self = Self(-23);
    pub const INITIALIZATION_FAILED: Self = Self(-24);
    pub const LIBRARY_NOT_INITIALIZED: Self = Self(-25);
    pub const NO_TRIGGER_ENABLED: Self = Self(-26);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }

    pub fn is_warning(&self) -> bool {
        self.0 > 0
    }

    pub fn is_error(&self) -> bool {
        self.0 < 0
    }

    /// The SDK's symbolic name for this status.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "SUCCESS",
            1 => "VALUE_CLIPPED",
            2 => "VALUE_MODIFIED",
            -1 => "UNSUCCESSFUL",
            -2 => "NOT_SUPPORTED",
            -3 => "INVALID_HANDLE",
            -4 => "INVALID_VALUE",
            -5 => "INVALID_CHANNEL",
            -6 => "INVALID_TRIGGER_SOURCE",
            -7 => "INVALID_DEVICE_TYPE",
            -8 => "INVALID_DEVICE_INDEX",
            -9 => "INVALID_PRODUCT_ID",
            -10 => "INVALID_DEVICE_SERIALNUMBER",
            -11 => "OBJECT_GONE",
            -12 => "INTERNAL_ADDRESS",
            -13 => "NOT_CONTROLLABLE",
            -14 => "NO_ACKNOWLEDGE",
            -15 => "BIT_ERROR",
            -16 => "INVALID_CONTAINED_DEVICE_SERIALNUMBER",
            -17 => "INVALID_INPUT",
            -18 => "INVALID_OUTPUT",
            -19 => "INVALID_DRIVER",
            -20 => "NOT_AVAILABLE",
            -21 => "INVALID_FIRMWARE",
            -22 => "INVALID_INDEX",
            -23 => "INVALID_EEPROM",
            -24 => "INITIALIZATION_FAILED",
            -25 => "LIBRARY_NOT_INITIALIZED",
            -26 => "NO_TRIGGER_ENABLED",
            _ => "UNKNOWN_STATUS",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.0, self.name())
    }
}

/// Run one native call and translate the status it left behind.
pub fn checked<T>(sdk: &dyn Sdk, call: impl FnOnce(&dyn Sdk) -> T) -> Result<T> {
    let value = call(sdk);
    let status = sdk.last_status();
    if status.is_error() {
        return Err(HandyscopeError::NativeCall {
            status,
            message: sdk.last_status_str(),
        });
    }
    if status.is_warning() {
        log::warn!("[{}]: {}", status.code(), sdk.last_status_str());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::simulated::SimulatedSdk;

    #[test]
    fn test_status_classes() {
        assert!(StatusCode::SUCCESS.is_success());
        assert!(StatusCode::VALUE_CLIPPED.is_success());
        assert!(StatusCode::VALUE_CLIPPED.is_warning());
        assert!(StatusCode::INVALID_VALUE.is_error());
        assert_eq!(StatusCode::NOT_SUPPORTED.to_string(), "[-2]: NOT_SUPPORTED");
    }

    #[test]
    fn test_checked_passes_value_through() {
        let sdk = SimulatedSdk::new();
        let count = checked(&sdk, |sdk| {
            sdk.lst_update();
            sdk.lst_count()
        })
        .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_checked_raises_on_failure() {
        let sdk = SimulatedSdk::new();
        sdk.fail_next(StatusCode::INVALID_VALUE);
        let err = checked(&sdk, |sdk| sdk.lst_count()).unwrap_err();
        match err {
            HandyscopeError::NativeCall { status, message } => {
                assert_eq!(status, StatusCode::INVALID_VALUE);
                assert_eq!(message, "INVALID_VALUE");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the status is per call
        assert!(checked(&sdk, |sdk| sdk.lst_count()).is_ok());
    }

    #[test]
    fn test_checked_tolerates_warnings() {
        let sdk = SimulatedSdk::new();
        sdk.fail_next(StatusCode::VALUE_CLIPPED);
        assert_eq!(checked(&sdk, |sdk| sdk.lst_count()).unwrap(), 0);
    }
}
