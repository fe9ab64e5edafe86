//! I2C host.
//!
//! Words go over the bus most significant byte first.

use crate::error::{HandyscopeError, Result};
use crate::locator::DeviceLocator;
use crate::sdk::FloatProperty;
use crate::session::DeviceSession;
use crate::status::StatusCode;

/// Range of 7 bit addresses that are not reserved.
const SCAN_ADDRESSES: std::ops::Range<u16> = 0x08..0x78;

#[derive(Debug)]
pub struct I2cHost {
    session: DeviceSession,
}

impl I2cHost {
    /// Open the first I2C host whose product name contains `name`.
    pub fn open(locator: &DeviceLocator, name: &str) -> Result<Self> {
        locator.open_i2c_host(name)
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

    pub fn speed_max(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::I2cSpeedMax)
    }

    /// Bus clock in Hz.
    pub fn speed(&self) -> Result<f64> {
        self.session.get_float(FloatProperty::I2cSpeed)
    }

    pub fn set_speed(&self, speed: f64) -> Result<f64> {
        self.session.set_float(FloatProperty::I2cSpeed, speed)
    }

    /// Whether `address` is used by the instrument itself.
    pub fn is_internal_address(&self, address: u16) -> Result<bool> {
        self.session
            .call(|sdk, handle| sdk.i2c_is_internal_address(handle, address))
    }

    /// Read exactly `length` bytes; fewer is an error.
    pub fn read(&self, address: u16, length: usize, stop: bool) -> Result<Vec<u8>> {
        let data = self
            .session
            .call(|sdk, handle| sdk.i2c_read(handle, address, length, stop))?;
        if data.len() < length {
            return Err(HandyscopeError::ShortI2cRead {
                address,
                expected: length,
                received: data.len(),
            });
        }
        Ok(data)
    }

    pub fn read_byte(&self, address: u16) -> Result<u8> {
        let [byte] = self.read_array(address)?;
        Ok(byte)
    }

    pub fn read_word(&self, address: u16) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array(address)?))
    }

    fn read_array<const N: usize>(&self, address: u16) -> Result<[u8; N]> {
        let data = self.read(address, N, true)?;
        let mut bytes = [0; N];
        bytes.copy_from_slice(&data[..N]);
        Ok(bytes)
    }

    pub fn write(&self, address: u16, data: &[u8], stop: bool) -> Result<bool> {
        self.session
            .call(|sdk, handle| sdk.i2c_write(handle, address, data, stop))
    }

    pub fn write_byte(&self, address: u16, value: u8) -> Result<bool> {
        self.write(address, &[value], true)
    }

    pub fn write_byte_byte(&self, address: u16, first: u8, second: u8) -> Result<bool> {
        self.write(address, &[first, second], true)
    }

    pub fn write_word(&self, address: u16, value: u16) -> Result<bool> {
        self.write(address, &value.to_be_bytes(), true)
    }

    /// A register byte followed by a word, the usual register write.
    pub fn write_byte_word(&self, address: u16, byte: u8, word: u16) -> Result<bool> {
        let [high, low] = word.to_be_bytes();
        self.write(address, &[byte, high, low], true)
    }

    /// Addresses of external devices that acknowledge a one byte read.
    ///
    /// A missing acknowledge means nobody is there; any other failure ends
    /// the scan.
    pub fn scan(&self) -> Result<Vec<u16>> {
        let mut found = Vec::new();
        for address in SCAN_ADDRESSES {
            if self.is_internal_address(address)? {
                continue;
            }
            match self.read(address, 1, true) {
                Ok(_) => found.push(address),
                Err(HandyscopeError::NativeCall {
                    status: StatusCode::NO_ACKNOWLEDGE,
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
        }
        log::debug!("I2C scan found {found:02x?}");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::simulated::{SimulatedDevice, SimulatedSdk};
    use crate::sdk::simulated::SimCall;
    use crate::session::DeviceKind;
    use std::sync::Arc;

    fn open_with_sdk() -> (Arc<SimulatedSdk>, I2cHost) {
        let sdk = Arc::new(SimulatedSdk::with_devices(vec![SimulatedDevice::new(
            "Handyscope HS5-540XMS",
        )
        .with_kind(DeviceKind::I2cHost)]));
        let i2c = I2cHost::open(&DeviceLocator::new(sdk.clone()), "HS5").unwrap();
        (sdk, i2c)
    }

    fn open() -> I2cHost {
        open_with_sdk().1
    }

    #[test]
    fn test_speed() {
        let i2c = open();
        assert!(i2c.speed_max().unwrap() > 0.0);
        assert_eq!(i2c.set_speed(50e3).unwrap(), 50e3);
        assert_eq!(i2c.speed().unwrap(), 50e3);
    }

    #[test]
    fn test_read_without_device_is_not_acknowledged() {
        let i2c = open();
        let err = i2c.read_byte(0x20).unwrap_err();
        assert_eq!(err.to_string(), "[-14]: NO_ACKNOWLEDGE");
        assert!(matches!(
            err,
            HandyscopeError::NativeCall {
                status: StatusCode::NO_ACKNOWLEDGE,
                ..
            }
        ));
    }

    #[test]
    fn test_word_byte_order() {
        let i2c = open();
        i2c.write_word(0x20, 0x1234).unwrap();
        assert_eq!(i2c.read_word(0x20).unwrap(), 0x1234);
        assert_eq!(i2c.read_byte(0x20).unwrap(), 0x12);
        i2c.write_byte_word(0x21, 0x01, 0xABCD).unwrap();
        assert_eq!(i2c.read(0x21, 3, true).unwrap(), vec![0x01, 0xAB, 0xCD]);
    }

    #[test]
    fn test_internal_address_refuses_writes() {
        let i2c = open();
        assert!(i2c.is_internal_address(0x50).unwrap());
        assert!(i2c.write_byte(0x50, 1).is_err());
    }

    #[test]
    fn test_short_read_is_an_error() {
        let i2c = open();
        i2c.write_byte(0x20, 0x7F).unwrap();
        assert!(matches!(
            i2c.read_word(0x20),
            Err(HandyscopeError::ShortI2cRead {
                address: 0x20,
                expected: 2,
                received: 1,
            })
        ));
        assert_eq!(
            i2c.read(0x20, 4, true).unwrap_err().to_string(),
            "I2C read from 0x20 returned 1 of 4 bytes"
        );
        assert_eq!(i2c.read_byte(0x20).unwrap(), 0x7F);
    }

    #[test]
    fn test_failed_read_is_not_a_value() {
        let (sdk, i2c) = open_with_sdk();
        i2c.write_word(0x20, 0x1234).unwrap();
        sdk.fail_when(StatusCode::BIT_ERROR, |call| {
            matches!(call, SimCall::I2cRead(0x20, _))
        });
        assert!(matches!(
            i2c.read_word(0x20),
            Err(HandyscopeError::NativeCall {
                status: StatusCode::BIT_ERROR,
                ..
            })
        ));
        assert_eq!(i2c.read_word(0x20).unwrap(), 0x1234);
    }

    #[test]
    fn test_scan_stops_on_lost_device() {
        let (sdk, i2c) = open_with_sdk();
        i2c.write_byte(0x3C, 0).unwrap();
        sdk.fail_when(StatusCode::OBJECT_GONE, |call| {
            matches!(call, SimCall::I2cRead(0x3C, _))
        });
        assert!(matches!(
            i2c.scan(),
            Err(HandyscopeError::NativeCall {
                status: StatusCode::OBJECT_GONE,
                ..
            })
        ));
    }

    #[test]
    fn test_scan() {
        let i2c = open();
        assert!(i2c.scan().unwrap().is_empty());
        i2c.write_byte(0x3C, 0).unwrap();
        assert_eq!(i2c.scan().unwrap(), vec![0x3C]);
    }
}
