//! Finding and opening devices in the SDK's device list.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::SessionConfig;
use crate::error::{HandyscopeError, Result};
use crate::generator::Generator;
use crate::i2c::I2cHost;
use crate::oscilloscope::Oscilloscope;
use crate::registry::{self, Domain};
use crate::sdk::{Handle, ListField, NameKind, Sdk};
use crate::session::{decode_calibration_date, format_version, DeviceKind, DeviceSession};
use crate::status::checked;

/// One entry of the device list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
    pub short_name: String,
    pub serial_number: u32,
    /// `None` for products this crate has no label for.
    pub product_id: Option<&'static str>,
    pub device_types: Vec<DeviceKind>,
    pub driver_version: String,
    pub firmware_version: String,
    pub calibration_date: Option<NaiveDate>,
}

/// A session opened by [`DeviceLocator::open`], typed by what it was opened as.
#[derive(Debug)]
pub enum OpenedDevice {
    Oscilloscope(Oscilloscope),
    Generator(Generator),
    I2cHost(I2cHost),
}

impl OpenedDevice {
    pub fn kind(&self) -> DeviceKind {
        self.session().kind()
    }

    pub fn session(&self) -> &DeviceSession {
        match self {
            Self::Oscilloscope(scope) => scope.session(),
            Self::Generator(gen) => gen.session(),
            Self::I2cHost(i2c) => i2c.session(),
        }
    }

    pub fn into_oscilloscope(self) -> Option<Oscilloscope> {
        match self {
            Self::Oscilloscope(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn into_generator(self) -> Option<Generator> {
        match self {
            Self::Generator(gen) => Some(gen),
            _ => None,
        }
    }

    pub fn into_i2c_host(self) -> Option<I2cHost> {
        match self {
            Self::I2cHost(i2c) => Some(i2c),
            _ => None,
        }
    }
}

/// Scans the device list and opens sessions.
///
/// The SDK keeps a single device list per process, so locators sharing one
/// [`Sdk`] see the same devices.
#[derive(Clone)]
pub struct DeviceLocator {
    sdk: Arc<dyn Sdk>,
    config: SessionConfig,
}

impl std::fmt::Debug for DeviceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLocator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DeviceLocator {
    pub fn new(sdk: Arc<dyn Sdk>) -> Self {
        Self {
            sdk,
            config: SessionConfig::default(),
        }
    }

    /// A locator on the real libtiepie.
    #[cfg(feature = "libtiepie")]
    pub fn native() -> Result<Self> {
        Ok(Self::new(Arc::new(crate::sdk::native::LibTiePie::init()?)))
    }

    /// Settings handed to every session opened from here on.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sdk(&self) -> &Arc<dyn Sdk> {
        &self.sdk
    }

    /// libtiepie version as `major.minor.release.build`.
    pub fn library_version(&self) -> Result<String> {
        Ok(format_version(checked(self.sdk.as_ref(), |sdk| {
            sdk.library_version()
        })?))
    }

    fn refresh(&self) -> Result<u32> {
        let sdk = self.sdk.as_ref();
        checked(sdk, |sdk| sdk.lst_update())?;
        let count = checked(sdk, |sdk| sdk.lst_count())?;
        log::debug!("Device list holds {count} device(s)");
        Ok(count)
    }

    fn name_of(&self, index: u32, kind: NameKind) -> Result<String> {
        checked(self.sdk.as_ref(), |sdk| sdk.lst_dev_name(index, kind))
    }

    fn field_of(&self, index: u32, field: ListField) -> Result<u64> {
        checked(self.sdk.as_ref(), |sdk| sdk.lst_dev_field(index, field))
    }

    /// Every device currently in the list.
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<DeviceInfo>> {
        (0..self.refresh()?)
            .map(|index| -> Result<DeviceInfo> {
                Ok(DeviceInfo {
                    index,
                    name: self.name_of(index, NameKind::Long)?,
                    short_name: self.name_of(index, NameKind::Short)?,
                    serial_number: self.field_of(index, ListField::SerialNumber)? as u32,
                    product_id: registry::label_for(
                        Domain::ProductId,
                        self.field_of(index, ListField::ProductId)?,
                    )
                    .ok(),
                    device_types: DeviceKind::from_mask(self.field_of(index, ListField::Types)?),
                    driver_version: format_version(
                        self.field_of(index, ListField::DriverVersion)?,
                    ),
                    firmware_version: format_version(
                        self.field_of(index, ListField::FirmwareVersion)?,
                    ),
                    calibration_date: decode_calibration_date(
                        self.field_of(index, ListField::CalibrationDate)?,
                    ),
                })
            })
            .collect()
    }

    /// One tab separated line per device, after a header line.
    pub fn overview(&self) -> Result<String> {
        let mut out = String::from("Index\tName\tSerial number\tDevice types\n");
        for info in self.list()? {
            let kinds: Vec<&str> = info.device_types.iter().map(DeviceKind::as_str).collect();
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}",
                info.index,
                info.short_name,
                info.serial_number,
                kinds.join(", ")
            );
        }
        Ok(out)
    }

    /// First list entry, in list order, that `matches` and can be opened as `kind`.
    fn find(
        &self,
        kind: DeviceKind,
        mut matches: impl FnMut(u32) -> Result<bool>,
    ) -> Result<Option<u32>> {
        for index in 0..self.refresh()? {
            if !matches(index)? {
                continue;
            }
            let types = self.field_of(index, ListField::Types)?;
            if types & kind.code() == 0 {
                log::debug!("Device {index} is no {kind}");
                continue;
            }
            if !checked(self.sdk.as_ref(), |sdk| {
                sdk.lst_dev_can_open(index, kind.code())
            })? {
                log::debug!("Device {index} cannot be opened as {kind}, probably in use");
                continue;
            }
            return Ok(Some(index));
        }
        Ok(None)
    }

    fn open_with(&self, id_kind: &str, id: u64, kind: DeviceKind) -> Result<Handle> {
        let id_kind = registry::code_for(Domain::IdKind, id_kind)?;
        checked(self.sdk.as_ref(), |sdk| {
            sdk.lst_open_device(id_kind, id, kind.code())
        })
    }

    fn session(&self, handle: Handle, kind: DeviceKind, product_name: String) -> DeviceSession {
        DeviceSession::new(
            self.sdk.clone(),
            handle,
            kind,
            product_name,
            self.config.clone(),
        )
    }

    fn wrap(session: DeviceSession) -> OpenedDevice {
        match session.kind() {
            DeviceKind::Oscilloscope => OpenedDevice::Oscilloscope(Oscilloscope::new(session)),
            DeviceKind::Generator => OpenedDevice::Generator(Generator::new(session)),
            DeviceKind::I2cHost => OpenedDevice::I2cHost(I2cHost::new(session)),
        }
    }

    fn open_session(&self, name: &str, kind: DeviceKind) -> Result<DeviceSession> {
        let mut product_name = String::new();
        let found = self.find(kind, |index| {
            product_name = self.name_of(index, NameKind::Long)?;
            Ok(product_name.contains(name))
        })?;
        let Some(index) = found else {
            return Err(HandyscopeError::DeviceNotFound {
                name: name.to_string(),
                kind,
            });
        };
        let handle = self.open_with("index", u64::from(index), kind)?;
        Ok(self.session(handle, kind, product_name))
    }

    /// Open the first device whose full product name contains `name`
    /// (case-sensitive) and which can be opened as `kind`.
    #[tracing::instrument(skip(self))]
    pub fn open(&self, name: &str, kind: DeviceKind) -> Result<OpenedDevice> {
        Ok(Self::wrap(self.open_session(name, kind)?))
    }

    /// Open the device with the given serial number as `kind`.
    #[tracing::instrument(skip(self))]
    pub fn open_by_serial(&self, serial_number: u32, kind: DeviceKind) -> Result<OpenedDevice> {
        let found = self.find(kind, |index| {
            Ok(self.field_of(index, ListField::SerialNumber)? == u64::from(serial_number))
        })?;
        let Some(index) = found else {
            return Err(HandyscopeError::DeviceNotFound {
                name: serial_number.to_string(),
                kind,
            });
        };
        let product_name = self.name_of(index, NameKind::Long)?;
        let handle = self.open_with("serial number", u64::from(serial_number), kind)?;
        Ok(Self::wrap(self.session(handle, kind, product_name)))
    }

    pub fn open_oscilloscope(&self, name: &str) -> Result<Oscilloscope> {
        Ok(Oscilloscope::new(
            self.open_session(name, DeviceKind::Oscilloscope)?,
        ))
    }

    pub fn open_generator(&self, name: &str) -> Result<Generator> {
        Ok(Generator::new(self.open_session(name, DeviceKind::Generator)?))
    }

    pub fn open_i2c_host(&self, name: &str) -> Result<I2cHost> {
        Ok(I2cHost::new(self.open_session(name, DeviceKind::I2cHost)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::simulated::{SimCall, SimulatedDevice, SimulatedSdk};

    fn locator(devices: Vec<SimulatedDevice>) -> (Arc<SimulatedSdk>, DeviceLocator) {
        let sdk = Arc::new(SimulatedSdk::with_devices(devices));
        let locator = DeviceLocator::new(sdk.clone());
        (sdk, locator)
    }

    #[test]
    fn test_empty_list() {
        let (_sdk, locator) = locator(Vec::new());
        let err = locator.open("HS5", DeviceKind::Oscilloscope).unwrap_err();
        assert!(matches!(
            err,
            HandyscopeError::DeviceNotFound { ref name, kind: DeviceKind::Oscilloscope } if name == "HS5"
        ));
        assert!(locator.list().unwrap().is_empty());
    }

    #[test]
    fn test_first_match_in_list_order() {
        let (_sdk, locator) = locator(vec![
            SimulatedDevice::handyscope("Handyscope HS3", 1),
            SimulatedDevice::handyscope("Handyscope HS5-540XMS", 2),
            SimulatedDevice::handyscope("Handyscope HS5-220XMS", 3),
        ]);
        let scope = locator.open_oscilloscope("HS5").unwrap();
        assert_eq!(scope.session().serial_number().unwrap(), 2);
        assert_eq!(scope.session().product_name(), "Handyscope HS5-540XMS");
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let (_sdk, locator) = locator(vec![SimulatedDevice::handyscope("Handyscope HS5", 1)]);
        assert!(locator.open_oscilloscope("hs5").is_err());
    }

    #[test]
    fn test_skips_wrong_kind_and_busy_devices() {
        let (sdk, locator) = locator(vec![
            SimulatedDevice::new("Handyscope HS5 A").with_kind(DeviceKind::Generator),
            SimulatedDevice::handyscope("Handyscope HS5 B", 2).in_use(),
            SimulatedDevice::handyscope("Handyscope HS5 C", 3),
        ]);
        let scope = locator.open_oscilloscope("HS5").unwrap();
        assert_eq!(scope.session().serial_number().unwrap(), 3);
        assert!(sdk.calls().contains(&SimCall::Open {
            id_kind: 2,
            id: 2,
            device_type: 1
        }));
    }

    #[test]
    fn test_opened_device_variant() {
        let (_sdk, locator) = locator(vec![SimulatedDevice::handyscope("Handyscope HS5", 1)]);
        let opened = locator.open("HS5", DeviceKind::I2cHost).unwrap();
        assert_eq!(opened.kind(), DeviceKind::I2cHost);
        assert!(opened.into_i2c_host().is_some());
    }

    #[test]
    fn test_open_by_serial() {
        let (sdk, locator) = locator(vec![
            SimulatedDevice::handyscope("Handyscope HS5", 10),
            SimulatedDevice::handyscope("Handyscope HS5", 20),
        ]);
        let gen = locator
            .open_by_serial(20, DeviceKind::Generator)
            .unwrap()
            .into_generator()
            .unwrap();
        assert_eq!(gen.session().serial_number().unwrap(), 20);
        assert!(sdk.calls().contains(&SimCall::Open {
            id_kind: 4,
            id: 20,
            device_type: 2
        }));
        assert!(matches!(
            locator.open_by_serial(30, DeviceKind::Generator),
            Err(HandyscopeError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_list_and_overview() {
        let (_sdk, locator) = locator(vec![SimulatedDevice::handyscope(
            "Handyscope HS5-540XMS",
            29_000,
        )
        .with_product_id(22)]);
        let list = locator.list().unwrap();
        assert_eq!(list.len(), 1);
        let info = &list[0];
        assert_eq!(info.short_name, "HS5-540XMS");
        assert_eq!(info.product_id, Some("HS5"));
        assert_eq!(info.device_types.len(), 3);
        assert_eq!(info.firmware_version, "1.2.3.4");

        let overview = locator.overview().unwrap();
        let lines: Vec<&str> = overview.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "0\tHS5-540XMS\t29000\toscilloscope, generator, i2c host"
        );
    }

    #[test]
    fn test_list_failure_is_reported() {
        let (sdk, locator) = locator(vec![SimulatedDevice::handyscope("Handyscope HS5", 1)]);
        sdk.fail_when(crate::status::StatusCode::UNSUCCESSFUL, |call| {
            matches!(call, SimCall::Count)
        });
        assert!(matches!(
            locator.open_oscilloscope("HS5"),
            Err(HandyscopeError::NativeCall { .. })
        ));
    }
}
