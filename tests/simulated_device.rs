// Whole-crate behaviour against the simulated libtiepie.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use handyscope_rs::registry::{available_labels, code_for, label_for};
use handyscope_rs::sdk::simulated::{SimCall, SimulatedDevice, SimulatedSdk};
use handyscope_rs::sdk::IntProperty;
use handyscope_rs::{
    DeviceKind, DeviceLocator, Domain, Generator, HandyscopeError, I2cHost, Oscilloscope,
    SessionConfig, StatusCode,
};

fn locator(devices: Vec<SimulatedDevice>) -> (Arc<SimulatedSdk>, DeviceLocator) {
    let sdk = Arc::new(SimulatedSdk::with_devices(devices));
    let config = SessionConfig::default().with_poll_interval(Duration::from_millis(1));
    let locator = DeviceLocator::new(sdk.clone()).with_config(config);
    (sdk, locator)
}

#[test]
fn test_registry_round_trip_for_every_domain() {
    for domain in Domain::ALL {
        let labels = available_labels(domain);
        assert!(!labels.is_empty(), "{domain} has no labels");
        let unique: HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), labels.len(), "{domain} repeats a label");
        for label in labels {
            let code = code_for(domain, label).unwrap();
            assert_eq!(label_for(domain, code).unwrap(), label);
        }
    }
}

#[test]
fn test_hs3_generator_sine() {
    let (sdk, locator) = locator(vec![
        SimulatedDevice::new("Handyscope HS3").with_kind(DeviceKind::Generator)
    ]);
    let gen = Generator::open(&locator, "HS3").unwrap();
    sdk.clear_calls();

    assert_eq!(gen.set_signal_type("sine").unwrap(), "sine");
    assert!(sdk
        .calls()
        .contains(&SimCall::SetInt(IntProperty::GenSignalType, 1)));
    assert_eq!(gen.signal_type().unwrap(), "sine");
}

#[test]
fn test_unknown_label_never_reaches_the_library() {
    let (sdk, locator) = locator(vec![
        SimulatedDevice::new("Handyscope HS3").with_kind(DeviceKind::Generator)
    ]);
    let gen = Generator::open(&locator, "HS3").unwrap();
    sdk.clear_calls();

    let err = gen.set_signal_type("hexagon").unwrap_err();
    assert!(matches!(
        err,
        HandyscopeError::UnknownLabel { domain: Domain::SignalType, ref label } if label == "hexagon"
    ));
    assert!(sdk.calls().is_empty());
}

#[test]
fn test_empty_device_list() {
    let (_, locator) = locator(Vec::new());
    assert!(matches!(
        Oscilloscope::open(&locator, "HS5"),
        Err(HandyscopeError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        I2cHost::open(&locator, "HS5"),
        Err(HandyscopeError::DeviceNotFound {
            kind: DeviceKind::I2cHost,
            ..
        })
    ));
}

#[test]
fn test_device_without_the_capability_is_skipped() {
    let (_, locator) = locator(vec![
        SimulatedDevice::new("Handyscope HS3").with_kind(DeviceKind::Oscilloscope)
    ]);
    assert!(Generator::open(&locator, "HS3").is_err());
    assert!(Oscilloscope::open(&locator, "HS3").is_ok());
}

#[test]
fn test_failed_call_leaves_session_usable() {
    let (sdk, locator) = locator(vec![SimulatedDevice::handyscope(
        "Handyscope HS5-540XMS",
        29_000,
    )]);
    let scope = Oscilloscope::open(&locator, "HS5").unwrap();

    sdk.fail_next(StatusCode::INVALID_VALUE);
    let err = scope.set_sample_frequency(1e6).unwrap_err();
    assert_eq!(err.to_string(), "[-4]: INVALID_VALUE");

    assert_eq!(scope.sample_frequency().unwrap(), 1e6);
    assert_eq!(scope.record_length().unwrap(), 5000);
}

#[test]
fn test_close_twice_then_calls_fail() {
    let (sdk, locator) = locator(vec![SimulatedDevice::handyscope(
        "Handyscope HS5-540XMS",
        29_000,
    )]);
    let mut gen = Generator::open(&locator, "HS5").unwrap();
    let handle = gen.session().handle().unwrap();

    gen.close().unwrap();
    gen.close().unwrap();
    assert!(!sdk.is_open(handle));
    assert!(matches!(
        gen.frequency(),
        Err(HandyscopeError::SessionClosed)
    ));
}

#[test]
fn test_open_by_serial_picks_the_right_device() {
    let (_, locator) = locator(vec![
        SimulatedDevice::handyscope("Handyscope HS5-540XMS", 29_000),
        SimulatedDevice::handyscope("Handyscope HS5-540XMS", 29_001),
    ]);
    let device = locator
        .open_by_serial(29_001, DeviceKind::Oscilloscope)
        .unwrap();
    assert_eq!(device.kind(), DeviceKind::Oscilloscope);
    assert_eq!(device.session().serial_number().unwrap(), 29_001);
    assert!(device.into_oscilloscope().is_some());
}

#[test]
fn test_block_measurement_to_dataframe() {
    let (_, locator) = locator(vec![SimulatedDevice::handyscope(
        "Handyscope HS5-540XMS",
        29_000,
    )]);
    let mut scope = Oscilloscope::open(&locator, "HS5").unwrap();
    scope.set_measure_mode("block").unwrap();
    scope.set_record_length(1000).unwrap();
    scope.set_pre_sample_ratio(0.25).unwrap();
    scope.channel(1).unwrap().set_enabled(true).unwrap();

    let measurement = scope.measure().unwrap();
    assert_eq!(measurement.sample_count(), 1000);
    assert_eq!(measurement.pre_samples, 250);

    let frame = measurement.to_dataframe().unwrap();
    assert_eq!(frame.height(), 1000);
    let columns: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(columns, vec!["time", "ch1", "ch2"]);
}

#[test]
fn test_i2c_scan_only_skips_silent_addresses() {
    let (sdk, locator) = locator(vec![SimulatedDevice::handyscope(
        "Handyscope HS5-540XMS",
        29_000,
    )]);
    let i2c = I2cHost::open(&locator, "HS5").unwrap();
    i2c.write_byte(0x48, 0x01).unwrap();
    assert_eq!(i2c.scan().unwrap(), vec![0x48]);

    sdk.fail_when(StatusCode::BIT_ERROR, |call| {
        matches!(call, SimCall::I2cRead(0x10, _))
    });
    assert!(matches!(
        i2c.scan(),
        Err(HandyscopeError::NativeCall {
            status: StatusCode::BIT_ERROR,
            ..
        })
    ));
}
