//! Label tables for the enumerated properties of the SDK.
//!
//! Each [`Domain`] owns one static table of `(label, code)` pairs, listed in the
//! order libtiepie defines the constants. Lookups in both directions are exact
//! and case-sensitive.

use std::fmt;

use crate::error::{HandyscopeError, Result};

type Table = &'static [(&'static str, u64)];

const fn trigger_io_id(index: u64) -> u64 {
    (3 << 20) | (index << 8)
}

const SIGNAL_TYPES: Table = &[
    ("unknown", 0),
    ("sine", 1),
    ("triangle", 2),
    ("square", 4),
    ("DC", 8),
    ("noise", 16),
    ("arbitrary", 32),
    ("pulse", 64),
];

const GENERATOR_MODES: Table = &[
    ("unknown", 0),
    ("continuous", 1),
    ("burst count", 2),
    ("gated periods", 4),
    ("gated", 8),
    ("gated period start", 16),
    ("gated period finish", 32),
    ("gated run output", 64),
    ("gated run", 128),
    ("burst sample count", 256),
    ("burst sample count output", 512),
    ("burst segment count", 1024),
    ("burst segment count output", 2048),
];

const FREQUENCY_MODES: Table = &[("unknown", 0), ("signal", 1), ("sample", 2)];

const GENERATOR_STATUS: Table = &[
    ("stopped", 1),
    ("running", 2),
    ("burst active", 4),
    ("waiting", 8),
];

const CONNECTOR_TYPES: Table = &[
    ("unknown", 0),
    ("BNC", 1),
    ("banana", 2),
    ("power plug", 4),
];

const COUPLINGS: Table = &[
    ("unknown", 0),
    ("DCV", 1),
    ("ACV", 2),
    ("DCA", 4),
    ("ACA", 8),
    ("ohm", 16),
];

const TRIGGER_KINDS: Table = &[
    ("unknown", 0),
    ("rising", 1),
    ("falling", 2),
    ("in window", 4),
    ("out window", 8),
    ("any", 16),
    ("enter window", 32),
    ("exit window", 64),
    ("pulse width positive", 128),
    ("pulse width negative", 256),
];

const TRIGGER_LEVEL_MODES: Table = &[("unknown", 0), ("relative", 1), ("absolute", 2)];

const TRIGGER_CONDITIONS: Table = &[
    ("none", 0),
    ("smaller", 1),
    ("larger", 2),
    ("inside", 4),
    ("outside", 8),
];

const MEASURE_MODES: Table = &[("unknown", 0), ("stream", 1), ("block", 2)];

const AUTO_RESOLUTIONS: Table = &[
    ("unknown", 0),
    ("disabled", 1),
    ("native only", 2),
    ("all", 4),
];

const CLOCK_SOURCES: Table = &[("unknown", 0), ("external", 1), ("internal", 2)];

const CLOCK_OUTPUTS: Table = &[
    ("unknown", 0),
    ("disabled", 1),
    ("sample", 2),
    ("fixed", 4),
];

const CONNECTION_STATES: Table = &[("undefined", 0), ("connected", 1), ("disconnected", 2)];

const TRIGGER_OUTPUT_EVENTS: Table = &[
    ("unknown", 0),
    ("generator start", 1),
    ("generator stop", 2),
    ("generator new period", 4),
    ("oscilloscope running", 8),
    ("oscilloscope triggered", 16),
    ("manual", 32),
];

const TRIGGER_IDS: Table = &[
    ("EXT 1", trigger_io_id(1)),
    ("EXT 2", trigger_io_id(2)),
    ("EXT 3", trigger_io_id(3)),
];

const DEVICE_TYPES: Table = &[("oscilloscope", 1), ("generator", 2), ("i2c host", 4)];

const ID_KINDS: Table = &[("product id", 1), ("index", 2), ("serial number", 4)];

const PRODUCT_IDS: Table = &[
    ("none", 0),
    ("combined", 2),
    ("HS3", 13),
    ("HS4", 15),
    ("HP3", 18),
    ("HS4D", 20),
    ("HS5", 22),
    ("HS6", 24),
    ("HS6D", 25),
];

const RAW_DATA_TYPES: Table = &[
    ("int8", 1),
    ("int16", 2),
    ("int32", 4),
    ("int64", 8),
    ("uint8", 16),
    ("uint16", 32),
    ("uint32", 64),
    ("uint64", 128),
    ("float32", 256),
    ("float64", 512),
];

/// A family of related native constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    SignalType,
    GeneratorMode,
    FrequencyMode,
    GeneratorStatus,
    ConnectorType,
    Coupling,
    TriggerKind,
    TriggerLevelMode,
    TriggerCondition,
    MeasureMode,
    AutoResolution,
    ClockSource,
    ClockOutput,
    ConnectionState,
    TriggerOutputEvent,
    TriggerId,
    DeviceType,
    IdKind,
    ProductId,
    RawDataType,
}

impl Domain {
    pub const ALL: [Self; 20] = [
        Self::SignalType,
        Self::GeneratorMode,
        Self::FrequencyMode,
        Self::GeneratorStatus,
        Self::ConnectorType,
        Self::Coupling,
        Self::TriggerKind,
        Self::TriggerLevelMode,
        Self::TriggerCondition,
        Self::MeasureMode,
        Self::AutoResolution,
        Self::ClockSource,
        Self::ClockOutput,
        Self::ConnectionState,
        Self::TriggerOutputEvent,
        Self::TriggerId,
        Self::DeviceType,
        Self::IdKind,
        Self::ProductId,
        Self::RawDataType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignalType => "signal type",
            Self::GeneratorMode => "generator mode",
            Self::FrequencyMode => "frequency mode",
            Self::GeneratorStatus => "generator status",
            Self::ConnectorType => "connector type",
            Self::Coupling => "coupling",
            Self::TriggerKind => "trigger kind",
            Self::TriggerLevelMode => "trigger level mode",
            Self::TriggerCondition => "trigger condition",
            Self::MeasureMode => "measure mode",
            Self::AutoResolution => "auto resolution",
            Self::ClockSource => "clock source",
            Self::ClockOutput => "clock output",
            Self::ConnectionState => "connection state",
            Self::TriggerOutputEvent => "trigger output event",
            Self::TriggerId => "trigger id",
            Self::DeviceType => "device type",
            Self::IdKind => "id kind",
            Self::ProductId => "product id",
            Self::RawDataType => "raw data type",
        }
    }

    fn table(self) -> Table {
        match self {
            Self::SignalType => SIGNAL_TYPES,
            Self::GeneratorMode => GENERATOR_MODES,
            Self::FrequencyMode => FREQUENCY_MODES,
            Self::GeneratorStatus => GENERATOR_STATUS,
            Self::ConnectorType => CONNECTOR_TYPES,
            Self::Coupling => COUPLINGS,
            Self::TriggerKind => TRIGGER_KINDS,
            Self::TriggerLevelMode => TRIGGER_LEVEL_MODES,
            Self::TriggerCondition => TRIGGER_CONDITIONS,
            Self::MeasureMode => MEASURE_MODES,
            Self::AutoResolution => AUTO_RESOLUTIONS,
            Self::ClockSource => CLOCK_SOURCES,
            Self::ClockOutput => CLOCK_OUTPUTS,
            Self::ConnectionState => CONNECTION_STATES,
            Self::TriggerOutputEvent => TRIGGER_OUTPUT_EVENTS,
            Self::TriggerId => TRIGGER_IDS,
            Self::DeviceType => DEVICE_TYPES,
            Self::IdKind => ID_KINDS,
            Self::ProductId => PRODUCT_IDS,
            Self::RawDataType => RAW_DATA_TYPES,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of a native code.
pub fn label_for(domain: Domain, code: u64) -> Result<&'static str> {
    domain
        .table()
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(label, _)| *label)
        .ok_or(HandyscopeError::UnknownCode { domain, code })
}

/// Native code of a label.
pub fn code_for(domain: Domain, label: &str) -> Result<u64> {
    domain
        .table()
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, code)| *code)
        .ok_or_else(|| HandyscopeError::UnknownLabel {
            domain,
            label: label.to_string(),
        })
}

/// Every valid label of a domain, in native constant order.
pub fn available_labels(domain: Domain) -> Vec<&'static str> {
    domain.table().iter().map(|(label, _)| *label).collect()
}

/// Decode a capability bit mask as returned by the `Get...s` family of calls.
///
/// An empty mask maps to the domain's zero-coded label (usually `"unknown"`),
/// if it has one.
pub fn labels_in_mask(domain: Domain, mask: u64) -> Vec<&'static str> {
    let table = domain.table();
    if mask == 0 {
        return table
            .iter()
            .filter(|(_, code)| *code == 0)
            .map(|(label, _)| *label)
            .collect();
    }
    table
        .iter()
        .filter(|(_, code)| *code != 0 && mask & code == *code)
        .map(|(label, _)| *label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_round_trip_is_stable() {
        for domain in Domain::ALL {
            for label in available_labels(domain) {
                let code = code_for(domain, label).unwrap();
                let back = label_for(domain, code).unwrap();
                assert_eq!(code_for(domain, back).unwrap(), code, "{domain}: {label}");
            }
        }
    }

    #[test]
    fn test_labels_and_codes_are_unique() {
        for domain in Domain::ALL {
            let labels = available_labels(domain);
            assert!(!labels.is_empty(), "{domain} has no labels");
            let unique: HashSet<_> = labels.iter().collect();
            assert_eq!(unique.len(), labels.len(), "{domain} repeats a label");

            let codes: HashSet<_> = domain.table().iter().map(|(_, c)| c).collect();
            assert_eq!(codes.len(), labels.len(), "{domain} repeats a code");
        }
    }

    #[test]
    fn test_unknown_label() {
        let err = code_for(Domain::SignalType, "hexagon").unwrap_err();
        assert!(matches!(
            err,
            HandyscopeError::UnknownLabel { domain: Domain::SignalType, ref label } if label == "hexagon"
        ));
        // labels are case-sensitive
        assert!(code_for(Domain::SignalType, "Sine").is_err());
    }

    #[test]
    fn test_unknown_code() {
        assert!(matches!(
            label_for(Domain::TriggerKind, 3),
            Err(HandyscopeError::UnknownCode { code: 3, .. })
        ));
    }

    #[test]
    fn test_order_follows_native_constants() {
        assert_eq!(
            available_labels(Domain::MeasureMode),
            vec!["unknown", "stream", "block"]
        );
        assert_eq!(code_for(Domain::TriggerId, "EXT 2").unwrap(), 3_146_240);
        assert_eq!(code_for(Domain::RawDataType, "uint16").unwrap(), 32);
        assert_eq!(label_for(Domain::RawDataType, 256).unwrap(), "float32");
    }

    #[test]
    fn test_labels_in_mask() {
        assert_eq!(labels_in_mask(Domain::SignalType, 0), vec!["unknown"]);
        assert_eq!(
            labels_in_mask(Domain::SignalType, 1 | 4 | 64),
            vec!["sine", "square", "pulse"]
        );
        assert_eq!(labels_in_mask(Domain::TriggerCondition, 0), vec!["none"]);
        assert!(labels_in_mask(Domain::GeneratorStatus, 0).is_empty());
    }
}
