//! Error type shared by every handyscope operation.

use std::time::Duration;

use crate::registry::Domain;
use crate::status::StatusCode;
use crate::DeviceKind;

#[derive(Debug, thiserror::Error)]
pub enum HandyscopeError {
    #[error("Unknown {domain} label '{label}'")]
    UnknownLabel { domain: Domain, label: String },

    #[error("Unknown {domain} code {code}")]
    UnknownCode { domain: Domain, code: u64 },

    #[error("[{}]: {message}", status.code())]
    NativeCall { status: StatusCode, message: String },

    #[error("No openable {kind} matching '{name}' found")]
    DeviceNotFound { name: String, kind: DeviceKind },

    #[error("Measurement did not complete within {timeout:?}")]
    MeasurementTimeout { timeout: Duration },

    #[error("Device session is closed")]
    SessionClosed,

    #[error("Index {index} out of range, device has {count}")]
    InvalidChannel { index: usize, count: usize },

    #[error("Channel {0} is not enabled. Enable it before starting the measurement")]
    ChannelNotEnabled(usize),

    #[error("No channel is enabled for measurement or the channel list is empty")]
    NoChannelEnabled,

    #[error("Not all pre samples have been collected ({valid} of {expected})")]
    IncompletePreSamples { valid: u64, expected: u64 },

    #[error("I2C read from 0x{address:02x} returned {received} of {expected} bytes")]
    ShortI2cRead {
        address: u16,
        expected: usize,
        received: usize,
    },

    #[error("Connection test could not be started")]
    ConnectionTestFailed,

    #[error("No sync offset known for serial {serial} at {sample_frequency} Hz")]
    SyncOffsetUnknown { serial: u32, sample_frequency: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Data frame error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, HandyscopeError>;
