//! Session settings for the blocking operations.
//!
//! Loaded from TOML, durations in milliseconds:
//!
//! ```toml
//! poll_interval_ms = 50
//! measure_timeout_ms = 10000
//! connection_test_timeout_ms = 5000
//! safe = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSessionConfig")]
pub struct SessionConfig {
    /// Delay between two `IsDataReady` / `IsConnectionTestCompleted` polls.
    pub poll_interval: Duration,
    pub measure_timeout: Duration,
    pub connection_test_timeout: Duration,
    /// Fail a block measurement whose pre samples are incomplete instead of
    /// only warning, when the device supports a trigger hold-off.
    pub safe: bool,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSessionConfig {
    poll_interval_ms: u64,
    measure_timeout_ms: u64,
    connection_test_timeout_ms: u64,
    safe: bool,
}

impl Default for RawSessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            measure_timeout_ms: 10_000,
            connection_test_timeout_ms: 5_000,
            safe: true,
        }
    }
}

impl From<RawSessionConfig> for SessionConfig {
    fn from(raw: RawSessionConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            measure_timeout: Duration::from_millis(raw.measure_timeout_ms),
            connection_test_timeout: Duration::from_millis(raw.connection_test_timeout_ms),
            safe: raw.safe,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        RawSessionConfig::default().into()
    }
}

impl SessionConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_measure_timeout(mut self, timeout: Duration) -> Self {
        self.measure_timeout = timeout;
        self
    }

    pub fn with_connection_test_timeout(mut self, timeout: Duration) -> Self {
        self.connection_test_timeout = timeout;
        self
    }

    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandyscopeError;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.measure_timeout, Duration::from_secs(10));
        assert!(config.safe);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml("poll_interval_ms = 5\nsafe = false\n").unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.connection_test_timeout, Duration::from_secs(5));
        assert!(!config.safe);
    }

    #[test]
    fn test_bad_toml() {
        let err = SessionConfig::from_toml("poll_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, HandyscopeError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "measure_timeout_ms = 250").unwrap();
        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.measure_timeout, Duration::from_millis(250));
    }
}
