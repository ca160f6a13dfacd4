//! Configuration loading for the VNA client.
//!
//! Strongly-typed settings loaded from:
//! 1. a `vna.toml` file (base configuration)
//! 2. environment variables (prefixed with `VNA_`, nested keys split on
//!    `__`, e.g. `VNA_CONNECTION__HOST=192.168.1.100`)
//!
//! # Example
//!
//! ```toml
//! [connection]
//! host = "192.168.1.100"
//! port = 5025
//! timeout_ms = 10000000
//!
//! [sweep]
//! num_points = 1000
//! if_bandwidth_hz = 1000.0
//!
//! [sweep.axis]
//! mode = "center_span"
//! center_hz = 8e6
//! span_hz = 1e6
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sweep::SweepConfig;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] figment::Error),
    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VnaSettings {
    /// Instrument endpoint settings.
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Default sweep applied by callers that take their sweep from
    /// configuration rather than building one in code.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl VnaSettings {
    /// Load from `vna.toml` in the working directory plus `VNA_`
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_file("vna.toml")
    }

    /// Load from an explicit file path plus `VNA_` environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VNA_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.host.is_empty() {
            return Err(ConfigError::Validation(
                "connection.host must not be empty".to_string(),
            ));
        }
        if self.connection.read_terminator.len() != 1 {
            return Err(ConfigError::Validation(
                "connection.read_terminator must be a single byte".to_string(),
            ));
        }
        self.sweep
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

/// Socket endpoint settings for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Instrument identifier used in logs and measurement records.
    #[serde(default = "default_id")]
    pub id: String,
    /// Instrument host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,
    /// SCPI socket port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-call timeout in milliseconds.
    ///
    /// The default is effectively unbounded because the `*OPC?` barrier
    /// blocks for the full sweep time; a caller embedding this client in
    /// a larger system should impose its own deadline instead.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Line terminator appended to outgoing commands.
    #[serde(default = "default_terminator")]
    pub write_terminator: String,
    /// Line terminator ending incoming responses (single byte).
    #[serde(default = "default_terminator")]
    pub read_terminator: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            id: default_id(),
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            write_terminator: default_terminator(),
            read_terminator: default_terminator(),
        }
    }
}

impl ConnectionSettings {
    /// `host:port` form used to open the socket.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn read_terminator_byte(&self) -> u8 {
        self.read_terminator.as_bytes().first().copied().unwrap_or(b'\n')
    }
}

fn default_id() -> String {
    "vna".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5025
}

fn default_timeout_ms() -> u64 {
    10_000_000
}

fn default_terminator() -> String {
    "\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = VnaSettings::default();
        assert_eq!(settings.connection.address(), "localhost:5025");
        assert_eq!(settings.connection.timeout(), Duration::from_secs(10_000));
        assert_eq!(settings.connection.read_terminator_byte(), b'\n');
        assert_eq!(settings.sweep.num_points(), 1000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[connection]
id = "bench_vna"
host = "192.168.1.42"
timeout_ms = 5000

[sweep]
num_points = 201

[sweep.axis]
mode = "start_stop"
start_hz = 1e6
stop_hz = 9e6
"#
        )
        .unwrap();

        let settings = VnaSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.connection.id, "bench_vna");
        assert_eq!(settings.connection.address(), "192.168.1.42:5025");
        assert_eq!(settings.connection.timeout_ms, 5000);
        assert_eq!(settings.sweep.num_points(), 201);
    }

    #[test]
    fn test_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nhost = \"10.0.0.7\"").unwrap();

        // A key no other test asserts, so concurrent tests that also read
        // the environment are unaffected.
        std::env::set_var("VNA_SWEEP__POWER_DBM", "-5.0");
        let settings = VnaSettings::from_file(file.path()).unwrap();
        std::env::remove_var("VNA_SWEEP__POWER_DBM");

        assert_eq!(settings.connection.address(), "10.0.0.7:5025");
        assert_eq!(settings.sweep.power_dbm(), -5.0);
    }

    #[test]
    fn test_invalid_sweep_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sweep]\nnum_points = 0").unwrap();

        let err = VnaSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let settings = VnaSettings::default();
        let rendered = toml::to_string(&settings).unwrap();
        let reparsed: VnaSettings = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.connection.address(), settings.connection.address());
        assert_eq!(reparsed.sweep, settings.sweep);
    }
}
