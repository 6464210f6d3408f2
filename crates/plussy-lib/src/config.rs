//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol;
use crate::reconnect::ReconnectConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Port for both the discovery broadcast and the control connection.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Substring identifying a device announcement.
    #[serde(default = "default_discovery_marker")]
    pub discovery_marker: String,

    /// Wait per discovery attempt, in milliseconds.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// TCP connect timeout, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read timeout on the control stream, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// First delay before a collaborator restarts a failed connection.
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_port() -> u16 {
    protocol::PORT
}
fn default_discovery_marker() -> String {
    protocol::DISCOVERY_MARKER.into()
}
fn default_discovery_timeout_ms() -> u64 {
    protocol::DISCOVERY_TIMEOUT.as_millis() as u64
}
fn default_connect_timeout_ms() -> u64 {
    protocol::CONNECT_TIMEOUT.as_millis() as u64
}
fn default_read_timeout_ms() -> u64 {
    protocol::READ_TIMEOUT.as_millis() as u64
}
fn default_reconnect_initial_ms() -> u64 {
    1000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            discovery_marker: default_discovery_marker(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

/// Network parameters consumed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub port: u16,
    pub discovery_marker: String,
    pub discovery_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Config::default().network()
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `port` is 0.
    ZeroPort,
    /// `discovery_marker` is empty or whitespace-only.
    EmptyMarker,
    /// A timeout field is 0 (`field` names it).
    ZeroTimeout { field: &'static str },
    /// `reconnect_initial_ms` exceeds `reconnect_max_ms`.
    ReconnectRange { initial_ms: u64, max_ms: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroPort => write!(f, "Port cannot be 0"),
            ValidationError::EmptyMarker => write!(f, "Discovery marker cannot be empty"),
            ValidationError::ZeroTimeout { field } => write!(f, "{field} must be greater than 0"),
            ValidationError::ReconnectRange { initial_ms, max_ms } => write!(
                f,
                "reconnect_initial_ms ({initial_ms}) is larger than reconnect_max_ms ({max_ms})"
            ),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            dirs::config_dir().map(|p| p.join("Plussy"))
        }
        #[cfg(not(windows))]
        {
            dirs::config_dir().map(|p| p.join("plussy"))
        }
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push(ValidationError::ZeroPort);
        }
        if self.discovery_marker.trim().is_empty() {
            errors.push(ValidationError::EmptyMarker);
        }
        for (field, value) in [
            ("discovery_timeout_ms", self.discovery_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("reconnect_initial_ms", self.reconnect_initial_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroTimeout { field });
            }
        }
        if self.reconnect_initial_ms > self.reconnect_max_ms {
            errors.push(ValidationError::ReconnectRange {
                initial_ms: self.reconnect_initial_ms,
                max_ms: self.reconnect_max_ms,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Network parameters for the controller.
    ///
    /// Zero timeouts are raised to 1 ms: a zero read timeout is rejected by
    /// the socket API.
    pub fn network(&self) -> NetworkSettings {
        let ms = |v: u64| Duration::from_millis(v.max(1));
        NetworkSettings {
            port: self.port,
            discovery_marker: self.discovery_marker.clone(),
            discovery_timeout: ms(self.discovery_timeout_ms),
            connect_timeout: ms(self.connect_timeout_ms),
            read_timeout: ms(self.read_timeout_ms),
        }
    }

    /// Backoff parameters for collaborators that restart failed connections.
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect_initial_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            ..ReconnectConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ──

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.port, 60000);
        assert_eq!(c.discovery_marker, "plussyDisplay");
        assert_eq!(c.discovery_timeout_ms, 2000);
        assert_eq!(c.read_timeout_ms, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn serialize_roundtrip() {
        let c = Config {
            port: 61000,
            discovery_marker: "otherDisplay".into(),
            read_timeout_ms: 50,
            ..Config::default()
        };
        let toml_str = toml::to_string_pretty(&c).unwrap();
        let c2: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: Config = toml::from_str("port = 61234").unwrap();
        assert_eq!(c.port, 61234);
        assert_eq!(c.discovery_marker, "plussyDisplay");
        assert_eq!(c.connect_timeout_ms, 3000);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn wrong_type_toml_is_error() {
        let result: std::result::Result<Config, _> = toml::from_str("port = \"sixty thousand\"");
        assert!(result.is_err());
    }

    #[test]
    fn config_path_ends_with_toml() {
        if let Some(path) = Config::path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }

    // ── load_from ──

    #[test]
    fn load_from_missing_file_gives_defaults_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (c, warnings) = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(c, Config::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_from_malformed_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is { not valid toml").unwrap();
        let (c, warnings) = Config::load_from(&path);
        assert_eq!(c, Config::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("config parse error"));
    }

    #[test]
    fn load_from_reads_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let c = Config {
            port: 60001,
            ..Config::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&c).unwrap()).unwrap();

        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded, c);
    }

    // ── validate ──

    #[test]
    fn validate_collects_all_errors() {
        let c = Config {
            port: 0,
            discovery_marker: "  ".into(),
            read_timeout_ms: 0,
            reconnect_initial_ms: 5000,
            reconnect_max_ms: 1000,
            ..Config::default()
        };
        let errors = c.validate().unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroPort));
        assert!(errors.contains(&ValidationError::EmptyMarker));
        assert!(errors.contains(&ValidationError::ZeroTimeout {
            field: "read_timeout_ms"
        }));
        assert!(errors.contains(&ValidationError::ReconnectRange {
            initial_ms: 5000,
            max_ms: 1000
        }));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn validation_error_display() {
        assert_eq!(ValidationError::ZeroPort.to_string(), "Port cannot be 0");
        assert_eq!(
            ValidationError::ZeroTimeout {
                field: "read_timeout_ms"
            }
            .to_string(),
            "read_timeout_ms must be greater than 0"
        );
    }

    // ── conversions ──

    #[test]
    fn network_settings_from_config() {
        let net = Config::default().network();
        assert_eq!(net.port, 60000);
        assert_eq!(net.discovery_timeout, Duration::from_secs(2));
        assert_eq!(net.connect_timeout, Duration::from_secs(3));
        assert_eq!(net.read_timeout, Duration::from_millis(100));
        assert_eq!(net, NetworkSettings::default());
    }

    #[test]
    fn network_settings_never_zero_timeout() {
        let c = Config {
            read_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(c.network().read_timeout, Duration::from_millis(1));
    }

    #[test]
    fn reconnect_config_from_config() {
        let c = Config {
            reconnect_initial_ms: 250,
            reconnect_max_ms: 4000,
            ..Config::default()
        };
        let rc = c.reconnect();
        assert_eq!(rc.initial_delay, Duration::from_millis(250));
        assert_eq!(rc.max_delay, Duration::from_millis(4000));
        assert_eq!(rc.multiplier, 2.0);
    }
}
