// src/config.rs
//
// Bridge configuration, read from a TOML file.
// Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::io::serial::heuristic::DEFAULT_GUARD_TIME;
use crate::io::serial::TurnaroundLimits;

/// Directory under the platform config dir holding `config.toml`.
const CONFIG_DIR_NAME: &str = "radio-bridge";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Baud used when the caller does not supply one
    #[serde(default = "default_baud")]
    pub default_baud: u32,
    /// Ceiling on the post-write flush wait; a timeout is a hard failure
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    #[serde(default = "default_turnaround_min_ms")]
    pub turnaround_min_ms: u64,
    #[serde(default = "default_turnaround_max_ms")]
    pub turnaround_max_ms: u64,
    /// AT escape guard silence for the active radio probe
    #[serde(default = "default_guard_time_ms")]
    pub guard_time_ms: u64,
    #[serde(default = "default_probe_on_connect")]
    pub probe_on_connect: bool,
    /// Only list ports that pass the passive radio heuristic
    #[serde(default)]
    pub filter_radio_ports: bool,
    /// Sleep between polls of the service worker
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Directory for timestamped log files; file logging is off when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_baud() -> u32 {
    57600 // SiK / RFD900x factory default
}
fn default_flush_timeout_ms() -> u64 {
    50
}
fn default_turnaround_min_ms() -> u64 {
    1
}
fn default_turnaround_max_ms() -> u64 {
    10
}
fn default_guard_time_ms() -> u64 {
    DEFAULT_GUARD_TIME.as_millis() as u64
}
fn default_probe_on_connect() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            default_baud: default_baud(),
            flush_timeout_ms: default_flush_timeout_ms(),
            turnaround_min_ms: default_turnaround_min_ms(),
            turnaround_max_ms: default_turnaround_max_ms(),
            guard_time_ms: default_guard_time_ms(),
            probe_on_connect: default_probe_on_connect(),
            filter_radio_ports: false,
            poll_interval_ms: default_poll_interval_ms(),
            log_dir: None,
        }
    }
}

impl BridgeConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn guard_time(&self) -> Duration {
        Duration::from_millis(self.guard_time_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn turnaround_limits(&self) -> TurnaroundLimits {
        TurnaroundLimits {
            min: Duration::from_millis(self.turnaround_min_ms),
            max: Duration::from_millis(self.turnaround_max_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_baud == 0 {
            return Err(ConfigError::Invalid("default_baud must be > 0".to_string()));
        }
        if self.flush_timeout_ms == 0 {
            return Err(ConfigError::Invalid("flush_timeout_ms must be > 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".to_string()));
        }
        if self.turnaround_min_ms > self.turnaround_max_ms {
            return Err(ConfigError::Invalid(format!(
                "turnaround_min_ms ({}) exceeds turnaround_max_ms ({})",
                self.turnaround_min_ms, self.turnaround_max_ms
            )));
        }
        Ok(())
    }
}

/// Platform default location, e.g. `~/.config/radio-bridge/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse and validate a TOML document.
pub fn parse_config(text: &str, origin: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or from the default location when `None`.
/// A missing file yields defaults; an unreadable or invalid one is an error.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => return Ok(BridgeConfig::default()),
    };

    if !path.exists() {
        tlog!("[config] {} not found, using defaults", path.display());
        return Ok(BridgeConfig::default());
    }

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&text, &path.display().to_string())?;
    tlog!("[config] Loaded {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_baud, 57600);
        assert_eq!(config.flush_timeout(), Duration::from_millis(50));
        assert_eq!(config.turnaround_limits(), TurnaroundLimits::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = parse_config("default_baud = 115200\nprobe_on_connect = false\n", "inline").unwrap();
        assert_eq!(config.default_baud, 115200);
        assert!(!config.probe_on_connect);
        assert_eq!(config.guard_time_ms, 1000);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn test_invalid_turnaround_range_rejected() {
        let err = parse_config("turnaround_min_ms = 20\nturnaround_max_ms = 5\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_flush_timeout_rejected() {
        assert!(parse_config("flush_timeout_ms = 0\n", "inline").is_err());
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = parse_config("default_baud = \"fast\"\n", "bridge.toml").unwrap_err();
        assert!(err.to_string().contains("bridge.toml"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = 2\nlog_dir = \"/tmp/rb-logs\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(2));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/rb-logs")));
    }
}
