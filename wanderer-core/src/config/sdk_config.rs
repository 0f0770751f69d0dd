//! Static SDK configuration loaded once at startup
//!
//! Located at `~/.config/wanderer-rotator/config.toml` by default. Every
//! section and field is optional; missing values fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::{MAX_DEVICES, USB_PID, USB_VID};
use crate::Result;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level emitted (debug and info are off by default)
    pub level: LogLevel,
    /// Prefix each line with a timestamp
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Error,
            timestamps: true,
        }
    }
}

/// USB discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// USB Vendor ID of the serial bridge
    pub usb_vid: u16,
    /// USB Product ID of the serial bridge
    pub usb_pid: u16,
    /// Maximum number of rotators registered by one scan
    pub max_devices: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            usb_vid: USB_VID,
            usb_pid: USB_PID,
            max_devices: MAX_DEVICES,
        }
    }
}

/// Static configuration for the SDK and the `wrctl` front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SdkConfig {
    /// Logging configuration (level, timestamps)
    pub logging: LoggingConfig,

    /// Discovery configuration (USB filter, device limit)
    pub discovery: DiscoveryConfig,
}

impl SdkConfig {
    /// Parse SdkConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SdkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize SdkConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load the configuration file, falling back to defaults if it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the SDK cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.discovery.max_devices == 0 || self.discovery.max_devices > MAX_DEVICES {
            return Err(crate::RotatorError::Config(format!(
                "discovery.max_devices must be 1-{}, got {}",
                MAX_DEVICES, self.discovery.max_devices
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_sdk_config() {
        let config = SdkConfig::default();
        assert_eq!(config.logging.level, LogLevel::Error);
        assert!(config.logging.timestamps);
        assert_eq!(config.discovery.usb_vid, 0x1A86);
        assert_eq!(config.discovery.usb_pid, 0x7523);
        assert_eq!(config.discovery.max_devices, 32);
    }

    #[test]
    fn test_sdk_config_serialization() {
        let config = SdkConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("[discovery]"));
        assert!(toml_str.contains("level = \"error\""));
    }

    #[test]
    fn test_sdk_config_deserialization() {
        let toml_str = r#"
            [logging]
            level = "debug"
            timestamps = false

            [discovery]
            usb_vid = 0x0403
            usb_pid = 0x6001
            max_devices = 4
        "#;

        let config = SdkConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(!config.logging.timestamps);
        assert_eq!(config.discovery.usb_vid, 0x0403);
        assert_eq!(config.discovery.usb_pid, 0x6001);
        assert_eq!(config.discovery.max_devices, 4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = SdkConfig::from_toml("[logging]\nlevel = \"info\"\n").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.logging.timestamps);
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_invalid_max_devices_rejected() {
        let result = SdkConfig::from_toml("[discovery]\nmax_devices = 0\n");
        assert!(result.is_err());

        let result = SdkConfig::from_toml("[discovery]\nmax_devices = 64\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\ntimestamps = false").unwrap();

        let config = SdkConfig::load(file.path()).unwrap();
        assert!(!config.logging.timestamps);
        assert_eq!(config.logging.level, LogLevel::Error);
    }
}
