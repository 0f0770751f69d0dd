//! CLI configuration management
//!
//! Loads the SDK configuration file and applies command-line overrides.
//!
//! Priority chain (lowest to highest):
//! 1. Defaults
//! 2. Config file (`--config`, then `WANDERER_ROTATOR_CONFIG`, then the default path)
//! 3. CLI arguments

use std::path::PathBuf;

use anyhow::{Context, Result};
use wanderer_core::config::LogLevel;
use wanderer_core::{resolve_config_path, SdkConfig};

/// Load the SDK configuration.
///
/// With `skip_file` the defaults are used as-is. A missing file is not an
/// error; an unreadable or invalid one is.
pub fn load_config(explicit: Option<PathBuf>, skip_file: bool) -> Result<SdkConfig> {
    let config = if skip_file {
        SdkConfig::default()
    } else {
        let path = resolve_config_path(explicit);
        SdkConfig::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Raise the log level to at least debug when `--verbose` is given
pub fn apply_verbose(config: &mut SdkConfig, verbose: bool) {
    if !verbose {
        return;
    }
    if !matches!(config.logging.level, LogLevel::Debug | LogLevel::Trace) {
        config.logging.level = LogLevel::Debug;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_skip_file_uses_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/rotator.toml")), true).unwrap();
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path().join("absent.toml")), false).unwrap();
        assert_eq!(config, SdkConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"info\"\n\n[discovery]\nmax_devices = 4").unwrap();

        let config = load_config(Some(file.path().to_path_buf()), false).unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.discovery.max_devices, 4);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[discovery]\nmax_devices = 0").unwrap();

        let err = load_config(Some(file.path().to_path_buf()), false).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging\nlevel = ").unwrap();

        let err = load_config(Some(file.path().to_path_buf()), false).unwrap_err();
        assert!(err.to_string().contains("Failed to load config file"));
    }

    #[test]
    fn test_apply_verbose() {
        let mut config = SdkConfig::default();
        apply_verbose(&mut config, false);
        assert_eq!(config.logging.level, LogLevel::Error);

        apply_verbose(&mut config, true);
        assert_eq!(config.logging.level, LogLevel::Debug);

        config.logging.level = LogLevel::Trace;
        apply_verbose(&mut config, true);
        assert_eq!(config.logging.level, LogLevel::Trace);
    }
}
