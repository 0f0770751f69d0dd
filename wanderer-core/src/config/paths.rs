//! Default path resolution for the SDK configuration file
//!
//! Uses the XDG config directory when available, with a system-wide fallback.

use std::path::PathBuf;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV_VAR: &str = "WANDERER_ROTATOR_CONFIG";

/// Returns the default path for the SDK configuration file.
///
/// - Linux/macOS: `~/.config/wanderer-rotator/config.toml`
/// - Fallback: `/etc/wanderer-rotator/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("wanderer-rotator")
        .join("config.toml")
}

/// Resolve the configuration path: explicit path > environment > default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    })
}
