//! Configuration types for the Wanderer Rotator SDK
//!
//! A single [`SdkConfig`] file holds logging and discovery settings. It is
//! read once at startup; protocol timings are fixed and intentionally absent.

mod paths;
mod sdk_config;

pub use paths::{default_config_path, resolve_config_path, CONFIG_ENV_VAR};
pub use sdk_config::{DiscoveryConfig, LogLevel, LoggingConfig, SdkConfig};
