//! Wanderer Rotator Core Library
//!
//! Shared types, calibration tables, and configuration for the Wanderer
//! Rotator SDK. This crate is used by the hardware, SDK, and CLI crates.

pub mod config;
pub mod error;
pub mod model;
pub mod types;

// Re-export commonly used types
pub use config::{default_config_path, resolve_config_path, SdkConfig};
pub use error::*;
pub use model::{Calibration, RotatorModel};
pub use types::*;
