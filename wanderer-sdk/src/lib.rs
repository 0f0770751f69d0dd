//! Wanderer Rotator SDK
//!
//! Discovers Wanderer rotators on USB serial ports, opens them and drives
//! them. Moves return as soon as the command is sent; a background monitor
//! tracks completion and updates the status reported by
//! [`RotatorSdk::get_status`].
//!
//! ```no_run
//! use std::time::Duration;
//! use wanderer_sdk::{RotatorSdk, SdkConfig};
//!
//! # async fn run() -> wanderer_sdk::Result<()> {
//! let sdk = RotatorSdk::from_config(&SdkConfig::default());
//! for id in sdk.scan().await? {
//!     sdk.open(id).await?;
//!     sdk.move_to(id, 90.0).await?;
//!     while sdk.get_status(id).await?.moving {
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!     }
//!     sdk.close(id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod controller;
pub mod device;
pub mod logging;
pub mod monitor;
pub mod registry;

pub use api::{sdk_version, RotatorSdk, SDK_VERSION};
pub use controller::RotatorController;
pub use device::{Device, OvershootPhase};
pub use logging::init_logging;
pub use wanderer_core::{
    ConfigMask, DeviceId, ErrorKind, Result, RotatorConfig, RotatorError, RotatorModel,
    RotatorStatus, SdkConfig, VersionInfo,
};
