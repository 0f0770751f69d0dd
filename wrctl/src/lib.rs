//! Wanderer Rotator CLI Library
//!
//! This library provides the core functionality for the `wrctl` tool: device
//! selection, output formatting and the interactive session. Device control
//! itself lives in [`wanderer_sdk`].
//!
//! ```no_run
//! use wanderer_core::{RotatorModel, SdkConfig};
//! use wrctl::session::{build_sdk, Backend, Session};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sdk = build_sdk(Backend::Mock(RotatorModel::Mini), &SdkConfig::default());
//! let session = Session::connect(sdk, None).await?;
//! let status = session.sdk.get_status(session.device).await?;
//! println!("Position: {:.2}°", status.position);
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// Configuration loading for the CLI tool.
pub mod config;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;

/// Interactive command session.
pub mod interactive;

/// SDK construction and device selection.
pub mod session;
