//! SDK construction and device selection

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};
use wanderer_core::{DeviceId, RotatorModel, SdkConfig};
use wanderer_hardware::MockConnector;
use wanderer_sdk::RotatorSdk;

use crate::format::DeviceSummary;

/// Hardware backend the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Serial,
    Mock(RotatorModel),
}

/// Build an SDK instance for `backend`
pub fn build_sdk(backend: Backend, config: &SdkConfig) -> RotatorSdk {
    match backend {
        Backend::Serial => RotatorSdk::from_config(config),
        Backend::Mock(model) => {
            debug!("Using simulated {}", model.name());
            let (connector, _rotator) = MockConnector::single(model);
            RotatorSdk::new(Arc::new(connector))
        }
    }
}

/// Scan and describe every rotator found.
///
/// Version details are only known after `open`, so each device is opened
/// briefly. A device that fails to open is still listed.
pub async fn discover(sdk: &RotatorSdk) -> Result<Vec<DeviceSummary>> {
    let ids = sdk.scan().await.context("Device scan failed")?;

    let mut devices = Vec::with_capacity(ids.len());
    for id in ids {
        let port = sdk.port_path(id).await?;
        let (model, firmware) = match sdk.open(id).await {
            Ok(()) => {
                let version = sdk.get_version(id).await?;
                sdk.close(id).await?;
                (version.model, version.firmware)
            }
            Err(e) => {
                warn!("Failed to open device {} on {}: {}", id, port, e);
                ("unknown".to_string(), 0)
            }
        };
        devices.push(DeviceSummary {
            id,
            port,
            model,
            firmware,
        });
    }
    Ok(devices)
}

/// Pick the requested device, or the first one found.
///
/// An unknown `requested` id falls back to the first device with a warning.
pub fn select_device(ids: &[DeviceId], requested: Option<DeviceId>) -> Result<DeviceId> {
    let Some(&first) = ids.first() else {
        bail!("No Wanderer Rotator found");
    };

    match requested {
        Some(id) if ids.contains(&id) => Ok(id),
        Some(id) => {
            warn!("Device {} not found, using device {}", id, first);
            Ok(first)
        }
        None => Ok(first),
    }
}

/// An SDK instance with one opened rotator
pub struct Session {
    pub sdk: RotatorSdk,
    pub device: DeviceId,
}

impl Session {
    /// Scan, select and open a rotator
    pub async fn connect(sdk: RotatorSdk, requested: Option<DeviceId>) -> Result<Self> {
        let ids = sdk.scan().await.context("Device scan failed")?;
        let device = select_device(&ids, requested)?;

        sdk.open(device)
            .await
            .with_context(|| format!("Failed to open device {}", device))?;
        debug!("Opened device {}", device);

        Ok(Self { sdk, device })
    }

    /// Close the rotator
    pub async fn close(&self) -> Result<()> {
        self.sdk.close(self.device).await?;
        Ok(())
    }
}
