//! Public SDK surface
//!
//! [`RotatorSdk`] owns the device registry behind one lock. Every call takes
//! that lock for its whole duration, so calls from any number of tasks are
//! totally ordered. Motion completion is tracked in the background; poll
//! [`RotatorSdk::get_status`] until `moving` is false before issuing the next
//! move, `open`, `close` or `set_config` on the same device.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use wanderer_core::config::DiscoveryConfig;
use wanderer_core::model::MAX_DEVICES;
use wanderer_core::{
    ConfigMask, DeviceId, Result, RotatorConfig, RotatorStatus, SdkConfig, VersionInfo,
};
use wanderer_hardware::{Connector, SerialConnector};

use crate::controller::{self, RotatorController};
use crate::device::Device;
use crate::registry::DeviceRegistry;

/// Version of this SDK
pub const SDK_VERSION: &str = "1.0.0";

/// Version of this SDK
pub fn sdk_version() -> &'static str {
    SDK_VERSION
}

/// Entry point for discovering and driving rotators
pub struct RotatorSdk {
    registry: Mutex<DeviceRegistry>,
    connector: Arc<dyn Connector>,
    max_devices: usize,
}

impl RotatorSdk {
    /// Create an SDK instance that discovers devices through `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            registry: Mutex::new(DeviceRegistry::new()),
            connector,
            max_devices: MAX_DEVICES,
        }
    }

    /// SDK instance for real hardware, filtered by the configured USB ids
    pub fn from_config(config: &SdkConfig) -> Self {
        Self::with_discovery(&config.discovery)
    }

    pub fn with_discovery(discovery: &DiscoveryConfig) -> Self {
        let connector = SerialConnector::new(discovery.usb_vid, discovery.usb_pid);
        Self::new(Arc::new(connector)).with_max_devices(discovery.max_devices)
    }

    /// Limit the number of rotators a scan registers (capped at 32)
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices.min(MAX_DEVICES);
        self
    }

    async fn controller(&self, id: DeviceId) -> Result<Arc<RotatorController>> {
        self.registry.lock().await.get(id)
    }

    /// Discover rotators and register them with fresh ids starting at 0.
    ///
    /// Entries from a previous scan are closed and discarded. Each candidate
    /// is opened, probed and closed again; use [`open`](Self::open) before
    /// talking to a device.
    pub async fn scan(&self) -> Result<Vec<DeviceId>> {
        let mut registry = self.registry.lock().await;

        for stale in registry.drain() {
            stale.close().await;
        }

        let candidates = self.connector.candidates()?;
        debug!("Scanning {} candidate port(s)", candidates.len());

        let mut ids = Vec::new();
        for path in candidates {
            if ids.len() >= self.max_devices {
                break;
            }

            debug!("Trying to open device: {}", path);
            let transport = match self.connector.open(&path).await {
                Ok(transport) => transport,
                Err(e) => {
                    debug!("Failed to open port {}: {}", path, e);
                    continue;
                }
            };

            let probe = controller::handshake(transport.as_ref()).await;
            transport.close().await;

            match probe {
                Ok(_) => {
                    let id = ids.len() as DeviceId;
                    registry.register(RotatorController::new(Device::new(id, path.as_str())))?;
                    info!("Found Wanderer Rotator {} on {}", id, path);
                    ids.push(id);
                }
                Err(e) => debug!("No rotator on {}: {}", path, e),
            }
        }

        Ok(ids)
    }

    /// Ids currently registered
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.registry.lock().await.ids()
    }

    /// Close a device and forget it
    pub async fn remove(&self, id: DeviceId) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let controller = registry.remove(id)?;
        controller.close().await;
        Ok(())
    }

    /// Open a device: handshake, then load calibration and status
    pub async fn open(&self, id: DeviceId) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.open(self.connector.as_ref()).await
    }

    /// Close a device. Idempotent.
    pub async fn close(&self, id: DeviceId) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.close().await;
        Ok(())
    }

    pub async fn get_config(&self, id: DeviceId) -> Result<RotatorConfig> {
        let registry = self.registry.lock().await;
        Ok(registry.get(id)?.get_config().await)
    }

    /// Apply the fields of `config` selected by `mask`
    pub async fn set_config(
        &self,
        id: DeviceId,
        config: &RotatorConfig,
        mask: ConfigMask,
    ) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.set_config(config, mask).await
    }

    /// Last known status. Never touches the device.
    pub async fn get_status(&self, id: DeviceId) -> Result<RotatorStatus> {
        let registry = self.registry.lock().await;
        Ok(registry.get(id)?.get_status().await)
    }

    pub async fn get_version(&self, id: DeviceId) -> Result<VersionInfo> {
        let registry = self.registry.lock().await;
        Ok(registry.get(id)?.get_version().await)
    }

    /// Move to 0 degrees
    pub async fn find_home(&self, id: DeviceId) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.find_home().await
    }

    /// Declare the current position as `angle` (only 0 is supported)
    pub async fn sync_position(&self, id: DeviceId, angle: f64) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.sync_position(angle).await
    }

    /// Start a relative move. Positive angles turn counterclockwise.
    pub async fn move_by(&self, id: DeviceId, angle: f64) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.move_by(angle).await
    }

    /// Start a move to an absolute angle in `[0, 360)` over the shortest path
    pub async fn move_to(&self, id: DeviceId, angle: f64) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.move_to(angle).await
    }

    pub async fn stop_move(&self, id: DeviceId) -> Result<()> {
        let registry = self.registry.lock().await;
        registry.get(id)?.stop_move().await
    }

    /// Whether the device has an open transport
    pub async fn is_open(&self, id: DeviceId) -> Result<bool> {
        let controller = self.controller(id).await?;
        Ok(controller.device().is_open().await)
    }

    /// Serial port the device was found on
    pub async fn port_path(&self, id: DeviceId) -> Result<String> {
        let controller = self.controller(id).await?;
        Ok(controller.device().port_path().to_string())
    }
}
