//! Device registry
//!
//! Maps registry-scoped ids to rotator controllers. The registry itself is
//! not synchronized; [`RotatorSdk`](crate::RotatorSdk) keeps it behind the
//! single lock that serializes every API call.

use std::collections::BTreeMap;
use std::sync::Arc;

use wanderer_core::{DeviceId, Result, RotatorError};

use crate::controller::RotatorController;

/// Registry of discovered rotators, ordered by id
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Arc<RotatorController>>,
}

impl DeviceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under its device id
    ///
    /// Returns error if the id is already taken.
    pub fn register(&mut self, controller: RotatorController) -> Result<Arc<RotatorController>> {
        let id = controller.id();
        if self.devices.contains_key(&id) {
            return Err(RotatorError::InvalidParameter(format!(
                "Device id {} is already registered",
                id
            )));
        }

        let controller = Arc::new(controller);
        self.devices.insert(id, controller.clone());
        Ok(controller)
    }

    /// Get a controller by id, returning an error if not found
    pub fn get(&self, id: DeviceId) -> Result<Arc<RotatorController>> {
        self.devices
            .get(&id)
            .cloned()
            .ok_or(RotatorError::InvalidId(id))
    }

    /// All registered ids in ascending order
    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    pub fn remove(&mut self, id: DeviceId) -> Result<Arc<RotatorController>> {
        self.devices.remove(&id).ok_or(RotatorError::InvalidId(id))
    }

    /// Drop every entry and return them so the caller can release them
    pub fn drain(&mut self) -> Vec<Arc<RotatorController>> {
        std::mem::take(&mut self.devices).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
