//! Per-device state
//!
//! A [`Device`] is created when discovery finds a rotator and lives until it
//! is removed from the registry. Its fields are split by owner:
//!
//! - `info` (calibration, version, configuration) is written only by the
//!   foreground controller while it holds the registry lock.
//! - `motion` (position, moving flag, overshoot phase) is shared with the
//!   background motion monitor and is never held across I/O.
//! - `monitor_active` is an atomic flag readable without any lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use wanderer_core::{
    backlash_from_tenths, Calibration, DeviceId, Result, RotatorConfig, RotatorError,
    RotatorStatus, VersionInfo,
};
use wanderer_hardware::Transport;

use crate::monitor::MonitorHandle;

/// Progress of a two-phase backlash overshoot move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OvershootPhase {
    /// Plain move, no return leg
    #[default]
    None,
    /// Travelling past the target
    FirstPhase,
    /// Returning onto the target
    SecondPhase,
}

/// Calibration, version and configuration of a device
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Model identifier as reported (at most 7 characters)
    pub model_id: String,
    pub firmware: u32,
    pub calibration: Calibration,
    pub reverse_direction: bool,
    /// Backlash in tenths of a degree
    pub backlash_tenths: i32,
    pub overshoot: bool,
    pub overshoot_angle: f32,
    pub overshoot_direction: bool,
}

impl DeviceInfo {
    pub fn config(&self) -> RotatorConfig {
        RotatorConfig {
            reverse_direction: self.reverse_direction,
            backlash: backlash_from_tenths(self.backlash_tenths),
            overshoot: self.overshoot,
            overshoot_angle: self.overshoot_angle,
            overshoot_direction: self.overshoot_direction,
        }
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            firmware: self.firmware,
            model: self.model_id.clone(),
        }
    }
}

/// Live motion record, shared with the motion monitor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionStatus {
    /// Raw device angle in degrees x 1000
    pub mechanical_angle: i32,
    /// Position in degrees, always `mechanical_angle / 1000`
    pub position: f64,
    pub moving: bool,
    /// Relative angle of the last commanded move
    pub target_angle: f64,
    /// Rotation the device reported for the last completed move
    pub last_rotated: f64,
    pub overshoot_phase: OvershootPhase,
}

impl MotionStatus {
    /// Update the mechanical angle and the derived position together
    pub fn set_mechanical_angle(&mut self, mechanical_angle: i32) {
        self.mechanical_angle = mechanical_angle;
        self.position = f64::from(mechanical_angle) / 1000.0;
    }
}

/// State of one physical rotator
pub struct Device {
    id: DeviceId,
    port_path: String,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    info: RwLock<DeviceInfo>,
    motion: Mutex<MotionStatus>,
    monitor_active: AtomicBool,
    monitor_generation: AtomicU64,
    pub(crate) monitor: Mutex<Option<MonitorHandle>>,
}

impl Device {
    pub fn new(id: DeviceId, port_path: impl Into<String>) -> Self {
        Self {
            id,
            port_path: port_path.into(),
            transport: RwLock::new(None),
            info: RwLock::new(DeviceInfo::default()),
            motion: Mutex::new(MotionStatus::default()),
            monitor_active: AtomicBool::new(false),
            monitor_generation: AtomicU64::new(0),
            monitor: Mutex::new(None),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    /// The transport, if one is attached and still open
    pub async fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_open())
            .cloned()
    }

    /// The open transport, or a communication error
    pub async fn open_transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport()
            .await
            .ok_or_else(|| RotatorError::NotOpen(self.port_path.clone()))
    }

    pub(crate) async fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self.transport.write().await = transport;
    }

    pub(crate) async fn take_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.write().await.take()
    }

    pub async fn is_open(&self) -> bool {
        self.transport().await.is_some()
    }

    /// Snapshot of calibration, version and configuration
    pub async fn info(&self) -> DeviceInfo {
        self.info.read().await.clone()
    }

    pub(crate) async fn update_info<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut DeviceInfo) -> T,
    {
        let mut info = self.info.write().await;
        f(&mut info)
    }

    /// Snapshot of the motion record
    pub async fn motion(&self) -> MotionStatus {
        *self.motion.lock().await
    }

    pub(crate) async fn update_motion<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut MotionStatus) -> T,
    {
        let mut motion = self.motion.lock().await;
        f(&mut motion)
    }

    /// Arm a two-phase overshoot for the next move.
    ///
    /// Moves never arm it on their own and `RotatorSdk` does not expose it;
    /// callers holding the `Device` (tests, custom front ends) set it before
    /// `move_by` to get the return leg.
    pub async fn set_overshoot_phase(&self, phase: OvershootPhase) {
        self.motion.lock().await.overshoot_phase = phase;
    }

    pub async fn status(&self) -> RotatorStatus {
        let calibration = self.info.read().await.calibration;
        let motion = self.motion().await;
        RotatorStatus {
            position: motion.position,
            moving: motion.moving,
            steps_per_revolution: calibration.steps_per_revolution(),
            step_size: calibration.step_size(),
        }
    }

    pub fn is_monitor_active(&self) -> bool {
        self.monitor_active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_monitor_active(&self, active: bool) {
        self.monitor_active.store(active, Ordering::SeqCst);
    }

    /// Start a new monitor generation and return its number
    pub(crate) fn next_monitor_generation(&self) -> u64 {
        self.monitor_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn monitor_generation(&self) -> u64 {
        self.monitor_generation.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("port_path", &self.port_path)
            .field("monitor_active", &self.is_monitor_active())
            .finish_non_exhaustive()
    }
}
