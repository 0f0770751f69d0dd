//! Device controller
//!
//! High-level operations on one rotator: handshake, status query, configuration
//! and motion commands. Every method runs to completion while the caller holds
//! the registry lock; only the motion monitor outlives a call.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use wanderer_core::{
    backlash_to_tenths, ConfigMask, DeviceId, Result, RotatorConfig, RotatorError,
    RotatorStatus, VersionInfo,
};
use wanderer_hardware::protocol::{
    self, contains_marker, parse_float_field, parse_int_field, parse_model, read_field,
    FIELD_TIMEOUT, RESPONSE_BUF_LEN, SETTLE_DELAY, TERMINATOR,
};
use wanderer_hardware::{Connector, Transport};

use crate::device::{Device, OvershootPhase};
use crate::monitor;

/// Handshake probes sent before giving up
pub const HANDSHAKE_ATTEMPTS: u32 = 5;

/// Pause between handshake probes
pub const HANDSHAKE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Pause before flushing input ahead of a move command
pub const MOVE_FLUSH_DELAY: Duration = Duration::from_millis(50);

/// Probe a transport for a Wanderer rotator.
///
/// Returns the number of attempts it took for the device marker to appear.
/// A write failure aborts immediately; silence or a read error is retried.
pub async fn handshake(transport: &dyn Transport) -> Result<u32> {
    debug!("Handshake started on {}", transport.port_path());

    if !transport.is_open() {
        return Err(RotatorError::NotOpen(transport.port_path().to_string()));
    }

    sleep(SETTLE_DELAY).await;

    for attempt in 1..=HANDSHAKE_ATTEMPTS {
        transport.clear_all().await?;
        transport
            .write(protocol::PROBE.as_bytes())
            .await
            .inspect_err(|e| debug!("Handshake: writing probe failed: {}", e))?;

        match transport
            .read_until(RESPONSE_BUF_LEN, TERMINATOR, FIELD_TIMEOUT)
            .await
        {
            Ok(response) if contains_marker(&String::from_utf8_lossy(&response)) => {
                debug!("Rotator answered after {} attempt(s)", attempt);
                return Ok(attempt);
            }
            Ok(_) => {}
            // Treated like silence
            Err(e) => warn!("Handshake attempt {} read failed: {}", attempt, e),
        }

        sleep(HANDSHAKE_RETRY_DELAY).await;
    }

    debug!(
        "Handshake on {} timed out after {} attempts",
        transport.port_path(),
        HANDSHAKE_ATTEMPTS
    );
    Err(RotatorError::HandshakeFailed {
        attempts: HANDSHAKE_ATTEMPTS,
    })
}

/// Signed shortest rotation from `current` to `target`, in `[-180, 180)`
///
/// ```
/// use wanderer_sdk::controller::shortest_delta;
///
/// assert_eq!(shortest_delta(10.0, 350.0), 20.0);
/// assert_eq!(shortest_delta(350.0, 10.0), -20.0);
/// assert_eq!(shortest_delta(90.0, 90.0), 0.0);
/// ```
pub fn shortest_delta(target: f64, current: f64) -> f64 {
    (target - current + 180.0).rem_euclid(360.0) - 180.0
}

/// Controller for one rotator
#[derive(Debug)]
pub struct RotatorController {
    device: Arc<Device>,
}

impl RotatorController {
    pub fn new(device: Device) -> Self {
        Self {
            device: Arc::new(device),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Open the transport, handshake and load calibration and status.
    ///
    /// The transport is closed again if the handshake or the status query
    /// fails.
    pub async fn open(&self, connector: &dyn Connector) -> Result<()> {
        debug!("Opening device {} on {}", self.id(), self.device.port_path());

        if let Some(stale) = self.device.take_transport().await {
            monitor::stop(&self.device).await;
            stale.close().await;
        }

        let transport = connector.open(self.device.port_path()).await?;

        let ready = async {
            handshake(transport.as_ref()).await?;
            self.query_status(transport.as_ref()).await
        }
        .await;

        if let Err(e) = ready {
            warn!("Opening device {} failed: {}", self.id(), e);
            transport.close().await;
            return Err(e);
        }

        self.device.set_transport(Some(transport)).await;
        info!("Rotator {} opened", self.id());
        Ok(())
    }

    /// Stop the monitor and release the transport. Idempotent.
    pub async fn close(&self) {
        monitor::stop(&self.device).await;
        if let Some(transport) = self.device.take_transport().await {
            transport.close().await;
            info!("Rotator {} closed", self.id());
        }
    }

    /// Query model, firmware, position, backlash and direction.
    ///
    /// Fields are committed as they are parsed: a failure part way through
    /// keeps the fields read before it.
    pub async fn query_status(&self, transport: &dyn Transport) -> Result<()> {
        debug!("Status query started for device {}", self.id());

        sleep(SETTLE_DELAY).await;
        transport.clear_all().await?;
        transport.write(protocol::PROBE.as_bytes()).await?;

        let line = read_field(transport, FIELD_TIMEOUT, "model").await?;
        let model = parse_model(&line)?;
        self.device
            .update_info(|info| info.model_id = model.clone())
            .await;

        let line = read_field(transport, FIELD_TIMEOUT, "firmware").await?;
        let firmware = parse_int_field(&line, "firmware")?;
        let firmware = u32::try_from(firmware).map_err(|_| {
            RotatorError::Protocol(format!("Negative firmware version {}", firmware))
        })?;
        self.device.update_info(|info| info.firmware = firmware).await;

        let line = read_field(transport, FIELD_TIMEOUT, "position").await?;
        let mechanical = parse_int_field(&line, "position")?;
        self.device
            .update_motion(|motion| motion.set_mechanical_angle(mechanical))
            .await;

        let line = read_field(transport, FIELD_TIMEOUT, "backlash").await?;
        let backlash = parse_float_field(&line, "backlash")?;
        self.device
            .update_info(|info| info.backlash_tenths = backlash_to_tenths(backlash as f32))
            .await;

        let line = read_field(transport, FIELD_TIMEOUT, "reverse state").await?;
        let reverse = parse_int_field(&line, "reverse state")?;
        self.device
            .update_info(|info| info.reverse_direction = reverse != 0)
            .await;

        let detected = self
            .device
            .update_info(|info| info.calibration.apply_model(&model))
            .await;
        match detected {
            Some(detected) => debug!(
                "Status parsed, model={} steps={}",
                model,
                detected.steps_per_degree()
            ),
            None => warn!(
                "Unrecognized rotator model '{}', calibration left unchanged",
                model
            ),
        }

        Ok(())
    }

    pub async fn get_config(&self) -> RotatorConfig {
        self.device.info().await.config()
    }

    /// Apply the fields of `config` selected by `mask`.
    ///
    /// Reverse direction and backlash are written to the device before the
    /// in-memory value changes. The overshoot fields only exist in memory.
    pub async fn set_config(&self, config: &RotatorConfig, mask: ConfigMask) -> Result<()> {
        if mask.contains(ConfigMask::BACKLASH) {
            // Validates before anything is sent
            protocol::backlash_command_value(config.backlash)?;
        }
        if mask.contains(ConfigMask::OVERSHOOT_ANGLE)
            && (!config.overshoot_angle.is_finite() || config.overshoot_angle < 0.0)
        {
            return Err(RotatorError::InvalidParameter(format!(
                "Overshoot angle must be a non-negative number of degrees, got {}",
                config.overshoot_angle
            )));
        }

        if mask.contains(ConfigMask::REVERSE_DIRECTION) {
            let transport = self.device.open_transport().await?;
            let command = protocol::reverse_direction_command(config.reverse_direction);
            protocol::send_command(transport.as_ref(), command).await?;
            self.device
                .update_info(|info| info.reverse_direction = config.reverse_direction)
                .await;
        }

        if mask.contains(ConfigMask::BACKLASH) {
            let transport = self.device.open_transport().await?;
            let command = protocol::backlash_command(config.backlash)?;
            protocol::send_command(transport.as_ref(), &command).await?;
            self.device
                .update_info(|info| info.backlash_tenths = backlash_to_tenths(config.backlash))
                .await;
        }

        self.device
            .update_info(|info| {
                if mask.contains(ConfigMask::OVERSHOOT) {
                    info.overshoot = config.overshoot;
                }
                if mask.contains(ConfigMask::OVERSHOOT_ANGLE) {
                    info.overshoot_angle = config.overshoot_angle;
                }
                if mask.contains(ConfigMask::OVERSHOOT_DIRECTION) {
                    info.overshoot_direction = config.overshoot_direction;
                }
            })
            .await;

        Ok(())
    }

    pub async fn get_status(&self) -> RotatorStatus {
        self.device.status().await
    }

    pub async fn get_version(&self) -> VersionInfo {
        self.device.info().await.version()
    }

    /// Start a relative move by `angle` degrees and return immediately.
    ///
    /// Completion is tracked by the motion monitor; poll
    /// [`get_status`](Self::get_status) until `moving` is false.
    pub async fn move_by(&self, angle: f64) -> Result<()> {
        let transport = self.device.open_transport().await?;

        if !angle.is_finite() {
            return Err(RotatorError::InvalidParameter(format!(
                "Move angle must be finite, got {}",
                angle
            )));
        }

        let calibration = self.device.info().await.calibration;
        if !calibration.is_known() {
            return Err(RotatorError::InvalidState(
                "Rotator calibration unknown, open the device first".to_string(),
            ));
        }

        let command = protocol::move_command(angle, calibration.steps_per_degree());
        debug!("Move: angle={:.2}, command={}", angle, command);

        self.device.update_motion(|m| m.target_angle = angle).await;

        // The previous monitor must not consume this move's report
        monitor::stop(&self.device).await;

        sleep(MOVE_FLUSH_DELAY).await;
        transport.clear_input().await?;
        protocol::send_command(transport.as_ref(), &command).await?;

        self.device.update_motion(|m| m.moving = true).await;
        monitor::start(&self.device).await;
        Ok(())
    }

    /// Move to the absolute `angle` over the shortest path.
    pub async fn move_to(&self, angle: f64) -> Result<()> {
        let transport = self.device.open_transport().await?;

        if !(0.0..360.0).contains(&angle) {
            return Err(RotatorError::InvalidParameter(format!(
                "Target angle must be in [0, 360), got {}",
                angle
            )));
        }

        self.query_status(transport.as_ref()).await?;

        let current = self.device.motion().await.position;
        let delta = shortest_delta(angle, current);
        if delta == 0.0 {
            debug!("Already at {:.3} degrees", angle);
            return Ok(());
        }

        debug!("Moving from {:.3} by {:.3} to {:.3}", current, delta, angle);
        self.move_by(delta).await
    }

    pub async fn find_home(&self) -> Result<()> {
        self.move_to(0.0).await
    }

    /// Declare the current position to be `angle`. Only 0 is supported.
    pub async fn sync_position(&self, angle: f64) -> Result<()> {
        let transport = self.device.open_transport().await?;

        if angle != 0.0 {
            return Err(RotatorError::InvalidParameter(format!(
                "Only syncing to 0 degrees is supported, got {}",
                angle
            )));
        }

        protocol::send_command(transport.as_ref(), protocol::SET_ZERO).await?;
        self.device
            .update_motion(|m| m.set_mechanical_angle(0))
            .await;
        Ok(())
    }

    /// Send the stop command and clear the moving flag.
    ///
    /// The device's final position arrives later in its completion report.
    /// Any armed overshoot is dropped so that report cannot start a return leg.
    pub async fn stop_move(&self) -> Result<()> {
        let transport = self.device.open_transport().await?;
        protocol::send_command(transport.as_ref(), protocol::STOP).await?;
        self.device
            .update_motion(|m| {
                m.moving = false;
                m.overshoot_phase = OvershootPhase::None;
            })
            .await;
        Ok(())
    }
}
