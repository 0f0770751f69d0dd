//! Motion completion monitor
//!
//! After a move command the device stays silent until the motor stops, then
//! reports the rotation it performed followed by the new mechanical angle.
//! The monitor is a background task that waits for that report, updates the
//! device's motion record and, for a two-phase overshoot move, issues the
//! return leg and waits for its report as well.
//!
//! ```text
//! Idle -> AwaitingFirstReport -> Complete
//!                             -> AwaitingOvershootReturn -> AwaitingSecondReport -> Complete
//! ```
//!
//! The monitor never takes the registry lock. Foreground callers must not
//! issue another move, `open` or `close` on a device while it is moving; the
//! monitor and the caller would otherwise both act on the same stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use wanderer_core::Result;
use wanderer_hardware::protocol::{self, parse_float_field, parse_int_field, read_field};
use wanderer_hardware::Transport;

use crate::device::{Device, OvershootPhase};

/// Read timeout for the rotated-angle line of a completion report
pub const FIRST_REPORT_TIMEOUT: Duration = Duration::from_secs(90);

/// Read timeout for the mechanical-angle line of a completion report
pub const SECOND_REPORT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Time granted to a previous monitor to exit before a new one starts
pub const RESTART_GRACE: Duration = Duration::from_millis(50);

/// Pause before the return leg of an overshoot move
pub const RETURN_DELAY: Duration = Duration::from_millis(100);

/// Monitor state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    AwaitingFirstReport,
    AwaitingOvershootReturn,
    AwaitingSecondReport,
    Complete,
}

/// Handle of a running monitor task
pub(crate) struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Completion report sent by the device
#[derive(Debug, Clone, Copy, PartialEq)]
struct Report {
    rotated: f64,
    mechanical_angle: i32,
}

/// Ask the running monitor, if any, to stop.
///
/// Clears the active flag and signals shutdown. A monitor blocked on a read
/// abandons it; one that finishes a read anyway will not act on it.
pub async fn stop(device: &Device) {
    if let Some(handle) = signal_stop(device).await {
        debug!("Monitor stop requested for device {}", device.id());
        drop(handle);
    }
}

async fn signal_stop(device: &Device) -> Option<MonitorHandle> {
    device.set_monitor_active(false);
    let handle = device.monitor.lock().await.take()?;
    // The receiver is gone once the task has exited
    let _ = handle.shutdown.send(true);
    Some(handle)
}

/// Start a monitor for a move that has just been sent, replacing any
/// previous one.
pub async fn start(device: &Arc<Device>) {
    let previous = signal_stop(device).await;

    sleep(RESTART_GRACE).await;

    if let Some(previous) = previous {
        if !previous.task.is_finished() {
            warn!(
                "Previous monitor of device {} did not exit, aborting it",
                device.id()
            );
            previous.task.abort();
        }
    }

    let generation = device.next_monitor_generation();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    device.set_monitor_active(true);
    let task = tokio::spawn(run(device.clone(), generation, shutdown_rx));

    *device.monitor.lock().await = Some(MonitorHandle {
        shutdown: shutdown_tx,
        task,
    });
    debug!("Monitor {} started for device {}", generation, device.id());
}

/// Whether this monitor is still the one the device expects
fn is_current(device: &Device, generation: u64) -> bool {
    device.is_monitor_active() && device.monitor_generation() == generation
}

async fn run(device: Arc<Device>, generation: u64, mut shutdown: watch::Receiver<bool>) {
    let transport = match device.open_transport().await {
        Ok(transport) => transport,
        Err(e) => {
            debug!("Monitor exiting: {}", e);
            finish(&device, generation);
            return;
        }
    };

    let mut state = MonitorState::AwaitingFirstReport;

    loop {
        state = match state {
            MonitorState::AwaitingFirstReport | MonitorState::AwaitingSecondReport => {
                let report = tokio::select! {
                    report = read_report(transport.as_ref()) => report,
                    _ = shutdown.changed() => {
                        debug!("Monitor {} cancelled while waiting for report", generation);
                        break;
                    }
                };

                if !is_current(&device, generation) {
                    debug!("Monitor {} no longer active, discarding report", generation);
                    break;
                }

                match report {
                    Ok(report) => apply_report(&device, report).await,
                    Err(e) => {
                        // Moving stays set: the device never confirmed completion
                        warn!("Monitor for device {} ended: {}", device.id(), e);
                        break;
                    }
                }
            }
            MonitorState::AwaitingOvershootReturn => {
                tokio::select! {
                    _ = sleep(RETURN_DELAY) => {}
                    _ = shutdown.changed() => break,
                }
                send_return(&device, transport.as_ref()).await
            }
            MonitorState::Idle | MonitorState::Complete => break,
        };
    }

    finish(&device, generation);
}

fn finish(device: &Device, generation: u64) {
    if device.monitor_generation() == generation {
        device.set_monitor_active(false);
    }
    debug!("Monitor {} stopped for device {}", generation, device.id());
}

async fn read_report(transport: &dyn Transport) -> Result<Report> {
    let line = read_field(transport, FIRST_REPORT_TIMEOUT, "rotation report").await?;
    let rotated = parse_float_field(&line, "rotation report")?;

    let line = read_field(transport, SECOND_REPORT_TIMEOUT, "mechanical angle").await?;
    let mechanical_angle = parse_int_field(&line, "mechanical angle")?;

    Ok(Report {
        rotated,
        mechanical_angle,
    })
}

async fn apply_report(device: &Device, report: Report) -> MonitorState {
    device
        .update_motion(|motion| {
            motion.last_rotated = report.rotated;
            motion.set_mechanical_angle(report.mechanical_angle);

            match motion.overshoot_phase {
                OvershootPhase::None => {
                    motion.moving = false;
                    debug!("Move complete at {:.3} degrees", motion.position);
                    MonitorState::Complete
                }
                OvershootPhase::FirstPhase => {
                    motion.overshoot_phase = OvershootPhase::SecondPhase;
                    MonitorState::AwaitingOvershootReturn
                }
                OvershootPhase::SecondPhase => {
                    motion.overshoot_phase = OvershootPhase::None;
                    motion.moving = false;
                    info!(
                        "Backlash compensation complete at {:.2} degrees",
                        motion.position
                    );
                    MonitorState::Complete
                }
            }
        })
        .await
}

/// Send the return leg of an overshoot move
async fn send_return(device: &Device, transport: &dyn Transport) -> MonitorState {
    let info = device.info().await;
    let target = device.motion().await.target_angle;
    let overshoot = f64::from(info.overshoot_angle);

    let return_angle = if target > 0.0 { -overshoot } else { overshoot };
    let command = protocol::move_command(return_angle, info.calibration.steps_per_degree());

    info!(
        "Backlash compensation: returning from overshoot by {:.2} degrees",
        return_angle
    );
    debug!("Return move command: {}", command);

    let sent = async {
        transport.clear_input().await?;
        protocol::send_command(transport, &command).await
    }
    .await;

    device
        .update_motion(|motion| match sent {
            Ok(()) => {
                motion.moving = true;
                MonitorState::AwaitingSecondReport
            }
            Err(e) => {
                error!("Failed to send return movement command: {}", e);
                motion.overshoot_phase = OvershootPhase::None;
                motion.moving = false;
                MonitorState::Complete
            }
        })
        .await
}
