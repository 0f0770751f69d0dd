//! Simulated rotator
//!
//! An in-process [`Transport`] that answers the wire protocol the way the
//! device firmware does: probe replies, configuration writes, and delayed
//! motion-complete reports. Used by the test suites and by `wrctl --mock`.
//!
//! Timing uses tokio's clock, so tests can run with `start_paused = true`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use wanderer_core::model::{RotatorModel, MODEL_MARKER};
use wanderer_core::{Result, RotatorError};

use crate::serial_driver::{Connector, Transport};

/// Mechanical angle range reported by the device (degrees x 1000)
const MECHANICAL_RANGE: i64 = 360_000;

#[derive(Debug)]
struct PendingMove {
    started: Instant,
    due: Instant,
    angle: f64,
    start_mechanical: i32,
}

#[derive(Debug)]
struct SimState {
    model: String,
    firmware: u32,
    mechanical: i32,
    backlash: f32,
    reverse: bool,
    travel_per_degree: Duration,

    arrived: VecDeque<u8>,
    scheduled: VecDeque<(Instant, Vec<u8>)>,
    pending_move: Option<PendingMove>,

    handshake_failures: u32,
    read_failures: u32,
    silent: bool,
    fail_writes: bool,
    sent: Vec<String>,
}

impl SimState {
    fn steps_per_degree(&self) -> u32 {
        RotatorModel::detect(&self.model)
            .map(|m| m.steps_per_degree())
            .unwrap_or(0)
    }

    fn enqueue(&mut self, due: Instant, line: String) {
        self.scheduled.push_back((due, line.into_bytes()));
    }

    /// Move every scheduled line whose time has come into the input buffer
    fn deliver(&mut self, now: Instant) {
        while let Some((due, _)) = self.scheduled.front() {
            if *due > now {
                break;
            }
            if let Some((_, bytes)) = self.scheduled.pop_front() {
                self.arrived.extend(bytes);
            }
        }
        if let Some(pending) = &self.pending_move {
            if pending.due <= now {
                self.pending_move = None;
            }
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.scheduled.front().map(|(due, _)| *due)
    }

    fn report_move(&mut self, due: Instant, rotated: f64, mechanical: i32) {
        self.mechanical = mechanical;
        self.enqueue(due, format!("{:.2}A", rotated));
        self.enqueue(due, format!("{}A", mechanical));
    }

    fn handle(&mut self, command: &str, now: Instant) {
        self.sent.push(command.to_string());

        if self.silent {
            debug!("Simulated rotator is silent, ignoring {:?}", command);
            return;
        }

        let trimmed = command.trim_end_matches('\n');
        if trimmed == "stop" {
            self.stop(now);
            return;
        }

        let value: i64 = match trimmed.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("Simulated rotator received unknown command {:?}", command);
                return;
            }
        };

        match value {
            1_500_001 => self.probe(now),
            1_500_002 => {
                self.mechanical = 0;
            }
            1_700_000 => self.reverse = false,
            1_700_001 => self.reverse = true,
            1_600_000..=1_699_999 => {
                self.backlash = (value - 1_600_000) as f32 / 10.0;
            }
            0..=1_499_999 => self.start_move(value - 1_000_000, now),
            _ => warn!("Simulated rotator received unknown opcode {}", value),
        }
    }

    fn probe(&mut self, now: Instant) {
        if self.handshake_failures > 0 {
            self.handshake_failures -= 1;
            debug!(
                "Simulated rotator dropping probe ({} more to drop)",
                self.handshake_failures
            );
            return;
        }

        let lines = [
            format!("{}{}A", MODEL_MARKER, self.model),
            format!("{}A", self.firmware),
            format!("{}A", self.mechanical),
            format!("{:.1}A", self.backlash),
            format!("{}A", u8::from(self.reverse)),
        ];
        for line in lines {
            self.enqueue(now, line);
        }
    }

    fn start_move(&mut self, steps: i64, now: Instant) {
        let steps_per_degree = self.steps_per_degree();
        if steps_per_degree == 0 {
            warn!("Simulated rotator has no calibration, ignoring move");
            return;
        }

        // A new move supersedes the report of the previous one
        if let Some(previous) = self.pending_move.take() {
            self.scheduled.clear();
            self.mechanical = interpolate(&previous, now).1;
        }

        let angle = steps as f64 / f64::from(steps_per_degree);
        let travel = self.travel_per_degree.mul_f64(angle.abs());
        let due = now + travel;
        let target = wrap_mechanical(i64::from(self.mechanical) + (angle * 1000.0).round() as i64);

        debug!("Simulated rotator moving {:.3} degrees", angle);
        self.pending_move = Some(PendingMove {
            started: now,
            due,
            angle,
            start_mechanical: self.mechanical,
        });
        self.report_move(due, angle, target);
    }

    fn stop(&mut self, now: Instant) {
        let Some(pending) = self.pending_move.take() else {
            return;
        };
        self.scheduled.clear();
        let (rotated, mechanical) = interpolate(&pending, now);
        self.report_move(now, rotated, mechanical);
    }
}

/// Rotation done so far and resulting mechanical angle of an interrupted move
fn interpolate(pending: &PendingMove, now: Instant) -> (f64, i32) {
    let total = pending.due.saturating_duration_since(pending.started);
    let fraction = if total.is_zero() {
        1.0
    } else {
        (now.saturating_duration_since(pending.started).as_secs_f64() / total.as_secs_f64())
            .min(1.0)
    };
    let rotated = pending.angle * fraction;
    let mechanical =
        wrap_mechanical(i64::from(pending.start_mechanical) + (rotated * 1000.0).round() as i64);
    (rotated, mechanical)
}

fn wrap_mechanical(value: i64) -> i32 {
    value.rem_euclid(MECHANICAL_RANGE) as i32
}

/// Simulated Wanderer Rotator behind a serial transport
#[derive(Debug)]
pub struct SimulatedRotator {
    port_path: String,
    state: Mutex<SimState>,
    data_ready: Notify,
    open: AtomicBool,
}

impl SimulatedRotator {
    /// Create a rotator reporting `model` (e.g. `"Mini"`, `"LiteV2"`)
    pub fn new(port_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            port_path: port_path.into(),
            state: Mutex::new(SimState {
                model: model.into(),
                firmware: 1,
                mechanical: 0,
                backlash: 0.0,
                reverse: false,
                travel_per_degree: Duration::from_millis(10),
                arrived: VecDeque::new(),
                scheduled: VecDeque::new(),
                pending_move: None,
                handshake_failures: 0,
                read_failures: 0,
                silent: false,
                fail_writes: false,
                sent: Vec::new(),
            }),
            data_ready: Notify::new(),
            open: AtomicBool::new(true),
        }
    }

    /// Create a rotator of a known model
    pub fn with_model(port_path: impl Into<String>, model: RotatorModel) -> Self {
        Self::new(port_path, model.model_id())
    }

    pub fn with_firmware(mut self, firmware: u32) -> Self {
        self.state.get_mut().firmware = firmware;
        self
    }

    /// Initial mechanical angle (degrees x 1000)
    pub fn with_mechanical_angle(mut self, mechanical: i32) -> Self {
        self.state.get_mut().mechanical = mechanical;
        self
    }

    pub fn with_backlash(mut self, backlash: f32) -> Self {
        self.state.get_mut().backlash = backlash;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.state.get_mut().reverse = reverse;
        self
    }

    /// Time the motor needs per degree of travel
    pub fn with_travel_time(mut self, per_degree: Duration) -> Self {
        self.state.get_mut().travel_per_degree = per_degree;
        self
    }

    /// Ignore the next `count` probes
    pub async fn fail_handshakes(&self, count: u32) {
        self.state.lock().await.handshake_failures = count;
    }

    /// Stop answering anything
    pub async fn set_silent(&self, silent: bool) {
        self.state.lock().await.silent = silent;
    }

    /// Fail the next `count` reads with a serial error
    pub async fn fail_reads(&self, count: u32) {
        self.state.lock().await.read_failures = count;
    }

    /// Make every write fail with a serial error
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Queue a raw response line, available immediately
    pub async fn push_response(&self, line: &str) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.enqueue(now, line.to_string());
        drop(state);
        self.data_ready.notify_waiters();
    }

    /// Every command written so far, verbatim
    pub async fn sent_commands(&self) -> Vec<String> {
        self.state.lock().await.sent.clone()
    }

    /// Current mechanical angle (degrees x 1000)
    pub async fn mechanical_angle(&self) -> i32 {
        self.state.lock().await.mechanical
    }

    pub async fn backlash(&self) -> f32 {
        self.state.lock().await.backlash
    }

    pub async fn reverse(&self) -> bool {
        self.state.lock().await.reverse
    }

    /// Whether a move report is still outstanding
    pub async fn is_moving(&self) -> bool {
        let mut state = self.state.lock().await;
        state.deliver(Instant::now());
        state.pending_move.is_some()
    }

    fn reopen(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(RotatorError::NotOpen(self.port_path.clone()))
        }
    }
}

#[async_trait]
impl Transport for SimulatedRotator {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let mut state = self.state.lock().await;
        if state.fail_writes {
            return Err(RotatorError::Serial("Simulated write failure".to_string()));
        }

        let command = String::from_utf8_lossy(data).into_owned();
        state.handle(&command, Instant::now());
        drop(state);

        self.data_ready.notify_waiters();
        Ok(())
    }

    async fn read_until(&self, max_len: usize, stop: u8, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buf = Vec::new();

        {
            let mut state = self.state.lock().await;
            if state.read_failures > 0 {
                state.read_failures -= 1;
                return Err(RotatorError::Serial("Simulated read failure".to_string()));
            }
        }

        loop {
            self.ensure_open()?;

            let notified = self.data_ready.notified();
            let wake = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.deliver(now);

                while buf.len() + 1 < max_len {
                    match state.arrived.pop_front() {
                        Some(byte) => {
                            buf.push(byte);
                            if byte == stop {
                                return Ok(buf);
                            }
                        }
                        None => break,
                    }
                }
                if buf.len() + 1 >= max_len || now >= deadline {
                    return Ok(buf);
                }

                state.next_due().map_or(deadline, |due| due.min(deadline))
            };

            tokio::select! {
                _ = sleep_until(wake) => {}
                _ = notified => {}
            }
        }
    }

    async fn clear_input(&self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        state.deliver(Instant::now());
        state.arrived.clear();
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.clear_input().await
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.arrived.clear();
        state.scheduled.clear();
        state.pending_move = None;
        drop(state);
        self.data_ready.notify_waiters();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_path(&self) -> &str {
        &self.port_path
    }
}

/// Connector serving a fixed set of simulated rotators
#[derive(Debug, Default, Clone)]
pub struct MockConnector {
    rotators: Vec<Arc<SimulatedRotator>>,
}

impl MockConnector {
    pub fn new(rotators: Vec<Arc<SimulatedRotator>>) -> Self {
        Self { rotators }
    }

    /// Connector with a single simulated rotator of `model`
    pub fn single(model: RotatorModel) -> (Self, Arc<SimulatedRotator>) {
        let rotator = Arc::new(SimulatedRotator::with_model("/dev/mock0", model));
        (Self::new(vec![rotator.clone()]), rotator)
    }

    pub fn rotators(&self) -> &[Arc<SimulatedRotator>] {
        &self.rotators
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn candidates(&self) -> Result<Vec<String>> {
        Ok(self
            .rotators
            .iter()
            .map(|r| r.port_path().to_string())
            .collect())
    }

    async fn open(&self, path: &str) -> Result<Arc<dyn Transport>> {
        let rotator = self
            .rotators
            .iter()
            .find(|r| r.port_path() == path)
            .ok_or_else(|| RotatorError::Serial(format!("No simulated rotator at {}", path)))?;

        rotator.reopen();
        {
            let mut state = rotator.state.lock().await;
            state.arrived.clear();
            state.scheduled.clear();
        }
        debug!("Opened simulated rotator at {}", path);
        Ok(rotator.clone())
    }
}
