//! Serial driver for low-level hardware communication
//!
//! Provides byte-oriented async serial I/O with delimiter and timeout
//! semantics, plus USB discovery of candidate ports.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, warn};
use wanderer_core::model::BAUD_RATE;
use wanderer_core::{Result, RotatorError};

/// Upper bound on how long a single read poll holds the port.
///
/// A long framed read (the motion monitor waits up to 90 s) is split into
/// slices so writers on the same port are never locked out for its duration.
pub const POLL_SLICE: Duration = Duration::from_millis(20);

/// Trait for serial transport abstraction
///
/// All methods take `&self`: one transport is shared between the foreground
/// controller and the background motion monitor.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all bytes, then wait until they have left the output buffer
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Read at most `max_len - 1` bytes, stopping after `stop`.
    ///
    /// Returns the bytes read including the stop byte, or everything read so
    /// far (possibly nothing) once `timeout` has elapsed in total. Only I/O
    /// failures and a closed port are errors.
    async fn read_until(&self, max_len: usize, stop: u8, timeout: Duration) -> Result<Vec<u8>>;

    /// Discard pending input
    async fn clear_input(&self) -> Result<()>;

    /// Discard pending input and output
    async fn clear_all(&self) -> Result<()>;

    /// Release the port. Idempotent.
    async fn close(&self);

    /// Check if the transport is open
    fn is_open(&self) -> bool;

    /// Device path this transport was opened on
    fn port_path(&self) -> &str;
}

/// Source of transports: enumerates candidate paths and opens them.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Candidate device paths that may host a rotator
    fn candidates(&self) -> Result<Vec<String>>;

    /// Open a transport on `path`
    async fn open(&self, path: &str) -> Result<Arc<dyn Transport>>;
}

/// Serial driver for hardware communication
pub struct SerialDriver {
    port: Mutex<Option<SerialStream>>,
    port_path: String,
    open: AtomicBool,
}

impl SerialDriver {
    /// Open a serial port in raw 8N1 mode without flow control
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyUSB0")
    pub fn open(port_path: &str) -> Result<Self> {
        debug!("Opening serial port: {}", port_path);

        let port = tokio_serial::new(port_path, BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                RotatorError::Serial(format!("Failed to open serial port: {}", e))
            })?;

        if let Err(e) = port.clear(tokio_serial::ClearBuffer::All) {
            warn!("Failed to clear buffers on {}: {}", port_path, e);
        }

        debug!("Serial port opened successfully");

        Ok(Self {
            port: Mutex::new(Some(port)),
            port_path: port_path.to_string(),
            open: AtomicBool::new(true),
        })
    }

    fn not_open(&self) -> RotatorError {
        RotatorError::NotOpen(self.port_path.clone())
    }

    async fn clear(&self, buffer: tokio_serial::ClearBuffer) -> Result<()> {
        let guard = self.port.lock().await;
        let port = guard.as_ref().ok_or_else(|| self.not_open())?;
        port.clear(buffer).map_err(|e| {
            warn!("Failed to clear buffer: {}", e);
            RotatorError::Serial(format!("Failed to clear buffer: {}", e))
        })
    }
}

#[async_trait]
impl Transport for SerialDriver {
    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.port.lock().await;
        let port = guard.as_mut().ok_or_else(|| self.not_open())?;

        debug!("TX: {:?}", String::from_utf8_lossy(data));

        port.write_all(data).await.map_err(|e| {
            error!("Write failed: {}", e);
            RotatorError::Serial(format!("Write failed: {}", e))
        })?;

        // Drain the output buffer
        port.flush()
            .await
            .map_err(|e| RotatorError::Serial(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    async fn read_until(&self, max_len: usize, stop: u8, budget: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + budget;
        let mut buf = Vec::with_capacity(max_len);
        let mut byte = [0u8; 1];

        while buf.len() + 1 < max_len {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(POLL_SLICE);

            let mut guard = self.port.lock().await;
            let port = guard.as_mut().ok_or_else(|| self.not_open())?;

            match timeout(slice, port.read(&mut byte)).await {
                // Slice expired, release the port and poll again
                Err(_) => continue,
                Ok(Ok(0)) => {
                    warn!("Serial port returned EOF - device may have been disconnected");
                    break;
                }
                Ok(Ok(_)) => {
                    buf.push(byte[0]);
                    if byte[0] == stop {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    error!("Read error: {}", e);
                    return Err(RotatorError::Serial(format!("Read error: {}", e)));
                }
            }
        }

        if !buf.is_empty() {
            debug!("RX: {:?}", String::from_utf8_lossy(&buf));
        }
        Ok(buf)
    }

    async fn clear_input(&self) -> Result<()> {
        self.clear(tokio_serial::ClearBuffer::Input).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.clear(tokio_serial::ClearBuffer::All).await
    }

    async fn close(&self) {
        let mut guard = self.port.lock().await;
        if guard.take().is_some() {
            debug!("Closed serial port {}", self.port_path);
        }
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_path(&self) -> &str {
        &self.port_path
    }
}

/// Connector for real hardware: USB enumeration filtered by VID/PID.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    usb_vid: u16,
    usb_pid: u16,
}

impl SerialConnector {
    pub fn new(usb_vid: u16, usb_pid: u16) -> Self {
        Self { usb_vid, usb_pid }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(wanderer_core::model::USB_VID, wanderer_core::model::USB_PID)
    }
}

#[async_trait]
impl Connector for SerialConnector {
    fn candidates(&self) -> Result<Vec<String>> {
        find_serial_ports(self.usb_vid, self.usb_pid)
    }

    async fn open(&self, path: &str) -> Result<Arc<dyn Transport>> {
        let driver = SerialDriver::open(path)?;
        Ok(Arc::new(driver))
    }
}

/// Find every serial port whose USB bridge matches VID/PID
pub fn find_serial_ports(usb_vid: u16, usb_pid: u16) -> Result<Vec<String>> {
    debug!(
        "Searching for serial ports (VID:0x{:04X}, PID:0x{:04X})",
        usb_vid, usb_pid
    );

    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        RotatorError::Serial(format!("Failed to enumerate ports: {}", e))
    })?;

    let mut found = Vec::new();
    for port in ports {
        if let tokio_serial::SerialPortType::UsbPort(info) = &port.port_type {
            debug!(
                "  {} - USB VID:{:04X} PID:{:04X}",
                port.port_name, info.vid, info.pid
            );

            if info.vid == usb_vid && info.pid == usb_pid {
                debug!("Candidate port: {}", port.port_name);
                found.push(port.port_name);
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_serial_ports() {
        // Without hardware the list is usually empty; only check it runs
        let _ = find_serial_ports(0x1A86, 0x7523);
    }

    #[test]
    fn test_default_connector_filter() {
        let connector = SerialConnector::default();
        assert_eq!(connector.usb_vid, 0x1A86);
        assert_eq!(connector.usb_pid, 0x7523);
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let connector = SerialConnector::default();
        let result = connector.open("/dev/does-not-exist-rotator").await;
        assert!(matches!(result, Err(RotatorError::Serial(_))));
    }

    #[test]
    fn test_poll_slice_is_short() {
        assert!(POLL_SLICE <= Duration::from_millis(50));
    }
}
