//! wanderer-hardware
//!
//! Hardware abstraction crate that contains the serial transport, the wire
//! protocol codec and a simulated rotator. It is used by the SDK crate to
//! talk to Wanderer rotators, and by the CLI for `--mock` runs.
//!
//! Public API:
//! - `serial_driver::Transport` / `Connector` - transport seams
//! - `serial_driver::SerialDriver` - tokio-serial backed transport
//! - `serial_driver::SerialConnector` - USB discovery by VID/PID
//! - `protocol` - command encoders and response parsers
//! - `mock::SimulatedRotator` / `MockConnector` - in-process device

pub mod mock;
pub mod protocol;
pub mod serial_driver;

pub use mock::{MockConnector, SimulatedRotator};
pub use serial_driver::{find_serial_ports, Connector, SerialConnector, SerialDriver, Transport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_present() {
        let _ = std::any::TypeId::of::<SerialDriver>();
        let _ = std::any::TypeId::of::<SimulatedRotator>();
        let _ = std::any::TypeId::of::<MockConnector>();
    }
}
