//! Wire protocol codec for the Wanderer Rotator
//!
//! Commands are ASCII decimal opcodes. Responses are ASCII fields, each
//! terminated by the byte `'A'`:
//!
//! ```text
//! probe  "1500001\n"  ->  "WandererRotator<model>A" "<fw>A" "<mech>A" "<backlash>A" "<reverse>A"
//! move   "10XXXXXX"   ->  (on completion) "<rotated>A" "<mech>A"
//! ```
//!
//! Opcodes are treated as opaque strings. Only the encoders below build them.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use wanderer_core::model::{MODEL_ID_MAX_LEN, MODEL_MARKER};
use wanderer_core::{Result, RotatorError};

use crate::serial_driver::Transport;

/// Handshake and status query probe
pub const PROBE: &str = "1500001\n";

/// Set the current position as zero
pub const SET_ZERO: &str = "1500002";

/// Abort the current motion
pub const STOP: &str = "stop";

/// Terminator of every response field
pub const TERMINATOR: u8 = b'A';

/// Size of the buffer a response field is read into
pub const RESPONSE_BUF_LEN: usize = 32;

/// Read timeout for handshake and status fields
pub const FIELD_TIMEOUT: Duration = Duration::from_millis(3000);

/// Pause before every command write
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

const MOVE_BASE: i64 = 1_000_000;
const BACKLASH_BASE: i64 = 1_600_000;

/// Relative move by `angle` degrees, no trailing newline
pub fn move_command(angle: f64, steps_per_degree: u32) -> String {
    let steps = (angle * f64::from(steps_per_degree)).round() as i64;
    (MOVE_BASE + steps).to_string()
}

/// Numeric value of the backlash command for `backlash` degrees
///
/// Negative and non-finite values are rejected before encoding.
pub fn backlash_command_value(backlash: f32) -> Result<i64> {
    if !backlash.is_finite() || backlash < 0.0 {
        return Err(RotatorError::InvalidParameter(format!(
            "Backlash must be a non-negative number of degrees, got {}",
            backlash
        )));
    }
    let tenths = (f64::from(backlash) * 10.0).round() as i64;
    Ok(BACKLASH_BASE + tenths)
}

/// Set backlash command, newline terminated
pub fn backlash_command(backlash: f32) -> Result<String> {
    Ok(format!("{}\n", backlash_command_value(backlash)?))
}

/// Set reverse direction command
pub fn reverse_direction_command(reverse: bool) -> &'static str {
    if reverse {
        "1700001\n"
    } else {
        "1700000\n"
    }
}

/// Whether a handshake reply carries the device marker
pub fn contains_marker(response: &str) -> bool {
    response.contains(MODEL_MARKER)
}

/// Extract the model identifier following the device marker.
///
/// Takes at most 7 characters up to the terminator. An empty identifier is
/// malformed.
pub fn parse_model(response: &str) -> Result<String> {
    let start = response
        .find(MODEL_MARKER)
        .ok_or_else(|| RotatorError::Protocol(format!("Missing device marker in {:?}", response)))?;

    let model: String = response[start + MODEL_MARKER.len()..]
        .chars()
        .take_while(|&c| c != TERMINATOR as char)
        .take(MODEL_ID_MAX_LEN)
        .collect();

    let model = model.trim().to_string();
    if model.is_empty() {
        return Err(RotatorError::Protocol(format!(
            "Missing model identifier in {:?}",
            response
        )));
    }
    Ok(model)
}

/// Length of the leading numeric prefix of `s` (after whitespace)
fn numeric_prefix(s: &str, allow_fraction: bool) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if has_digits || frac_end > frac_start {
            end = frac_end;
            has_digits = true;
        }
    }

    if has_digits {
        &s[..end]
    } else {
        ""
    }
}

/// Parse an integer field such as `"3600A"`
pub fn parse_int_field(response: &str, field: &str) -> Result<i32> {
    let prefix = numeric_prefix(response.trim_start(), false);
    prefix.parse::<i32>().map_err(|_| {
        RotatorError::Protocol(format!("Invalid {} field: {:?}", field, response))
    })
}

/// Parse a floating point field such as `"2.0A"`
pub fn parse_float_field(response: &str, field: &str) -> Result<f64> {
    let prefix = numeric_prefix(response.trim_start(), true);
    prefix.parse::<f64>().map_err(|_| {
        RotatorError::Protocol(format!("Invalid {} field: {:?}", field, response))
    })
}

/// Read one `'A'`-terminated field; an empty read is a timeout
pub async fn read_field(
    transport: &dyn Transport,
    timeout: Duration,
    field: &str,
) -> Result<String> {
    let bytes = transport
        .read_until(RESPONSE_BUF_LEN, TERMINATOR, timeout)
        .await?;

    if bytes.is_empty() {
        debug!("Timeout reading {} from serial", field);
        return Err(RotatorError::Timeout(format!(
            "No {} received within {} ms",
            field,
            timeout.as_millis()
        )));
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a command after the general settle delay
pub async fn send_command(transport: &dyn Transport, command: &str) -> Result<()> {
    if !transport.is_open() {
        return Err(RotatorError::NotOpen(transport.port_path().to_string()));
    }

    sleep(SETTLE_DELAY).await;

    debug!("Writing command {:?}", command);
    transport.write(command.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_commands() {
        assert_eq!(PROBE, "1500001\n");
        assert_eq!(SET_ZERO, "1500002");
        assert_eq!(STOP, "stop");
    }

    #[test]
    fn test_move_command() {
        assert_eq!(move_command(10.0, 1142), "1011420");
        assert_eq!(move_command(-10.0, 1142), "988580");
        assert_eq!(move_command(0.0, 1199), "1000000");
        // Rounded, not truncated
        assert_eq!(move_command(0.0006, 1000), "1000001");
    }

    #[test]
    fn test_backlash_command() {
        assert_eq!(backlash_command_value(2.0).unwrap(), 1_600_020);
        assert_eq!(backlash_command_value(0.0).unwrap(), 1_600_000);
        assert_eq!(backlash_command_value(0.25).unwrap(), 1_600_003);
        assert_eq!(backlash_command(1.5).unwrap(), "1600015\n");
    }

    #[test]
    fn test_backlash_command_rejects_invalid() {
        assert!(matches!(
            backlash_command_value(-0.1),
            Err(RotatorError::InvalidParameter(_))
        ));
        assert!(backlash_command(f32::NAN).is_err());
        assert!(backlash_command(f32::INFINITY).is_err());
    }

    #[test]
    fn test_reverse_direction_command() {
        assert_eq!(reverse_direction_command(false), "1700000\n");
        assert_eq!(reverse_direction_command(true), "1700001\n");
    }

    #[test]
    fn test_parse_model() {
        assert_eq!(parse_model("WandererRotatorMiniA").unwrap(), "Mini");
        assert_eq!(parse_model("WandererRotatorLiteV2A").unwrap(), "LiteV2");
        // Stray bytes before the marker are tolerated
        assert_eq!(parse_model("\r\nWandererRotatorLiteA").unwrap(), "Lite");
    }

    #[test]
    fn test_parse_model_truncates() {
        assert_eq!(parse_model("WandererRotatorLongModelNameA").unwrap(), "LongMod");
    }

    #[test]
    fn test_parse_model_malformed() {
        assert!(matches!(
            parse_model("garbageA"),
            Err(RotatorError::Protocol(_))
        ));
        assert!(parse_model("WandererRotatorA").is_err());
    }

    #[test]
    fn test_contains_marker() {
        assert!(contains_marker("WandererRotatorMiniA"));
        assert!(contains_marker("xxWandererRotator"));
        assert!(!contains_marker("wandererrotatorA"));
    }

    #[test]
    fn test_parse_int_field() {
        assert_eq!(parse_int_field("3600A", "angle").unwrap(), 3600);
        assert_eq!(parse_int_field("-250A", "angle").unwrap(), -250);
        assert_eq!(parse_int_field("  5A", "firmware").unwrap(), 5);
        assert_eq!(parse_int_field("12.7A", "angle").unwrap(), 12);
        assert!(parse_int_field("A", "angle").is_err());
        assert!(parse_int_field("xyzA", "angle").is_err());
        assert!(parse_int_field("-A", "angle").is_err());
    }

    #[test]
    fn test_parse_float_field() {
        assert_eq!(parse_float_field("2.0A", "backlash").unwrap(), 2.0);
        assert_eq!(parse_float_field("-10.25A", "rotated").unwrap(), -10.25);
        assert_eq!(parse_float_field("7A", "rotated").unwrap(), 7.0);
        assert_eq!(parse_float_field(".5A", "rotated").unwrap(), 0.5);
        assert!(parse_float_field("A", "rotated").is_err());
        assert!(parse_float_field(".A", "rotated").is_err());
    }
}
