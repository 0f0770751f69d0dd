//! Core types and data structures exchanged through the SDK API

use serde::{Deserialize, Serialize};

/// Registry-scoped device identifier.
///
/// Assigned at scan time; not persistent across scans or processes.
pub type DeviceId = u32;

/// Selects which fields of a [`RotatorConfig`] are applied by `set_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConfigMask(u32);

impl ConfigMask {
    pub const NONE: ConfigMask = ConfigMask(0);
    pub const REVERSE_DIRECTION: ConfigMask = ConfigMask(0x01);
    pub const BACKLASH: ConfigMask = ConfigMask(0x02);
    pub const OVERSHOOT: ConfigMask = ConfigMask(0x04);
    pub const OVERSHOOT_ANGLE: ConfigMask = ConfigMask(0x08);
    pub const OVERSHOOT_DIRECTION: ConfigMask = ConfigMask(0x10);
    pub const ALL: ConfigMask = ConfigMask(0x1F);

    /// Build a mask from raw bits, dropping unknown bits
    pub fn from_bits(bits: u32) -> Self {
        ConfigMask(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`
    pub fn contains(self, other: ConfigMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ConfigMask {
    type Output = ConfigMask;

    fn bitor(self, rhs: ConfigMask) -> ConfigMask {
        ConfigMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ConfigMask {
    fn bitor_assign(&mut self, rhs: ConfigMask) {
        self.0 |= rhs.0;
    }
}

/// Rotator configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatorConfig {
    /// Reverse the motor moving direction
    pub reverse_direction: bool,
    /// Backlash in degrees
    pub backlash: f32,
    /// Backlash overshoot enabled (move past target, then return)
    pub overshoot: bool,
    /// Overshoot angle in degrees
    pub overshoot_angle: f32,
    /// Overshoot direction: `false` normal, `true` reversed
    pub overshoot_direction: bool,
}

/// Live rotator status
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatorStatus {
    /// Current position in degrees
    pub position: f64,
    /// Motor is moving
    pub moving: bool,
    /// Steps per full revolution (model dependent)
    pub steps_per_revolution: u32,
    /// Step size in degrees per step
    pub step_size: f64,
}

/// Firmware and model information
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Rotator firmware version
    pub firmware: u32,
    /// Model identifier (e.g. "Mini", "LiteV2")
    pub model: String,
}

/// Convert a backlash in degrees into the device's internal tenths of a degree
#[inline]
pub fn backlash_to_tenths(degrees: f32) -> i32 {
    (degrees * 10.0).round() as i32
}

/// Convert internal tenths of a degree back into degrees
#[inline]
pub fn backlash_from_tenths(tenths: i32) -> f32 {
    tenths as f32 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        assert_eq!(ConfigMask::REVERSE_DIRECTION.bits(), 0x01);
        assert_eq!(ConfigMask::BACKLASH.bits(), 0x02);
        assert_eq!(ConfigMask::OVERSHOOT.bits(), 0x04);
        assert_eq!(ConfigMask::OVERSHOOT_ANGLE.bits(), 0x08);
        assert_eq!(ConfigMask::OVERSHOOT_DIRECTION.bits(), 0x10);
        assert_eq!(ConfigMask::ALL.bits(), 0x1F);
    }

    #[test]
    fn test_mask_contains() {
        let mask = ConfigMask::REVERSE_DIRECTION | ConfigMask::BACKLASH;
        assert!(mask.contains(ConfigMask::REVERSE_DIRECTION));
        assert!(mask.contains(ConfigMask::BACKLASH));
        assert!(!mask.contains(ConfigMask::OVERSHOOT));
        assert!(!mask.contains(ConfigMask::NONE));
        assert!(ConfigMask::ALL.contains(mask));
    }

    #[test]
    fn test_mask_from_bits_drops_unknown() {
        assert_eq!(ConfigMask::from_bits(0xFF), ConfigMask::ALL);
        assert!(ConfigMask::from_bits(0x20).is_empty());
    }

    #[test]
    fn test_backlash_conversion() {
        assert_eq!(backlash_to_tenths(2.0), 20);
        assert_eq!(backlash_to_tenths(0.25), 3);
        assert_eq!(backlash_to_tenths(0.0), 0);
        assert_eq!(backlash_from_tenths(20), 2.0);
    }

    #[test]
    fn test_status_serialization() {
        let status = RotatorStatus {
            position: 3.6,
            moving: true,
            steps_per_revolution: 411120,
            step_size: 1.0 / 1142.0,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"moving\":true"));
        assert!(json.contains("\"steps_per_revolution\":411120"));
    }
}
