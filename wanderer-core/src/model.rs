//! Rotator model definitions and calibration
//!
//! The rotator reports a short model identifier during the status query
//! (e.g. `"Mini"`, `"Lite"`, `"LiteV2"`). The identifier alone determines the
//! gearing of the unit, so the calibration constants are derived from it.
//!
//! Link parameters shared by every model (USB identifiers of the CH340 bridge,
//! baud rate, handshake marker) live here as well.

use serde::{Deserialize, Serialize};

/// USB Vendor ID of the CH340 serial bridge used by all models
pub const USB_VID: u16 = 0x1A86;

/// USB Product ID of the CH340 serial bridge used by all models
pub const USB_PID: u16 = 0x7523;

/// Serial communication baud rate
pub const BAUD_RATE: u32 = 19200;

/// Marker that prefixes the handshake reply
pub const MODEL_MARKER: &str = "WandererRotator";

/// Maximum length of the model identifier following [`MODEL_MARKER`]
pub const MODEL_ID_MAX_LEN: usize = 7;

/// Maximum number of rotators registered by a single scan
pub const MAX_DEVICES: usize = 32;

/// Known rotator models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotatorModel {
    /// Wanderer Rotator Mini
    Mini,
    /// Wanderer Rotator Lite (first revision)
    Lite,
    /// Wanderer Rotator Lite V2
    LiteV2,
}

impl RotatorModel {
    /// Detect the model from the identifier reported by the device.
    ///
    /// Case-sensitive substring match, first match wins:
    /// `"Mini"` → Mini, `"Lite"` + `"V2"` → Lite V2, `"Lite"` → Lite.
    ///
    /// ```
    /// use wanderer_core::model::RotatorModel;
    ///
    /// assert_eq!(RotatorModel::detect("Mini"), Some(RotatorModel::Mini));
    /// assert_eq!(RotatorModel::detect("LiteV2"), Some(RotatorModel::LiteV2));
    /// assert_eq!(RotatorModel::detect("lite"), None);
    /// ```
    pub fn detect(model_id: &str) -> Option<Self> {
        if model_id.contains("Mini") {
            Some(RotatorModel::Mini)
        } else if model_id.contains("Lite") {
            if model_id.contains("V2") {
                Some(RotatorModel::LiteV2)
            } else {
                Some(RotatorModel::Lite)
            }
        } else {
            None
        }
    }

    /// Motor steps per degree of output rotation
    pub fn steps_per_degree(&self) -> u32 {
        match self {
            RotatorModel::Mini => 1142,
            RotatorModel::Lite => 1155,
            RotatorModel::LiteV2 => 1199,
        }
    }

    /// Identifier as reported on the wire
    pub fn model_id(&self) -> &'static str {
        match self {
            RotatorModel::Mini => "Mini",
            RotatorModel::Lite => "Lite",
            RotatorModel::LiteV2 => "LiteV2",
        }
    }

    /// Human-readable model name
    pub fn name(&self) -> &'static str {
        match self {
            RotatorModel::Mini => "Wanderer Rotator Mini",
            RotatorModel::Lite => "Wanderer Rotator Lite",
            RotatorModel::LiteV2 => "Wanderer Rotator Lite V2",
        }
    }
}

impl std::str::FromStr for RotatorModel {
    type Err = crate::RotatorError;

    /// Parse a model name (for the CLI `--mock-model` flag)
    ///
    /// ```
    /// use std::str::FromStr;
    /// use wanderer_core::model::RotatorModel;
    ///
    /// assert!(RotatorModel::from_str("mini").is_ok());
    /// assert!(RotatorModel::from_str("lite-v2").is_ok());
    /// assert!(RotatorModel::from_str("maxi").is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mini" => Ok(RotatorModel::Mini),
            "lite" => Ok(RotatorModel::Lite),
            "litev2" | "lite-v2" | "lite_v2" => Ok(RotatorModel::LiteV2),
            _ => Err(crate::RotatorError::InvalidParameter(format!(
                "Unknown rotator model: '{}'. Valid options: mini, lite, lite-v2",
                s
            ))),
        }
    }
}

/// Calibration constants of one unit
///
/// `steps_per_revolution` and `step_size` are always derived from
/// `steps_per_degree`; the only way to change them is [`Calibration::set_steps_per_degree`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    steps_per_degree: u32,
    steps_per_revolution: u32,
    step_size: f64,
}

impl Calibration {
    /// Calibration for a given steps-per-degree value
    pub fn from_steps_per_degree(steps_per_degree: u32) -> Self {
        let mut calibration = Self::default();
        calibration.set_steps_per_degree(steps_per_degree);
        calibration
    }

    /// Update steps-per-degree and recompute the derived values.
    ///
    /// A value of 0 means "unknown" and yields a step size of 0.
    pub fn set_steps_per_degree(&mut self, steps_per_degree: u32) {
        self.steps_per_degree = steps_per_degree;
        self.steps_per_revolution = steps_per_degree * 360;
        self.step_size = if steps_per_degree == 0 {
            0.0
        } else {
            1.0 / f64::from(steps_per_degree)
        };
    }

    /// Apply the calibration for a reported model identifier.
    ///
    /// Unrecognized identifiers leave the current calibration untouched.
    /// Returns the detected model, if any.
    pub fn apply_model(&mut self, model_id: &str) -> Option<RotatorModel> {
        let model = RotatorModel::detect(model_id)?;
        self.set_steps_per_degree(model.steps_per_degree());
        Some(model)
    }

    pub fn steps_per_degree(&self) -> u32 {
        self.steps_per_degree
    }

    pub fn steps_per_revolution(&self) -> u32 {
        self.steps_per_revolution
    }

    /// Step size in degrees per step
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Whether a model has been recognized yet
    pub fn is_known(&self) -> bool {
        self.steps_per_degree > 0
    }
}
