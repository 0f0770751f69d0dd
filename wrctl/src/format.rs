//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use wanderer_core::{DeviceId, RotatorConfig, RotatorStatus, VersionInfo};

/// Output format options
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
}

/// One discovered rotator
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub port: String,
    pub model: String,
    pub firmware: u32,
}

/// Combined device information for `wrctl info`
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub port: String,
    pub sdk_version: String,
    pub version: VersionInfo,
    pub config: RotatorConfig,
}

fn yes_no(value: bool) -> ColoredString {
    if value {
        "Yes".green()
    } else {
        "No".normal()
    }
}

/// Format the scan results
pub fn format_devices(devices: &[DeviceSummary], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(devices)?),
        OutputFormat::Table => {
            if devices.is_empty() {
                return Ok("No Wanderer Rotator found".yellow().to_string());
            }

            #[derive(Tabled)]
            struct DeviceRow {
                #[tabled(rename = "ID")]
                id: String,
                #[tabled(rename = "Port")]
                port: String,
                #[tabled(rename = "Model")]
                model: String,
                #[tabled(rename = "Firmware")]
                firmware: String,
            }

            let rows: Vec<DeviceRow> = devices
                .iter()
                .map(|d| DeviceRow {
                    id: d.id.to_string(),
                    port: d.port.clone(),
                    model: d.model.clone(),
                    firmware: d.firmware.to_string(),
                })
                .collect();

            let mut table = Table::new(rows);
            table.with(Style::rounded());
            Ok(table.to_string())
        }
    }
}

/// Format device information
pub fn format_info(info: &DeviceInfo, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(info)?),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&format!("Wanderer Rotator {}", info.id).bold().to_string());
            output.push('\n');
            output.push_str(&format!("Port: {}", info.port.cyan()));
            output.push('\n');
            output.push_str(&format!("Model: {}", info.version.model.cyan()));
            output.push('\n');
            output.push_str(&format!(
                "Firmware: {}",
                info.version.firmware.to_string().cyan()
            ));
            output.push('\n');
            output.push_str(&format!("SDK: {}", info.sdk_version.cyan()));
            output.push('\n');
            output.push('\n');
            output.push_str(&format_config(&info.config, format)?);
            Ok(output)
        }
    }
}

/// Format the device configuration
pub fn format_config(config: &RotatorConfig, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        OutputFormat::Table => {
            let mut output = String::new();
            output.push_str(&"Configuration".bold().to_string());
            output.push('\n');
            output.push_str(&format!(
                "Reverse Direction: {}",
                yes_no(config.reverse_direction)
            ));
            output.push('\n');
            output.push_str(&format!(
                "Backlash: {}°",
                format!("{:.1}", config.backlash).yellow()
            ));
            output.push('\n');
            output.push_str(&format!("Overshoot: {}", yes_no(config.overshoot)));
            if config.overshoot {
                output.push_str(&format!(
                    " ({:.1}°, {})",
                    config.overshoot_angle,
                    if config.overshoot_direction {
                        "reversed"
                    } else {
                        "normal"
                    }
                ));
            }
            Ok(output)
        }
    }
}

/// Format the live status
pub fn format_status(status: &RotatorStatus, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(status)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct StatusRow {
                #[tabled(rename = "Position")]
                position: String,
                #[tabled(rename = "Moving")]
                moving: String,
                #[tabled(rename = "Steps/Rev")]
                steps: String,
                #[tabled(rename = "Step Size")]
                step_size: String,
            }

            let row = StatusRow {
                position: format!("{:.2}°", status.position),
                moving: if status.moving {
                    "Yes".yellow().to_string()
                } else {
                    "No".green().to_string()
                },
                steps: status.steps_per_revolution.to_string(),
                step_size: format!("{:.6}°", status.step_size),
            };

            let mut table = Table::new(vec![row]);
            table.with(Style::rounded());
            Ok(table.to_string())
        }
    }
}

/// Format a success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

/// Format a warning message
pub fn format_warning(message: &str) -> String {
    format!("{} {}", "!".yellow().bold(), message)
}
