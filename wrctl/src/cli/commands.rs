//! CLI command and subcommand definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wanderer_core::RotatorModel;

/// Wanderer Rotator CLI
#[derive(Parser, Debug)]
#[command(name = "wrctl")]
#[command(version, about = "Wanderer Rotator control CLI", long_about = None)]
pub struct Cli {
    /// Config file path (default: ~/.config/wanderer-rotator/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Don't load config file
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Use a simulated rotator instead of USB hardware
    #[arg(long, global = true)]
    pub mock: bool,

    /// Model of the simulated rotator (mini, lite, lite-v2)
    #[arg(long, global = true, default_value = "mini", value_parser = parse_model)]
    pub mock_model: RotatorModel,

    /// Device id from the scan (default: first device found)
    #[arg(short, long, global = true)]
    pub device: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn parse_model(s: &str) -> Result<RotatorModel, String> {
    s.parse().map_err(|e: wanderer_core::RotatorError| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl From<&OutputFormat> for crate::format::OutputFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List rotators found on USB serial ports
    Scan,

    /// Show model, firmware and configuration
    Info,

    /// Show position and motion status
    Status,

    /// Move relative by an angle in degrees
    Move {
        /// Angle in degrees (positive = counterclockwise)
        #[arg(allow_hyphen_values = true)]
        angle: f64,

        /// Return once the command is sent
        #[arg(long)]
        no_wait: bool,
    },

    /// Move to an absolute angle over the shortest path
    MoveTo {
        /// Target angle in degrees, 0 <= angle < 360
        angle: f64,

        /// Return once the command is sent
        #[arg(long)]
        no_wait: bool,
    },

    /// Move to 0 degrees
    Home {
        /// Return once the command is sent
        #[arg(long)]
        no_wait: bool,
    },

    /// Declare the current position as 0 degrees
    Sync,

    /// Stop the current movement
    Stop,

    /// Set the motor direction
    Reverse {
        /// Reverse direction state
        #[arg(value_enum)]
        state: ToggleState,
    },

    /// Set the backlash in degrees
    Backlash {
        /// Backlash in degrees (>= 0)
        degrees: f32,
    },

    /// Interactive session (m, r, s, h, g, d, b, q)
    Interactive,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToggleState {
    On,
    Off,
}

impl ToggleState {
    pub fn is_on(self) -> bool {
        self == ToggleState::On
    }
}

impl Commands {
    /// Whether the command talks to a rotator
    pub fn needs_device(&self) -> bool {
        !matches!(self, Commands::Scan | Commands::Completion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from(["wrctl", "move", "-15.5"]).unwrap();
        match cli.command {
            Commands::Move { angle, no_wait } => {
                assert_eq!(angle, -15.5);
                assert!(!no_wait);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "wrctl", "status", "--mock", "--mock-model", "lite-v2", "-d", "1", "-f", "json",
        ])
        .unwrap();
        assert!(cli.mock);
        assert_eq!(cli.mock_model, RotatorModel::LiteV2);
        assert_eq!(cli.device, Some(1));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["wrctl", "info"]).unwrap();
        assert!(!cli.mock);
        assert_eq!(cli.mock_model, RotatorModel::Mini);
        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.device, None);
    }

    #[test]
    fn test_reverse_state() {
        let cli = Cli::try_parse_from(["wrctl", "reverse", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Reverse {
                state: ToggleState::On
            }
        ));
        assert!(Cli::try_parse_from(["wrctl", "reverse", "maybe"]).is_err());
    }

    #[test]
    fn test_invalid_mock_model() {
        assert!(Cli::try_parse_from(["wrctl", "scan", "--mock-model", "maxi"]).is_err());
    }

    #[test]
    fn test_needs_device() {
        assert!(!Commands::Scan.needs_device());
        assert!(Commands::Status.needs_device());
        assert!(Commands::Interactive.needs_device());
    }
}
