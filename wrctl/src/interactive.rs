//! Interactive session
//!
//! One-letter commands read line by line from stdin, each applied to the
//! opened rotator.

use std::fmt;

use anyhow::Result;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use wanderer_core::{ConfigMask, RotatorConfig};

use crate::cli::{print_wait_outcome, wait_for_motion, MOTION_TIMEOUT};
use crate::format::{format_config, format_status, format_success, OutputFormat};
use crate::session::Session;

/// A parsed interactive command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// `m <angle>`: move to an absolute angle
    MoveTo(f64),
    /// `r <angle>`: move relative
    MoveBy(f64),
    /// `s`: stop
    Stop,
    /// `h`: declare the current position as 0°
    Home,
    /// `g`: print status
    Status,
    /// `d`: toggle reverse direction
    ToggleReverse,
    /// `b <degrees>`: set backlash
    Backlash(f32),
    /// `q`: quit
    Quit,
}

/// Why an input line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(char),
    MissingValue(char),
    InvalidValue(char, String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "Empty command"),
            ParseError::Unknown(c) => write!(f, "Unknown command '{}'", c),
            ParseError::MissingValue(c) => write!(f, "Invalid format. Use: {} <angle>", c),
            ParseError::InvalidValue(c, v) => {
                write!(f, "Invalid angle '{}'. Use: {} <angle>", v, c)
            }
        }
    }
}

fn parse_value<T: std::str::FromStr>(
    cmd: char,
    value: Option<&str>,
) -> std::result::Result<T, ParseError> {
    let value = value.ok_or(ParseError::MissingValue(cmd))?;
    value
        .parse()
        .map_err(|_| ParseError::InvalidValue(cmd, value.to_string()))
}

/// Parse one input line
pub fn parse_command(line: &str) -> std::result::Result<Command, ParseError> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Err(ParseError::Empty);
    };
    let mut chars = word.chars();
    let cmd = chars.next().ok_or(ParseError::Empty)?;
    if chars.next().is_some() {
        return Err(ParseError::Unknown(cmd));
    }
    let value = parts.next();

    match cmd.to_ascii_lowercase() {
        'm' => parse_value(cmd, value).map(Command::MoveTo),
        'r' => parse_value(cmd, value).map(Command::MoveBy),
        'b' => parse_value(cmd, value).map(Command::Backlash),
        's' => Ok(Command::Stop),
        'h' => Ok(Command::Home),
        'g' => Ok(Command::Status),
        'd' => Ok(Command::ToggleReverse),
        'q' => Ok(Command::Quit),
        _ => Err(ParseError::Unknown(cmd)),
    }
}

fn print_menu(reverse: bool) {
    println!();
    println!("{}", "--- Rotator Commands ---".bold());
    println!("m <angle>   - Move to angle (0-360°)");
    println!("r <angle>   - Move relative by angle");
    println!("s           - Stop movement");
    println!("h           - Sync current position to 0°");
    println!("g           - Get current status");
    println!(
        "d           - Toggle reverse direction (currently {})",
        if reverse { "ON" } else { "OFF" }
    );
    println!("b <angle>   - Set backlash in degrees");
    println!("q           - Quit");
}

/// Run the interactive loop until `q` or end of input
pub async fn run(session: &Session) -> Result<()> {
    let sdk = &session.sdk;
    let id = session.device;
    let table = OutputFormat::Table;

    let version = sdk.get_version(id).await?;
    println!(
        "{}",
        format!("Wanderer Rotator {} ({}, firmware {})", id, version.model, version.firmware)
            .bold()
    );
    println!("{}", format_config(&sdk.get_config(id).await?, &table)?);
    println!("{}", format_status(&sdk.get_status(id).await?, &table)?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_menu(sdk.get_config(id).await?.reverse_direction);
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                println!("{} {}", "✗".red().bold(), e);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        if let Err(e) = execute(session, command).await {
            println!("{} {}", "✗".red().bold(), e);
        }
    }

    Ok(())
}

async fn execute(session: &Session, command: Command) -> Result<()> {
    let sdk = &session.sdk;
    let id = session.device;

    match command {
        Command::MoveTo(angle) => {
            println!("Moving rotator to {:.2}°...", angle);
            sdk.move_to(id, angle).await?;
            print_wait_outcome(wait_for_motion(sdk, id, MOTION_TIMEOUT).await?);
        }
        Command::MoveBy(angle) => {
            println!("Moving rotator by {:.2}°...", angle);
            sdk.move_by(id, angle).await?;
            print_wait_outcome(wait_for_motion(sdk, id, MOTION_TIMEOUT).await?);
        }
        Command::Stop => {
            sdk.stop_move(id).await?;
            println!("{}", format_success("Stop command sent"));
        }
        Command::Home => {
            sdk.sync_position(id, 0.0).await?;
            println!("{}", format_success("Position synced to 0°"));
        }
        Command::Status => {
            println!(
                "{}",
                format_status(&sdk.get_status(id).await?, &OutputFormat::Table)?
            );
        }
        Command::ToggleReverse => {
            let reverse = !sdk.get_config(id).await?.reverse_direction;
            let config = RotatorConfig {
                reverse_direction: reverse,
                ..Default::default()
            };
            sdk.set_config(id, &config, ConfigMask::REVERSE_DIRECTION)
                .await?;
            println!(
                "{}",
                format_success(&format!(
                    "Reverse direction {}",
                    if reverse { "ON" } else { "OFF" }
                ))
            );
        }
        Command::Backlash(degrees) => {
            let config = RotatorConfig {
                backlash: degrees,
                ..Default::default()
            };
            sdk.set_config(id, &config, ConfigMask::BACKLASH).await?;
            println!(
                "{}",
                format_success(&format!("Backlash set to {:.1}°", degrees))
            );
        }
        Command::Quit => {}
    }

    Ok(())
}
