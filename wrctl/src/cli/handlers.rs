//! Command execution handlers

use std::time::Duration;

use anyhow::Result;
use clap::CommandFactory;
use colored::*;
use tokio::time::{sleep, Instant};
use wanderer_core::{ConfigMask, DeviceId, RotatorConfig};
use wanderer_sdk::{sdk_version, RotatorSdk};

use crate::format::{format_success, format_warning, DeviceInfo};
use crate::session::{self, Session};

use super::commands::*;

/// Interval between status polls while waiting for a move
pub const MOTION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Longest a move is waited for
pub const MOTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of waiting for a move to finish
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitOutcome {
    /// Motion stopped at `position` after `elapsed`
    Completed { position: f64, elapsed: Duration },
    /// Still moving when the timeout expired
    TimedOut { position: f64 },
}

/// Poll the status until the device stops moving or `timeout` expires
pub async fn wait_for_motion(
    sdk: &RotatorSdk,
    id: DeviceId,
    timeout: Duration,
) -> Result<WaitOutcome> {
    let started = Instant::now();
    loop {
        let status = sdk.get_status(id).await?;
        if !status.moving {
            return Ok(WaitOutcome::Completed {
                position: status.position,
                elapsed: started.elapsed(),
            });
        }
        if started.elapsed() >= timeout {
            return Ok(WaitOutcome::TimedOut {
                position: status.position,
            });
        }
        sleep(MOTION_POLL_INTERVAL).await;
    }
}

pub fn print_wait_outcome(outcome: WaitOutcome) {
    match outcome {
        WaitOutcome::Completed { position, elapsed } => println!(
            "{}",
            format_success(&format!(
                "Movement completed after {:.1}s at {:.2}°",
                elapsed.as_secs_f64(),
                position
            ))
        ),
        WaitOutcome::TimedOut { position } => println!(
            "{}",
            format_warning(&format!(
                "Movement did not complete within {}s (at {:.2}°)",
                MOTION_TIMEOUT.as_secs(),
                position
            ))
        ),
    }
}

fn print_value<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle scan command
pub async fn handle_scan(sdk: &RotatorSdk, format: &OutputFormat) -> Result<()> {
    let devices = session::discover(sdk).await?;
    println!("{}", crate::format::format_devices(&devices, &format.into())?);
    Ok(())
}

/// Handle info command
pub async fn handle_info(session: &Session, format: &OutputFormat) -> Result<()> {
    let sdk = &session.sdk;
    let id = session.device;

    let info = DeviceInfo {
        id,
        port: sdk.port_path(id).await?,
        sdk_version: sdk_version().to_string(),
        version: sdk.get_version(id).await?,
        config: sdk.get_config(id).await?,
    };

    println!("{}", crate::format::format_info(&info, &format.into())?);
    Ok(())
}

/// Handle status command
pub async fn handle_status(session: &Session, format: &OutputFormat) -> Result<()> {
    let status = session.sdk.get_status(session.device).await?;
    println!("{}", crate::format::format_status(&status, &format.into())?);
    Ok(())
}

/// Handle the motion commands (move, move-to, home)
pub async fn handle_motion(
    session: &Session,
    command: &Commands,
    format: &OutputFormat,
) -> Result<()> {
    let sdk = &session.sdk;
    let id = session.device;

    let (description, no_wait) = match *command {
        Commands::Move { angle, no_wait } => {
            sdk.move_by(id, angle).await?;
            (format!("Moving by {:.2}°", angle), no_wait)
        }
        Commands::MoveTo { angle, no_wait } => {
            sdk.move_to(id, angle).await?;
            (format!("Moving to {:.2}°", angle), no_wait)
        }
        Commands::Home { no_wait } => {
            sdk.find_home(id).await?;
            ("Moving home".to_string(), no_wait)
        }
        _ => anyhow::bail!("Not a motion command: {:?}", command),
    };

    if no_wait {
        return match format {
            OutputFormat::Json => print_value(&sdk.get_status(id).await?),
            OutputFormat::Table => {
                println!("{}", format_success(&description));
                Ok(())
            }
        };
    }

    if matches!(format, OutputFormat::Table) {
        println!("{}...", description);
    }
    let outcome = wait_for_motion(sdk, id, MOTION_TIMEOUT).await?;

    match format {
        OutputFormat::Json => print_value(&sdk.get_status(id).await?),
        OutputFormat::Table => {
            print_wait_outcome(outcome);
            Ok(())
        }
    }
}

/// Handle sync command
pub async fn handle_sync(session: &Session) -> Result<()> {
    session.sdk.sync_position(session.device, 0.0).await?;
    println!("{}", format_success("Position synced to 0°"));
    Ok(())
}

/// Handle stop command
pub async fn handle_stop(session: &Session) -> Result<()> {
    session.sdk.stop_move(session.device).await?;
    println!("{}", format_success("Stop command sent"));
    Ok(())
}

/// Handle reverse command
pub async fn handle_reverse(session: &Session, state: ToggleState) -> Result<()> {
    let config = RotatorConfig {
        reverse_direction: state.is_on(),
        ..Default::default()
    };
    session
        .sdk
        .set_config(session.device, &config, ConfigMask::REVERSE_DIRECTION)
        .await?;

    let label = if state.is_on() { "ON".green() } else { "OFF".normal() };
    println!(
        "{}",
        format_success(&format!("Reverse direction {}", label))
    );
    Ok(())
}

/// Handle backlash command
pub async fn handle_backlash(session: &Session, degrees: f32) -> Result<()> {
    let config = RotatorConfig {
        backlash: degrees,
        ..Default::default()
    };
    session
        .sdk
        .set_config(session.device, &config, ConfigMask::BACKLASH)
        .await?;

    let applied = session.sdk.get_config(session.device).await?.backlash;
    println!(
        "{}",
        format_success(&format!("Backlash set to {:.1}°", applied))
    );
    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use wanderer_core::{RotatorModel, SdkConfig};

    use crate::session::{build_sdk, Backend};

    async fn mock_session(model: RotatorModel) -> Session {
        let sdk = build_sdk(Backend::Mock(model), &SdkConfig::default());
        Session::connect(sdk, None).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_motion_completes() {
        let session = mock_session(RotatorModel::Mini).await;
        session.sdk.move_by(0, 45.0).await.unwrap();

        match wait_for_motion(&session.sdk, 0, MOTION_TIMEOUT).await.unwrap() {
            WaitOutcome::Completed { position, elapsed } => {
                assert!((position - 45.0).abs() < 1e-9);
                assert!(elapsed >= MOTION_POLL_INTERVAL);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_motion_times_out() {
        let session = mock_session(RotatorModel::Mini).await;
        session.sdk.move_by(0, 180.0).await.unwrap();

        let outcome = wait_for_motion(&session.sdk, 0, Duration::from_millis(600))
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_handlers() {
        let session = mock_session(RotatorModel::Lite).await;

        handle_motion(
            &session,
            &Commands::MoveTo {
                angle: 90.0,
                no_wait: false,
            },
            &OutputFormat::Table,
        )
        .await
        .unwrap();
        let position = session.sdk.get_status(0).await.unwrap().position;
        assert!((position - 90.0).abs() < 1e-9);

        handle_motion(&session, &Commands::Home { no_wait: false }, &OutputFormat::Json)
            .await
            .unwrap();
        assert!(session.sdk.get_status(0).await.unwrap().position.abs() < 1e-9);

        assert!(handle_motion(&session, &Commands::Stop, &OutputFormat::Table)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_handlers() {
        let session = mock_session(RotatorModel::Mini).await;

        handle_reverse(&session, ToggleState::On).await.unwrap();
        handle_backlash(&session, 0.5).await.unwrap();

        let config = session.sdk.get_config(0).await.unwrap();
        assert!(config.reverse_direction);
        assert_eq!(config.backlash, 0.5);

        assert!(handle_backlash(&session, -1.0).await.is_err());
    }
}
