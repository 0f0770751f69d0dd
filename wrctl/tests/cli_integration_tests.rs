//! CLI integration tests
//!
//! Argument parsing plus full command flows against a simulated rotator.

use clap::Parser;
use wanderer_core::{RotatorModel, SdkConfig};
use wrctl::cli::{handle_info, handle_motion, handle_scan, handle_status, Cli, Commands, OutputFormat};
use wrctl::config::load_config;
use wrctl::session::{build_sdk, discover, Backend, Session};

#[test]
fn test_help_lists_commands() {
    let err = Cli::try_parse_from(["wrctl", "--help"]).unwrap_err();
    let help = err.to_string();
    for command in ["scan", "info", "status", "move", "move-to", "home", "sync", "stop"] {
        assert!(help.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_subcommand_required() {
    assert!(Cli::try_parse_from(["wrctl"]).is_err());
}

#[test]
fn test_move_to_no_wait() {
    let cli = Cli::try_parse_from(["wrctl", "--mock", "move-to", "270", "--no-wait"]).unwrap();
    assert!(cli.mock);
    match cli.command {
        Commands::MoveTo { angle, no_wait } => {
            assert_eq!(angle, 270.0);
            assert!(no_wait);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_backlash_requires_value() {
    assert!(Cli::try_parse_from(["wrctl", "backlash"]).is_err());
    assert!(Cli::try_parse_from(["wrctl", "backlash", "abc"]).is_err());
}

#[test]
fn test_completion_shell() {
    let cli = Cli::try_parse_from(["wrctl", "completion", "bash"]).unwrap();
    assert!(matches!(cli.command, Commands::Completion { .. }));
    assert!(!cli.command.needs_device());
}

#[test]
fn test_no_config_loads_defaults() {
    let cli = Cli::try_parse_from(["wrctl", "--no-config", "scan"]).unwrap();
    let config = load_config(cli.config, cli.no_config).unwrap();
    assert_eq!(config, SdkConfig::default());
}

#[tokio::test(start_paused = true)]
async fn test_scan_mock() {
    let sdk = build_sdk(Backend::Mock(RotatorModel::Lite), &SdkConfig::default());
    handle_scan(&sdk, &OutputFormat::Json).await.unwrap();

    let devices = discover(&sdk).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].model, "Lite");
    // Discovery leaves the device closed
    assert!(!sdk.is_open(0).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_session_flow() {
    let sdk = build_sdk(Backend::Mock(RotatorModel::LiteV2), &SdkConfig::default());
    let session = Session::connect(sdk, Some(0)).await.unwrap();

    handle_info(&session, &OutputFormat::Json).await.unwrap();
    handle_status(&session, &OutputFormat::Table).await.unwrap();
    handle_motion(
        &session,
        &Commands::Move {
            angle: -30.0,
            no_wait: false,
        },
        &OutputFormat::Table,
    )
    .await
    .unwrap();

    let status = session.sdk.get_status(0).await.unwrap();
    assert!(!status.moving);
    assert!((status.position - 330.0).abs() < 1e-9);

    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_move_to_out_of_range_fails() {
    let sdk = build_sdk(Backend::Mock(RotatorModel::Mini), &SdkConfig::default());
    let session = Session::connect(sdk, None).await.unwrap();

    let result = handle_motion(
        &session,
        &Commands::MoveTo {
            angle: 360.0,
            no_wait: true,
        },
        &OutputFormat::Table,
    )
    .await;
    assert!(result.is_err());
}
