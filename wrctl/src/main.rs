//! Wanderer Rotator CLI
//!
//! Command-line interface for controlling Wanderer rotators.

use anyhow::Result;
use clap::Parser;
use wanderer_sdk::init_logging;
use wrctl::cli::{
    generate_completion, handle_backlash, handle_info, handle_motion, handle_reverse,
    handle_scan, handle_status, handle_stop, handle_sync, Cli, Commands,
};
use wrctl::config::{apply_verbose, load_config};
use wrctl::interactive;
use wrctl::session::{build_sdk, Backend, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completion { shell } = cli.command {
        generate_completion(shell);
        return Ok(());
    }

    // Build configuration using priority chain: defaults → file → CLI args
    let mut config = match load_config(cli.config.clone(), cli.no_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    apply_verbose(&mut config, cli.verbose);
    init_logging(&config.logging);

    let backend = if cli.mock {
        Backend::Mock(cli.mock_model)
    } else {
        Backend::Serial
    };
    let sdk = build_sdk(backend, &config);

    if let Err(e) = run(&cli, sdk).await {
        eprintln!("Error: {:#}", e);
        if cli.verbose {
            eprintln!("Error details: {:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli, sdk: wanderer_sdk::RotatorSdk) -> Result<()> {
    if !cli.command.needs_device() {
        return match cli.command {
            Commands::Scan => handle_scan(&sdk, &cli.format).await,
            _ => Ok(()),
        };
    }

    let session = Session::connect(sdk, cli.device).await?;

    let result = match &cli.command {
        Commands::Info => handle_info(&session, &cli.format).await,
        Commands::Status => handle_status(&session, &cli.format).await,
        command @ (Commands::Move { .. } | Commands::MoveTo { .. } | Commands::Home { .. }) => {
            handle_motion(&session, command, &cli.format).await
        }
        Commands::Sync => handle_sync(&session).await,
        Commands::Stop => handle_stop(&session).await,
        Commands::Reverse { state } => handle_reverse(&session, *state).await,
        Commands::Backlash { degrees } => handle_backlash(&session, *degrees).await,
        Commands::Interactive => interactive::run(&session).await,
        Commands::Scan | Commands::Completion { .. } => Ok(()),
    };

    session.close().await?;
    result
}
