//! melbridge CLI
//!
//! Command-line interface for the melbridge feature pipeline and tensor bridge.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use melbridge::cli::commands;
use melbridge::cli::{Cli, Commands};
use melbridge::{Config, MelBridgeError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("melbridge v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = commands::load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("melbridge v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handle_command(cmd: Commands, config: &Config) -> anyhow::Result<ExitCode> {
    let passed = match cmd {
        Commands::Extract { audio, output } => {
            commands::extract(config, &audio, &output)
                .with_context(|| format!("extracting features from {}", audio.display()))?;
            true
        }
        Commands::ExportWeights { model, output } => {
            commands::export(&model, &output)
                .with_context(|| format!("exporting weights to {}", output.display()))?;
            true
        }
        Commands::VerifyWeights { model, weights_dir } => {
            commands::verify_weights(config, &model, &weights_dir)
                .with_context(|| format!("verifying {}", weights_dir.display()))?
        }
        Commands::VerifyFeatures {
            reference,
            candidate,
        } => commands::verify_features(config, &reference, &candidate)
            .context("verifying feature maps")?,
        Commands::Contract { json } => {
            commands::show_contract(config, json)?;
            true
        }
        Commands::Predict { output, top } => {
            commands::predict(&output, top)
                .with_context(|| format!("reading {}", output.display()))?;
            true
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Print the error chain, plus code and hints when it came from the library
fn report(err: &anyhow::Error) {
    eprintln!("Error: {:#}", err);
    if let Some(e) = err.downcast_ref::<MelBridgeError>() {
        error!(code = e.error_code(), recoverable = e.is_recoverable(), "{}", e);
        commands::print_hints(e);
    }
}
