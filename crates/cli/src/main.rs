//! gatectl - CAN gatekeeper control CLI
//!
//! Inspect vehicle configurations and replay recorded CAN traffic through
//! the safety engine.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod candump;
mod commands;
mod completion;
mod config_file;
mod error;
mod output;
mod replay;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{ReplayArgs, ShowArgs, ValidateArgs};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "gatectl")]
#[command(about = "CAN gatekeeper CLI - inspect vehicle configurations and replay CAN logs")]
#[command(version)]
#[command(long_about = "
gatectl works with the configurations of the cangate safety engine.
It lists and prints the built-in presets, validates configuration files,
and replays candump logs through the engine, reporting the integrity
outcome, forwarding decision and transmit verdict of every frame.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in vehicle presets
    Presets,

    /// Print a preset or configuration file
    Show(ShowArgs),

    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Replay a candump log through the engine
    Replay(ReplayArgs),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gatectl={log_level},cangate_safety={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    error.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Presets => commands::presets::execute(cli.json),
        Commands::Show(args) => commands::show::execute(args, cli.json),
        Commands::Validate(args) => commands::validate::execute(args, cli.json),
        Commands::Replay(args) => commands::replay::execute(args, cli.json),
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}
