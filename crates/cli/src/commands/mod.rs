//! Command implementations for gatectl

pub mod presets;
pub mod replay;
pub mod show;
pub mod validate;

use std::path::PathBuf;

use clap::{Args, ValueEnum};

/// Serialization format for `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
}

/// Where the vehicle configuration comes from.
#[derive(Debug, Args)]
pub struct VehicleArgs {
    /// Named preset
    #[arg(short, long, default_value = "volkswagen-mqb", env = "GATECTL_PRESET")]
    pub preset: String,

    /// Configuration file (JSON, or YAML by extension); overrides --preset
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub vehicle: VehicleArgs,

    /// Output format; --json forces JSON
    #[arg(short, long, value_enum, default_value_t)]
    pub format: ConfigFormat,

    /// Print a table summary instead of the full configuration
    #[arg(short, long)]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Configuration file to check
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// candump log file
    pub log: PathBuf,

    #[command(flatten)]
    pub vehicle: VehicleArgs,

    /// Feed accepted outbound frames back as loopback echoes
    #[arg(long)]
    pub echo: bool,

    /// Only print the summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with an error if any frame was rejected or invalid
    #[arg(long)]
    pub strict: bool,
}
