//! Error types for gatectl

use cangate_safety::RelayFault;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Log line {line}: {reason}")]
    LogParse { line: usize, reason: String },

    #[error(
        "Replay finished with {rejected} rejected and {invalid} invalid frames{}",
        .relay_fault.map(|fault| format!(", relay malfunction: {fault}")).unwrap_or_default()
    )]
    ReplayFaults {
        rejected: usize,
        invalid: usize,
        relay_fault: Option<RelayFault>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Safety error: {0}")]
    SafetyError(#[from] cangate_safety::SafetyError),
}

impl CliError {
    pub fn log_parse(line: usize, reason: impl Into<String>) -> Self {
        Self::LogParse {
            line,
            reason: reason.into(),
        }
    }

    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownPreset(_) => 2,
            Self::ConfigNotFound(_) => 3,
            Self::ValidationError(_)
            | Self::JsonError(_)
            | Self::YamlError(_)
            | Self::SafetyError(_) => 4,
            Self::LogParse { .. } => 5,
            Self::ReplayFaults { .. } => 6,
            Self::IoError(_) => 1,
        }
    }
}
