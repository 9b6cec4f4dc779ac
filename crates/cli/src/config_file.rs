//! Loading vehicle configurations from presets and files.

use std::path::Path;

use cangate_safety::{Preset, VehicleConfig};

use crate::error::CliError;

/// Look up a preset by name.
pub fn preset(name: &str) -> Result<Preset, CliError> {
    name.parse().map_err(|_unknown| {
        let known: Vec<&str> = Preset::ALL.iter().map(|preset| preset.name()).collect();
        CliError::UnknownPreset(format!("{name} (known: {})", known.join(", ")))
    })
}

/// Read a configuration file. `.yaml`/`.yml` files are YAML, everything
/// else JSON. The result is validated.
pub fn load(path: &Path) -> Result<VehicleConfig, CliError> {
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    let config = parse(&text, is_yaml(path))?;
    tracing::debug!(path = %path.display(), vehicle = %config.name, "Loaded configuration");
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse(text: &str, yaml: bool) -> Result<VehicleConfig, CliError> {
    let config: VehicleConfig = if yaml {
        serde_yaml::from_str(text)?
    } else {
        serde_json::from_str(text)?
    };
    config
        .validate()
        .map_err(|err| CliError::ValidationError(err.to_string()))?;
    Ok(config)
}

/// Configuration from `--config`, else from `--preset`.
pub fn resolve(config: Option<&Path>, preset_name: &str) -> Result<VehicleConfig, CliError> {
    match config {
        Some(path) => load(path),
        None => Ok(preset(preset_name)?.config()?),
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}
