//! Check a configuration file

use anyhow::Result;
use cangate_safety::SafetyEngine;

use crate::commands::ValidateArgs;
use crate::config_file;
use crate::output;

pub fn execute(args: &ValidateArgs, json: bool) -> Result<()> {
    let config = config_file::load(&args.file)?;
    let summary = format!(
        "{} is valid: {} rx checks, {} tx rules, {} routes",
        config.name,
        config.rx_checks.len(),
        config.tx_rules.len(),
        config.forwarding.len()
    );
    // Engine construction re-runs validation and sizes every table.
    let engine = SafetyEngine::new(config)?;
    tracing::info!(vehicle = %engine.config().name, "Configuration accepted");

    output::print_success(&summary, json);
    Ok(())
}
