//! Replay a candump log through the gatekeeper

use anyhow::Result;

use crate::candump;
use crate::commands::ReplayArgs;
use crate::config_file;
use crate::error::CliError;
use crate::output;
use crate::replay::{ReplayOptions, Replayer};

pub fn execute(args: &ReplayArgs, json: bool) -> Result<()> {
    let config = config_file::resolve(args.vehicle.config.as_deref(), &args.vehicle.preset)?;
    let text = std::fs::read_to_string(&args.log).map_err(CliError::from)?;
    let records = candump::parse_log(&text)?;
    tracing::info!(
        vehicle = %config.name,
        records = records.len(),
        log = %args.log.display(),
        "Replaying log"
    );

    let mut replayer = Replayer::new(config, ReplayOptions { echo: args.echo })?;
    let mut events = Vec::with_capacity(if json { records.len() } else { 0 });
    for record in &records {
        let event = replayer.step(record);
        if args.quiet {
            continue;
        }
        if json {
            events.push(event);
        } else {
            output::print_replay_event(&event);
        }
    }

    let summary = replayer.finish();
    output::print_replay_summary(&summary, &events, json);

    if args.strict {
        summary.into_result()?;
    }
    Ok(())
}
