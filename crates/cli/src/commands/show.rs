//! Print a vehicle configuration

use anyhow::Result;

use crate::commands::{ConfigFormat, ShowArgs};
use crate::config_file;
use crate::output;

pub fn execute(args: &ShowArgs, json: bool) -> Result<()> {
    let config = config_file::resolve(args.vehicle.config.as_deref(), &args.vehicle.preset)?;

    if args.summary && !json {
        output::print_config_summary(&config);
        return Ok(());
    }

    match (json, args.format) {
        (true, _) | (false, ConfigFormat::Json) => output::print_json(&config),
        (false, ConfigFormat::Yaml) => print!("{}", serde_yaml::to_string(&config)?),
    }
    Ok(())
}
