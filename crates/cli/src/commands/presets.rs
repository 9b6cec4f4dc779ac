//! List the built-in vehicle presets

use anyhow::Result;

use crate::output;

pub fn execute(json: bool) -> Result<()> {
    output::print_presets(json);
    Ok(())
}
