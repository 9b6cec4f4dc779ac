//! Output formatting for CLI responses

use anyhow::Error;
use cangate_safety::{EngagementState, Preset, TxVerdict, ValidityOutcome, VehicleConfig};
use colored::*;
use serde::Serialize;
use serde_json::json;

use crate::replay::{Decision, ReplayEvent, ReplaySummary};

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

/// Print preset list in specified format
pub fn print_presets(json: bool) {
    if json {
        let presets: Vec<_> = Preset::ALL
            .iter()
            .map(|preset| json!({ "name": preset.name(), "description": preset.description() }))
            .collect();
        print_json(&json!({ "success": true, "presets": presets }));
    } else {
        println!("{}", "Presets:".bold());
        for preset in Preset::ALL {
            println!("  {:<22} {}", preset.name().bold(), preset.description().dimmed());
        }
    }
}

/// Human summary of a configuration's tables.
pub fn print_config_summary(config: &VehicleConfig) {
    println!("{} {}", "Vehicle:".bold(), config.name);
    println!("  Rx checks:   {}", config.rx_checks.len());
    for check in &config.rx_checks {
        let interval = check
            .expected_interval
            .map_or_else(|| "untimed".to_string(), |ticks| format!("every {ticks} us"));
        let counter = if check.counter.is_some() { " counter" } else { "" };
        let checksum = check
            .checksum
            .map_or_else(String::new, |sum| format!(" {:?}", sum.algorithm));
        println!("    {}:{:03X} {interval}{counter}{checksum}", check.bus, check.id);
    }
    println!("  Tx rules:    {}", config.tx_rules.len());
    for rule in &config.tx_rules {
        println!("    {}:{:03X} {:?}", rule.bus, rule.id, rule.kind);
    }
    println!("  Routes:      {}", config.forwarding.len());
    for route in &config.forwarding {
        println!(
            "    {} -> {} ({} blocked)",
            route.from_bus,
            route.to_bus,
            route.blacklist.len()
        );
    }
    match config.relay {
        Some(relay) => println!(
            "  Relay watch: {:03X} echo on bus {:#04x}, timeout {} us",
            relay.id, relay.echo_bus, relay.timeout
        ),
        None => println!("  Relay watch: none"),
    }
}

/// One replay line in human format
pub fn print_replay_event(event: &ReplayEvent) {
    let decision = match event.decision {
        Decision::Rx { outcome, forward } => {
            let outcome = match outcome {
                ValidityOutcome::Valid => "valid".green(),
                ValidityOutcome::Untracked => "untracked".dimmed(),
                ValidityOutcome::Invalid(fault) => format!("invalid: {fault}").red(),
            };
            let forward = forward.map_or_else(|| "dropped".to_string(), |bus| format!("-> {bus}"));
            format!("rx {outcome} {forward}")
        }
        Decision::Tx { verdict } => match verdict {
            TxVerdict::Accept => format!("tx {}", "accepted".green()),
            TxVerdict::Reject(reason) => format!("tx {}", format!("rejected: {reason}").red()),
        },
    };
    print!("{:>6} {:>12} {:<28} {}", event.line, event.tick, event.frame, decision);
    match event.transition {
        Some(EngagementState::Engaged) => println!("  {}", "ENGAGED".green().bold()),
        Some(EngagementState::Disengaged) => println!("  {}", "DISENGAGED".yellow().bold()),
        None => println!(),
    }
}

/// Replay totals in specified format
pub fn print_replay_summary(summary: &ReplaySummary, events: &[ReplayEvent], json: bool) {
    if json {
        print_json(&json!({
            "success": summary.is_clean(),
            "summary": summary,
            "events": events,
        }));
        return;
    }

    println!();
    println!("{} {}", "Replay:".bold(), summary.vehicle);
    println!("  Frames:      {} over {} us", summary.frames, summary.duration);
    println!(
        "  Received:    {} valid, {} invalid, {} untracked",
        summary.valid, summary.invalid, summary.untracked
    );
    println!("  Forwarded:   {} ({} dropped)", summary.forwarded, summary.blocked);
    println!("  Transmit:    {} accepted, {} rejected", summary.accepted, summary.rejected);
    println!(
        "  Engagement:  {} engaged, {} disengaged, ending {:?}",
        summary.engagements, summary.disengagements, summary.final_state
    );
    if let Some(fault) = summary.relay_fault {
        println!("  {} {}", "Relay malfunction:".red().bold(), fault);
    }
}

/// Print success message
pub fn print_success(message: &str, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "message": message
        }));
    } else {
        println!("{} {}", "✓".green(), message);
    }
}
