//! Fuzzes configuration loading from JSON and YAML text.
//!
//! Anything that deserializes and validates must build an engine.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_config_parse
#![no_main]
use cangate_safety::{SafetyEngine, VehicleConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let parsed = serde_json::from_str::<VehicleConfig>(text)
        .ok()
        .or_else(|| serde_yaml::from_str::<VehicleConfig>(text).ok());
    let Some(config) = parsed else {
        return;
    };
    if config.validate().is_ok() {
        assert!(SafetyEngine::new(config).is_ok());
    }
});
