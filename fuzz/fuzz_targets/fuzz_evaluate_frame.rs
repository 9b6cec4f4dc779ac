//! Fuzzes the transmit gate with arbitrary outbound frames on an engaged
//! engine.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_evaluate_frame
#![no_main]
use cangate_safety::{CanFrame, Preset, SafetyEngine, TxKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let preset = Preset::ALL[usize::from(selector) % Preset::ALL.len()];
    let Ok(config) = preset.config() else {
        return;
    };
    let rules = config.tx_rules.clone();
    let Ok(mut engine) = SafetyEngine::new(config) else {
        return;
    };
    if rules.is_empty() {
        return;
    }

    for chunk in rest.chunks(9) {
        let Some((&index, payload)) = chunk.split_first() else {
            return;
        };
        let rule = rules[usize::from(index) % rules.len()];
        let Ok(frame) = CanFrame::new(rule.bus, rule.id, payload) else {
            return;
        };

        // Must never panic on any payload, including short ones.
        let verdict = engine.evaluate_frame(&frame);

        // Disengaged: steering may only hold zero torque.
        if verdict.is_accepted() && rule.kind == TxKind::SteeringTorque {
            let value = rule.value.and_then(|value| value.decode(frame.data()));
            assert_eq!(value, Some(0));
            assert_eq!(engine.actuation_state().desired_value_last, 0);
        }
    }
});
