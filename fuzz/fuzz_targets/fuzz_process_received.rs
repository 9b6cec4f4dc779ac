//! Fuzzes the receive path with arbitrary frame streams.
//!
//! Each record is `[bus, id_lo, id_hi, len, payload...]` followed by a
//! one-byte time step. Tracked identifiers of every preset are reachable
//! through the low identifier bits.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_process_received
#![no_main]
use cangate_safety::{CanFrame, Preset, SafetyEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, mut rest)) = data.split_first() else {
        return;
    };
    let preset = Preset::ALL[usize::from(selector) % Preset::ALL.len()];
    let Ok(config) = preset.config() else {
        return;
    };
    let Ok(mut engine) = SafetyEngine::new(config) else {
        return;
    };

    let mut now = 0u64;
    while let [bus, id_lo, id_hi, len, tail @ ..] = rest {
        let len = usize::from(*len % 65).min(tail.len());
        let (payload, after) = tail.split_at(len);
        let id = u32::from(u16::from_le_bytes([*id_lo, *id_hi]) & 0x7FF);
        let Ok(frame) = CanFrame::new(*bus, id, payload) else {
            return;
        };

        // Must never panic; outcomes of any kind are fine.
        let outcome = engine.process_received(&frame);
        let _forward = engine.should_forward(&frame, frame.bus());
        if !outcome.is_trusted() {
            assert!(engine.integrity().state(id, *bus).is_some());
        }

        let Some((&step, after)) = after.split_first() else {
            return;
        };
        now = now.saturating_add(u64::from(step) * 1_000);
        engine.tick(now);
        assert_eq!(engine.now(), now);
        if engine.relay_malfunction().is_some() {
            assert!(!engine.controls_allowed());
        }
        rest = after;
    }
});
