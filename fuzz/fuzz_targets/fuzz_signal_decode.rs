//! Fuzzes bit-field extraction and insertion with arbitrary layouts.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_signal_decode
#![no_main]
use cangate_safety::{BitField, ChecksumAlgorithm};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [start_lo, start_hi, width, kind, payload @ ..] = data else {
        return;
    };
    let start = u16::from_le_bytes([*start_lo, *start_hi]) % 600;
    let width = *width % 40;
    let field = match kind % 3 {
        0 => BitField::unsigned(start, width),
        1 => BitField::twos_complement(start, width),
        _ => BitField::sign_magnitude(start, width, start.saturating_add(u16::from(width))),
    };

    // Must never panic, valid layout or not.
    let extracted = field.extract(payload);
    if field.validate().is_ok() && payload.len() >= field.min_len() {
        assert!(extracted.is_some());
    }
    let mut scratch = payload.to_vec();
    if let Some(value) = extracted
        && field.insert(&mut scratch, value).is_some()
    {
        assert_eq!(field.extract(&scratch), Some(value));
    }

    let _crc = ChecksumAlgorithm::autosar_crc8(*kind).compute(0x126, payload, 0, None);
    let _j1850 = ChecksumAlgorithm::sae_j1850().compute(0x126, payload, usize::from(*kind), Some(*width));
});
