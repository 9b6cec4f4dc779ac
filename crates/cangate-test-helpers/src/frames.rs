//! Frame builders that fill in rolling counters and checksums.

use cangate_safety::{CanFrame, RxCheck, VehicleConfig};
use std::collections::HashMap;

/// Builds in-sequence frames for the tracked identifiers of a
/// configuration.
///
/// Identifiers without an integrity check pass through untouched.
#[derive(Debug, Clone)]
pub struct FramePacker {
    checks: Vec<RxCheck>,
    counters: HashMap<(u32, u8), u8>,
}

impl FramePacker {
    /// Packer for the rx checks of `config`.
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            checks: config.rx_checks.iter().copied().collect(),
            counters: HashMap::new(),
        }
    }

    fn check(&self, bus: u8, id: u32) -> Option<&RxCheck> {
        self.checks.iter().find(|check| check.id == id && check.bus == bus)
    }

    /// Write `counter` and the matching checksum into `data`.
    pub fn seal(&self, bus: u8, id: u32, mut data: [u8; 8], counter: u8) -> CanFrame {
        if let Some(check) = self.check(bus, id) {
            if let Some(counter_check) = &check.counter {
                counter_check
                    .field
                    .insert(&mut data, i32::from(counter))
                    .unwrap();
            }
            if let Some(checksum) = &check.checksum {
                let index = usize::from(checksum.byte);
                data[index] = checksum.algorithm.compute(id, &data, index, Some(counter));
            }
        }
        CanFrame::classic(bus, id, data)
    }

    /// Next counter value for `(bus, id)`; starts at 0.
    pub fn advance(&mut self, bus: u8, id: u32) -> u8 {
        let modulus = self
            .check(bus, id)
            .and_then(|check| check.counter)
            .map_or(16, |counter| counter.modulus);
        let entry = self.counters.entry((id, bus)).or_insert(u8::MAX);
        *entry = if *entry == u8::MAX {
            0
        } else {
            (*entry + 1) % modulus
        };
        *entry
    }

    /// Next in-sequence frame.
    pub fn next(&mut self, bus: u8, id: u32, data: [u8; 8]) -> CanFrame {
        let counter = self.advance(bus, id);
        self.seal(bus, id, data, counter)
    }

    /// Next frame with its checksum byte flipped. The counter still advances.
    pub fn corrupted(&mut self, bus: u8, id: u32, data: [u8; 8]) -> CanFrame {
        let frame = self.next(bus, id, data);
        let index = self
            .check(bus, id)
            .and_then(|check| check.checksum)
            .map_or(0, |checksum| usize::from(checksum.byte));
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(frame.data());
        bytes[index] ^= 0xFF;
        CanFrame::classic(bus, id, bytes)
    }

    /// Forget all counters.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
