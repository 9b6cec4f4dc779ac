mod unit_tests;

use crate::*;

/// Fill in counter and checksum for a tracked identifier.
fn sealed(config: &VehicleConfig, bus: u8, id: u32, mut data: [u8; 8], counter: u8) -> CanFrame {
    if let Some(check) = config.rx_checks.iter().find(|c| c.id == id && c.bus == bus) {
        if let Some(counter_check) = &check.counter {
            let _ = counter_check.field.insert(&mut data, i32::from(counter));
        }
        if let Some(checksum) = &check.checksum {
            let index = usize::from(checksum.byte);
            let value = checksum.algorithm.compute(id, &data, index, Some(counter));
            if let Some(byte) = data.get_mut(index) {
                *byte = value;
            }
        }
    }
    CanFrame::classic(bus, id, data)
}

/// Rolling counters per identifier, so tests can emit in-sequence frames.
#[derive(Debug, Default)]
struct Feed {
    counters: [(u32, u8); 16],
    used: usize,
}

impl Feed {
    fn next(&mut self, id: u32) -> u8 {
        if let Some((_, counter)) = self.counters.iter_mut().take(self.used).find(|(i, _)| *i == id) {
            *counter = (*counter + 1) % 16;
            return *counter;
        }
        if let Some(slot) = self.counters.get_mut(self.used) {
            *slot = (id, 0);
            self.used += 1;
        }
        0
    }

    fn frame(&mut self, config: &VehicleConfig, id: u32, data: [u8; 8]) -> CanFrame {
        let counter = self.next(id);
        sealed(config, 0, id, data, counter)
    }
}
