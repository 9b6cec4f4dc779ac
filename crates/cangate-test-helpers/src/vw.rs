//! Payload builders for the Volkswagen presets.
//!
//! Counter and checksum bytes are left at zero; pass the payloads through a
//! [`FramePacker`](crate::frames::FramePacker).

/// Cruise status values carried by TSK_06.
pub mod tsk_status {
    /// Main switch off.
    pub const OFF: u8 = 0;
    /// Main switch on, not engaged.
    pub const STANDBY: u8 = 2;
    /// Engaged.
    pub const ACTIVE: u8 = 3;
    /// Engaged, overridden by the driver.
    pub const OVERRIDE: u8 = 5;
}

/// ESP_19: all four wheels at the same raw speed.
pub fn wheel_speeds(raw: u16) -> [u8; 8] {
    let [low, high] = raw.to_le_bytes();
    [low, high, low, high, low, high, low, high]
}

/// ESP_03 (MLB): four 12-bit wheel fields from bit 16.
pub fn mlb_wheel_speeds(raw: u16) -> [u8; 8] {
    let raw = u64::from(raw & 0x0FFF);
    let packed = (raw << 16) | (raw << 28) | (raw << 32) | (raw << 44);
    packed.to_le_bytes()
}

/// ESP_05: brake pressure flag.
pub fn brake_pressure(pressed: bool) -> [u8; 8] {
    [0, 0, 0, if pressed { 0x04 } else { 0 }, 0, 0, 0, 0]
}

/// MOTOR_14: brake switch.
pub fn brake_switch(pressed: bool) -> [u8; 8] {
    [0, 0, 0, if pressed { 0x10 } else { 0 }, 0, 0, 0, 0]
}

/// MOTOR_20: accelerator pedal position.
pub fn accelerator(position: u8) -> [u8; 8] {
    [0, (position & 0x0F) << 4, position >> 4, 0, 0, 0, 0, 0]
}

/// TSK_06: cruise status.
pub fn cruise_status(status: u8) -> [u8; 8] {
    [0, 0, 0, status & 0x07, 0, 0, 0, 0]
}

/// TSK_02 (MLB): cruise engaged flag.
pub fn mlb_cruise(engaged: bool) -> [u8; 8] {
    [0, 0, u8::from(engaged), 0, 0, 0, 0, 0]
}

/// Sign-magnitude torque with a 13-bit magnitude at bit 40 and the sign
/// at bit 55, as carried by LH_EPS_03.
pub fn driver_torque(torque: i16) -> [u8; 8] {
    let [low, high] = torque.unsigned_abs().to_le_bytes();
    let sign = if torque < 0 { 0x80 } else { 0 };
    [0, 0, 0, 0, 0, low, (high & 0x1F) | sign, 0]
}

/// HCA_01: requested steering torque.
pub fn steering_request(torque: i16) -> [u8; 8] {
    let [low, high] = torque.unsigned_abs().to_le_bytes();
    let sign = if torque < 0 { 0x80 } else { 0 };
    [0, 0, low, (high & 0x3F) | sign, 0, 0, 0, 0]
}

/// Cruise button states for GRA_ACC_01 / LS_01.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub cancel: bool,
    pub set: bool,
    pub resume: bool,
}

impl Buttons {
    pub const RELEASED: Self = Self {
        cancel: false,
        set: false,
        resume: false,
    };

    pub fn payload(self) -> [u8; 8] {
        let mut data = [0u8; 8];
        if self.cancel {
            data[1] |= 0x20;
        }
        if self.set {
            data[2] |= 0x01;
        }
        if self.resume {
            data[2] |= 0x08;
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangate_safety::{BitField, SignalValue};

    #[test]
    fn test_torque_layouts_decode() {
        let driver = BitField::sign_magnitude(40, 13, 55);
        assert_eq!(driver.extract(&driver_torque(-150)), Some(-150));
        assert_eq!(driver.extract(&driver_torque(4095)), Some(4095));

        let request = SignalValue::raw(BitField::sign_magnitude(16, 14, 31));
        assert_eq!(request.decode(&steering_request(-300)), Some(-300));
        assert_eq!(request.decode(&steering_request(0)), Some(0));
    }

    #[test]
    fn test_mlb_wheels_decode() {
        let data = mlb_wheel_speeds(0x123);
        // The inner fields overlap; only the outer ones read back exactly.
        assert_eq!(BitField::unsigned(16, 12).extract(&data), Some(0x123));
        assert_eq!(BitField::unsigned(44, 12).extract(&data), Some(0x123));
    }

    #[test]
    fn test_button_bits() {
        let data = Buttons {
            cancel: true,
            ..Buttons::RELEASED
        }
        .payload();
        assert_eq!(BitField::flag(13).is_set(&data), Some(true));
        assert_eq!(BitField::flag(16).is_set(&data), Some(false));
    }
}
