//! Named vehicle configurations.
//!
//! Message layouts are little-endian bit positions; see [`BitField`].

use crate::checksum::ChecksumAlgorithm;
use crate::config::{
    ButtonSignals, CruiseSignal, EngageSource, FlagSignal, ForwardRoute, GasSignal,
    LongitudinalLimits, RelayCheck, RxCheck, SpeedSignal, SteeringLimits, TorqueSignal, TxKind,
    TxRule, VehicleConfig, VehicleSignals,
};
use crate::frame::LOOPBACK_BUS_FLAG;
use crate::signal::{BitField, LinearScale, SignalValue};
use crate::{SafetyError, SafetyResult};
use core::fmt;
use core::str::FromStr;

/// Volkswagen MQB/MLB message identifiers.
pub mod volkswagen {
    /// Wheel speeds (MQB).
    pub const ESP_19: u32 = 0x0B2;
    /// Driver steering torque.
    pub const LH_EPS_03: u32 = 0x09F;
    /// Wheel speeds (MLB).
    pub const ESP_03: u32 = 0x103;
    /// Accelerator pedal and brake switch (MLB).
    pub const MOTOR_03: u32 = 0x105;
    /// Brake pressure.
    pub const ESP_05: u32 = 0x106;
    /// Cruise buttons (MLB).
    pub const LS_01: u32 = 0x10B;
    /// Cruise state (MLB).
    pub const TSK_02: u32 = 0x10C;
    /// Cruise state (MQB).
    pub const TSK_06: u32 = 0x120;
    /// Accelerator pedal (MQB).
    pub const MOTOR_20: u32 = 0x121;
    /// Acceleration request.
    pub const ACC_06: u32 = 0x122;
    /// Steering torque request.
    pub const HCA_01: u32 = 0x126;
    /// Cruise buttons (MQB).
    pub const GRA_ACC_01: u32 = 0x12B;
    /// Acceleration request, secondary.
    pub const ACC_07: u32 = 0x12E;
    /// Cruise HUD.
    pub const ACC_02: u32 = 0x30C;
    /// Lane assist HUD.
    pub const LDW_02: u32 = 0x397;
    /// Brake switch (MQB).
    pub const MOTOR_14: u32 = 0x3BE;

    /// Engage bits (set, resume) of the button byte.
    pub const BUTTON_ENGAGE_MASK: u32 = 0x09;
}

/// Stellantis DASM message identifiers.
pub mod stellantis {
    /// Driver steering torque.
    pub const EPS_2: u32 = 0x031;
    /// Brake pedal.
    pub const ABS_1: u32 = 0x079;
    /// Throttle position.
    pub const TPS_1: u32 = 0x081;
    /// Wheel speeds.
    pub const WHEEL_SPEEDS: u32 = 0x08B;
    /// Cruise state.
    pub const DASM_ACC: u32 = 0x099;
    /// Steering torque request.
    pub const DASM_LKAS: u32 = 0x0A6;
    /// Cruise buttons.
    pub const ACC_BUTTONS: u32 = 0x0B1;
    /// Lane assist HUD.
    pub const DASM_HUD: u32 = 0x0FA;

    /// Cancel bit of the button byte.
    pub const BUTTON_CANCEL: u32 = 0x01;
    /// Engage bits (set, resume) of the button byte.
    pub const BUTTON_ENGAGE_MASK: u32 = 0x14;
    /// `ACC_STATUS` while cruise is engaged.
    pub const ACC_STATUS_ENGAGED: i32 = 3;
}

use volkswagen::*;

/// Vehicle-side bus.
const BUS_VEHICLE: u8 = 0;
/// Camera-side bus.
const BUS_CAMERA: u8 = 2;

const RELAY_TIMEOUT: u64 = 500_000;
const WHEEL_SCALE: f32 = 0.0075;

/// A named configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Volkswagen MQB, stock longitudinal.
    VolkswagenMqb,
    /// Volkswagen MQB, gateway longitudinal.
    VolkswagenMqbLongitudinal,
    /// Volkswagen MLB.
    VolkswagenMlb,
    /// Stellantis with the DASM camera.
    Stellantis,
    /// Pass-through between buses 0 and 2, nothing transmitted.
    ForwardOnly,
}

impl Preset {
    /// All presets.
    pub const ALL: [Self; 5] = [
        Self::VolkswagenMqb,
        Self::VolkswagenMqbLongitudinal,
        Self::VolkswagenMlb,
        Self::Stellantis,
        Self::ForwardOnly,
    ];

    /// Stable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VolkswagenMqb => "volkswagen-mqb",
            Self::VolkswagenMqbLongitudinal => "volkswagen-mqb-long",
            Self::VolkswagenMlb => "volkswagen-mlb",
            Self::Stellantis => "stellantis",
            Self::ForwardOnly => "forward-only",
        }
    }

    /// One-line summary for listings.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::VolkswagenMqb => "Volkswagen MQB, lateral control with stock cruise",
            Self::VolkswagenMqbLongitudinal => "Volkswagen MQB, lateral and longitudinal control",
            Self::VolkswagenMlb => "Volkswagen MLB, lateral control with stock cruise",
            Self::Stellantis => "Stellantis DASM, lateral control with stock cruise",
            Self::ForwardOnly => "Pass-through between buses 0 and 2, nothing transmitted",
        }
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors; the shipped presets fit.
    pub fn config(self) -> SafetyResult<VehicleConfig> {
        match self {
            Self::VolkswagenMqb => VehicleConfig::volkswagen_mqb(),
            Self::VolkswagenMqbLongitudinal => VehicleConfig::volkswagen_mqb_longitudinal(),
            Self::VolkswagenMlb => VehicleConfig::volkswagen_mlb(),
            Self::Stellantis => VehicleConfig::stellantis(),
            Self::ForwardOnly => VehicleConfig::forward_only(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = SafetyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or(SafetyError::invalid_config("preset", "unknown preset name"))
    }
}

fn counter_field() -> BitField {
    BitField::unsigned(8, 4)
}

fn crc_check(id: u32, pad: u8, interval: u64) -> RxCheck {
    RxCheck::new(id, BUS_VEHICLE)
        .with_counter(counter_field(), 16)
        .with_checksum(0, ChecksumAlgorithm::autosar_crc8(pad))
        .with_interval(interval)
}

fn counter_check(id: u32, interval: u64) -> RxCheck {
    RxCheck::new(id, BUS_VEHICLE)
        .with_counter(counter_field(), 16)
        .with_interval(interval)
}

fn steering_rule() -> TxRule {
    TxRule::checked(
        HCA_01,
        BUS_VEHICLE,
        TxKind::SteeringTorque,
        SignalValue::raw(BitField::sign_magnitude(16, 14, 31)),
    )
}

fn button_rule(id: u32, bus: u8) -> TxRule {
    TxRule::checked(
        id,
        bus,
        TxKind::CruiseButtons {
            engage_mask: BUTTON_ENGAGE_MASK,
        },
        SignalValue::raw(BitField::unsigned(16, 8)),
    )
}

fn relay() -> RelayCheck {
    RelayCheck {
        id: HCA_01,
        tx_bus: BUS_VEHICLE,
        echo_bus: LOOPBACK_BUS_FLAG | BUS_VEHICLE,
        fault_bus: Some(BUS_VEHICLE),
        timeout: RELAY_TIMEOUT,
    }
}

fn mqb_signals(longitudinal: bool) -> SafetyResult<VehicleSignals> {
    let mut signals = VehicleSignals::none(BUS_VEHICLE);
    signals.speed = Some(SpeedSignal {
        id: ESP_19,
        wheels: heapless::Vec::from_slice(&[
            BitField::unsigned(0, 16),
            BitField::unsigned(16, 16),
            BitField::unsigned(32, 16),
            BitField::unsigned(48, 16),
        ])
        .map_err(|()| SafetyError::capacity_exceeded("signals.speed.wheels", 4))?,
        scale: LinearScale::factor(WHEEL_SCALE),
    });
    signals.brake = heapless::Vec::from_slice(&[
        FlagSignal {
            id: ESP_05,
            field: BitField::flag(26),
        },
        FlagSignal {
            id: MOTOR_14,
            field: BitField::flag(28),
        },
    ])
    .map_err(|()| SafetyError::capacity_exceeded("signals.brake", 4))?;
    signals.gas = Some(GasSignal {
        id: MOTOR_20,
        field: BitField::unsigned(12, 8),
        threshold: 0,
    });
    signals.cruise = Some(CruiseSignal {
        id: TSK_06,
        field: BitField::unsigned(24, 3),
        engaged_values: values(&[3, 4, 5])?,
        main_on_values: values(&[2, 3, 4, 5])?,
    });
    signals.driver_torque = Some(TorqueSignal {
        id: LH_EPS_03,
        field: BitField::sign_magnitude(40, 13, 55),
    });
    signals.buttons = Some(ButtonSignals {
        id: GRA_ACC_01,
        cancel: Some(BitField::flag(13)),
        set: longitudinal.then_some(BitField::flag(16)),
        resume: longitudinal.then_some(BitField::flag(19)),
    });
    Ok(signals)
}

fn values(list: &[i32]) -> SafetyResult<heapless::Vec<i32, 8>> {
    heapless::Vec::from_slice(list)
        .map_err(|()| SafetyError::capacity_exceeded("signals.cruise.values", 8))
}

fn mqb_rx_checks(config: &mut VehicleConfig) -> SafetyResult<()> {
    config.add_rx_check(RxCheck::new(ESP_19, BUS_VEHICLE).with_interval(10_000))?;
    config.add_rx_check(crc_check(LH_EPS_03, 0xF5, 10_000))?;
    config.add_rx_check(crc_check(ESP_05, 0x07, 20_000))?;
    config.add_rx_check(crc_check(TSK_06, 0xC4, 20_000))?;
    config.add_rx_check(crc_check(MOTOR_20, 0xE9, 20_000))?;
    config.add_rx_check(RxCheck::new(MOTOR_14, BUS_VEHICLE).with_interval(100_000))
}

impl VehicleConfig {
    /// Volkswagen MQB with the stock cruise control in charge of speed.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors.
    pub fn volkswagen_mqb() -> SafetyResult<Self> {
        let mut config = Self::new(Preset::VolkswagenMqb.name())?;
        mqb_rx_checks(&mut config)?;
        config.signals = mqb_signals(false)?;
        config.steering = Some(SteeringLimits::volkswagen_mxb());

        config.allow_tx(steering_rule())?;
        config.allow_tx(button_rule(GRA_ACC_01, BUS_VEHICLE))?;
        config.allow_tx(button_rule(GRA_ACC_01, BUS_CAMERA))?;
        config.allow_tx(TxRule::passthrough(LDW_02, BUS_VEHICLE))?;

        config.add_route(ForwardRoute::new(BUS_VEHICLE, BUS_CAMERA))?;
        config.add_route(ForwardRoute::blocking(BUS_CAMERA, BUS_VEHICLE, &[HCA_01, LDW_02])?)?;
        config.relay = Some(relay());
        Ok(config)
    }

    /// Volkswagen MQB with the gateway sending acceleration requests.
    ///
    /// Engagement follows the set/resume buttons instead of the stock
    /// cruise state.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors.
    pub fn volkswagen_mqb_longitudinal() -> SafetyResult<Self> {
        let mut config = Self::new(Preset::VolkswagenMqbLongitudinal.name())?;
        mqb_rx_checks(&mut config)?;
        config.signals = mqb_signals(true)?;
        config.steering = Some(SteeringLimits::volkswagen_mxb());
        config.longitudinal = Some(LongitudinalLimits::volkswagen_mxb());
        config.engagement.source = EngageSource::ButtonRelease;

        let accel = |start_bit| SignalValue::scaled(BitField::unsigned(start_bit, 11), 5, -7220);
        config.allow_tx(steering_rule())?;
        config.allow_tx(TxRule::passthrough(LDW_02, BUS_VEHICLE))?;
        config.allow_tx(TxRule::passthrough(ACC_02, BUS_VEHICLE))?;
        config.allow_tx(TxRule::checked(ACC_06, BUS_VEHICLE, TxKind::Acceleration, accel(24)))?;
        config.allow_tx(
            TxRule::checked(ACC_07, BUS_VEHICLE, TxKind::Acceleration, accel(53)).with_pinned(
                SignalValue::scaled(BitField::unsigned(32, 8), 30, -4600),
                3020,
            ),
        )?;

        config.add_route(ForwardRoute::new(BUS_VEHICLE, BUS_CAMERA))?;
        config.add_route(ForwardRoute::blocking(
            BUS_CAMERA,
            BUS_VEHICLE,
            &[HCA_01, LDW_02, ACC_02, ACC_06, ACC_07],
        )?)?;
        config.relay = Some(relay());
        Ok(config)
    }

    /// Volkswagen MLB. Only rolling counters are checked on receive.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors.
    pub fn volkswagen_mlb() -> SafetyResult<Self> {
        let mut config = Self::new(Preset::VolkswagenMlb.name())?;
        config.add_rx_check(counter_check(ESP_03, 20_000))?;
        config.add_rx_check(counter_check(LH_EPS_03, 10_000))?;
        config.add_rx_check(counter_check(ESP_05, 20_000))?;
        config.add_rx_check(counter_check(TSK_02, 20_000))?;
        config.add_rx_check(counter_check(MOTOR_03, 10_000))?;

        let mut signals = VehicleSignals::none(BUS_VEHICLE);
        // The rear-left field overlaps the front-right one on this platform.
        signals.speed = Some(SpeedSignal {
            id: ESP_03,
            wheels: heapless::Vec::from_slice(&[
                BitField::unsigned(16, 12),
                BitField::unsigned(28, 12),
                BitField::unsigned(32, 12),
                BitField::unsigned(44, 12),
            ])
            .map_err(|()| SafetyError::capacity_exceeded("signals.speed.wheels", 4))?,
            scale: LinearScale::factor(WHEEL_SCALE),
        });
        signals.brake = heapless::Vec::from_slice(&[
            FlagSignal {
                id: ESP_05,
                field: BitField::flag(26),
            },
            FlagSignal {
                id: MOTOR_03,
                field: BitField::flag(35),
            },
        ])
        .map_err(|()| SafetyError::capacity_exceeded("signals.brake", 4))?;
        signals.gas = Some(GasSignal {
            id: MOTOR_03,
            field: BitField::unsigned(48, 8),
            threshold: 0,
        });
        signals.cruise = Some(CruiseSignal {
            id: TSK_02,
            field: BitField::unsigned(16, 2),
            engaged_values: values(&[1])?,
            main_on_values: heapless::Vec::new(),
        });
        signals.driver_torque = Some(TorqueSignal {
            id: LH_EPS_03,
            field: BitField::sign_magnitude(40, 13, 55),
        });
        signals.buttons = Some(ButtonSignals {
            id: LS_01,
            cancel: Some(BitField::flag(13)),
            set: None,
            resume: None,
        });
        config.signals = signals;
        config.steering = Some(SteeringLimits::volkswagen_mxb());

        config.allow_tx(steering_rule())?;
        config.allow_tx(button_rule(LS_01, BUS_VEHICLE))?;
        config.allow_tx(button_rule(LS_01, BUS_CAMERA))?;

        config.add_route(ForwardRoute::new(BUS_VEHICLE, BUS_CAMERA))?;
        config.add_route(ForwardRoute::blocking(BUS_CAMERA, BUS_VEHICLE, &[HCA_01])?)?;
        config.relay = Some(relay());
        Ok(config)
    }

    /// Stellantis with the DASM camera. Only rolling counters are checked
    /// on receive.
    ///
    /// Every message keeps its 4-bit counter in the high nibble of byte 6.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors.
    pub fn stellantis() -> SafetyResult<Self> {
        use stellantis::{
            ABS_1, ACC_BUTTONS, ACC_STATUS_ENGAGED, DASM_ACC, DASM_HUD, DASM_LKAS, EPS_2, TPS_1,
            WHEEL_SPEEDS,
        };

        let counter = |id| RxCheck::new(id, BUS_VEHICLE).with_counter(BitField::unsigned(52, 4), 16);
        let mut config = Self::new(Preset::Stellantis.name())?;
        config.add_rx_check(counter(EPS_2))?;
        config.add_rx_check(counter(ABS_1))?;
        config.add_rx_check(counter(TPS_1))?;
        config.add_rx_check(counter(DASM_ACC))?;
        config.add_rx_check(RxCheck::new(WHEEL_SPEEDS, BUS_VEHICLE))?;

        let mut signals = VehicleSignals::none(BUS_VEHICLE);
        signals.speed = Some(SpeedSignal {
            id: WHEEL_SPEEDS,
            wheels: heapless::Vec::from_slice(&[
                BitField::unsigned(0, 16),
                BitField::unsigned(16, 16),
                BitField::unsigned(32, 16),
                BitField::unsigned(48, 16),
            ])
            .map_err(|()| SafetyError::capacity_exceeded("signals.speed.wheels", 4))?,
            scale: LinearScale::factor(1.0),
        });
        signals.brake = heapless::Vec::from_slice(&[FlagSignal {
            id: ABS_1,
            field: BitField::flag(0),
        }])
        .map_err(|()| SafetyError::capacity_exceeded("signals.brake", 4))?;
        signals.gas = Some(GasSignal {
            id: TPS_1,
            field: BitField::unsigned(0, 8),
            threshold: 0,
        });
        signals.cruise = Some(CruiseSignal {
            id: DASM_ACC,
            field: BitField::unsigned(0, 3),
            engaged_values: values(&[ACC_STATUS_ENGAGED])?,
            main_on_values: heapless::Vec::new(),
        });
        signals.driver_torque = Some(TorqueSignal {
            id: EPS_2,
            field: BitField::twos_complement(0, 12),
        });
        signals.buttons = Some(ButtonSignals {
            id: ACC_BUTTONS,
            cancel: Some(BitField::flag(0)),
            set: None,
            resume: None,
        });
        config.signals = signals;
        config.steering = Some(SteeringLimits::stellantis());
        config.engagement.standstill_threshold = 1.0;

        config.allow_tx(TxRule::checked(
            DASM_LKAS,
            BUS_VEHICLE,
            TxKind::SteeringTorque,
            SignalValue::raw(BitField::twos_complement(0, 11)),
        ))?;
        config.allow_tx(TxRule::passthrough(DASM_HUD, BUS_VEHICLE))?;
        config.allow_tx(TxRule::checked(
            ACC_BUTTONS,
            BUS_CAMERA,
            TxKind::CruiseButtons {
                engage_mask: stellantis::BUTTON_ENGAGE_MASK,
            },
            SignalValue::raw(BitField::unsigned(0, 8)),
        ))?;

        config.add_route(ForwardRoute::new(BUS_VEHICLE, BUS_CAMERA))?;
        config.add_route(ForwardRoute::blocking(BUS_CAMERA, BUS_VEHICLE, &[DASM_LKAS, DASM_HUD])?)?;
        config.relay = Some(RelayCheck {
            id: DASM_LKAS,
            ..relay()
        });
        Ok(config)
    }

    /// Forward everything between buses 0 and 2; transmit nothing.
    ///
    /// # Errors
    ///
    /// Propagates table capacity errors.
    pub fn forward_only() -> SafetyResult<Self> {
        let mut config = Self::new(Preset::ForwardOnly.name())?;
        config.add_route(ForwardRoute::new(BUS_VEHICLE, BUS_CAMERA))?;
        config.add_route(ForwardRoute::new(BUS_CAMERA, BUS_VEHICLE))?;
        Ok(config)
    }
}
