//! Controls-allowed state machine.

use crate::config::{AlternativeExperience, EngageSource, EngagementConfig};
use crate::vehicle_state::VehicleState;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Engagement state. `controls_allowed` is `state == Engaged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EngagementState {
    /// Actuation commands are held to neutral.
    #[default]
    Disengaged,
    /// Actuation commands may reach the vehicle, within limits.
    Engaged,
}

/// Why the engine left (or refused) the engaged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "reason", rename_all = "snake_case"))]
pub enum DisengageReason {
    /// Stock cruise switched off.
    CruiseDisengaged,
    /// Brake pressed with the vehicle moving.
    BrakeWhileMoving,
    /// Gas pressed.
    GasPressed,
    /// Cruise main switch off.
    MainSwitchOff,
    /// Cancel button pressed.
    CancelPressed,
    /// Repeated integrity failures on one identifier.
    IntegrityFailure {
        /// Failing identifier.
        id: u32,
    },
    /// A tracked identifier stopped arriving.
    RxLagging {
        /// Silent identifier.
        id: u32,
    },
    /// Relay malfunction latched.
    RelayMalfunction,
}

impl fmt::Display for DisengageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CruiseDisengaged => write!(f, "cruise disengaged"),
            Self::BrakeWhileMoving => write!(f, "brake pressed while moving"),
            Self::GasPressed => write!(f, "gas pressed"),
            Self::MainSwitchOff => write!(f, "cruise main switch off"),
            Self::CancelPressed => write!(f, "cancel button pressed"),
            Self::IntegrityFailure { id } => write!(f, "integrity failure on {id:#05x}"),
            Self::RxLagging { id } => write!(f, "{id:#05x} stopped arriving"),
            Self::RelayMalfunction => write!(f, "relay malfunction"),
        }
    }
}

/// Conditions owned by other components that veto engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inhibits {
    /// Relay fault latched.
    pub relay_malfunction: bool,
    /// Identifier with a sustained integrity failure.
    pub integrity_failure: Option<u32>,
    /// Identifier that stopped arriving.
    pub lagging: Option<u32>,
}

impl Inhibits {
    fn reason(&self) -> Option<DisengageReason> {
        if self.relay_malfunction {
            return Some(DisengageReason::RelayMalfunction);
        }
        if let Some(id) = self.integrity_failure {
            return Some(DisengageReason::IntegrityFailure { id });
        }
        self.lagging.map(|id| DisengageReason::RxLagging { id })
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State unchanged.
    None,
    /// `Disengaged -> Engaged`.
    Engaged,
    /// `Engaged -> Disengaged`.
    Disengaged(DisengageReason),
}

/// Engagement state machine.
///
/// ```text
///                 cruise rising edge
///                 && !brake && !gas && no inhibit
/// ┌────────────┐ ─────────────────────────────▶ ┌─────────┐
/// │ Disengaged │                                │ Engaged │
/// └────────────┘ ◀───────────────────────────── └─────────┘
///                 cruise falling edge | brake while moving
///                 | gas rising edge | main off | cancel
///                 | integrity | lag | relay
/// ```
#[derive(Debug, Clone)]
pub struct EngagementMachine {
    state: EngagementState,
    config: EngagementConfig,
    alternative: AlternativeExperience,
    tracks_main_switch: bool,
}

impl EngagementMachine {
    /// Machine starting disengaged.
    #[must_use]
    pub fn new(
        config: EngagementConfig,
        alternative: AlternativeExperience,
        tracks_main_switch: bool,
    ) -> Self {
        Self {
            state: EngagementState::Disengaged,
            config,
            alternative,
            tracks_main_switch,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EngagementState {
        self.state
    }

    /// True while engaged.
    #[must_use]
    pub fn controls_allowed(&self) -> bool {
        self.state == EngagementState::Engaged
    }

    /// Evaluate transitions against the latest vehicle state, then latch the
    /// `*_prev` fields for the next evaluation.
    pub fn evaluate(&mut self, vehicle: &mut VehicleState, inhibits: Inhibits) -> Transition {
        let disengage = inhibits.reason().or_else(|| self.vehicle_disengage_reason(vehicle));

        let transition = match self.state {
            EngagementState::Engaged => match disengage {
                Some(reason) => {
                    self.state = EngagementState::Disengaged;
                    Transition::Disengaged(reason)
                }
                None => Transition::None,
            },
            EngagementState::Disengaged => {
                let gas_blocks = vehicle.gas_pressed && !self.alternative.allow_engage_with_gas;
                let blocked = disengage.is_some() || vehicle.brake_pressed || gas_blocks;
                if self.engage_requested(vehicle) && !blocked {
                    self.state = EngagementState::Engaged;
                    Transition::Engaged
                } else {
                    Transition::None
                }
            }
        };

        vehicle.brake_pressed_prev = vehicle.brake_pressed;
        vehicle.gas_pressed_prev = vehicle.gas_pressed;
        vehicle.cruise_engaged_prev = vehicle.cruise_engaged;
        vehicle.set_pressed_prev = vehicle.set_pressed;
        vehicle.resume_pressed_prev = vehicle.resume_pressed;
        transition
    }

    fn vehicle_disengage_reason(&self, vehicle: &VehicleState) -> Option<DisengageReason> {
        let cruise_falling = !vehicle.cruise_engaged && vehicle.cruise_engaged_prev;
        let gas_rising = vehicle.gas_pressed && !vehicle.gas_pressed_prev;

        if self.config.source == EngageSource::CruiseState && cruise_falling {
            Some(DisengageReason::CruiseDisengaged)
        } else if vehicle.brake_pressed && !vehicle.standstill {
            Some(DisengageReason::BrakeWhileMoving)
        } else if gas_rising && !self.alternative.disable_disengage_on_gas {
            Some(DisengageReason::GasPressed)
        } else if self.tracks_main_switch && !vehicle.acc_main_on {
            Some(DisengageReason::MainSwitchOff)
        } else if vehicle.cancel_pressed {
            Some(DisengageReason::CancelPressed)
        } else {
            None
        }
    }

    fn engage_requested(&self, vehicle: &VehicleState) -> bool {
        match self.config.source {
            EngageSource::CruiseState => vehicle.cruise_engaged && !vehicle.cruise_engaged_prev,
            EngageSource::ButtonRelease => {
                let set_released = vehicle.set_pressed_prev && !vehicle.set_pressed;
                let resume_released = vehicle.resume_pressed_prev && !vehicle.resume_pressed;
                set_released || resume_released
            }
        }
    }

    /// Leave the engaged state unconditionally.
    pub fn force_disengage(&mut self, reason: DisengageReason) -> Transition {
        match self.state {
            EngagementState::Engaged => {
                self.state = EngagementState::Disengaged;
                Transition::Disengaged(reason)
            }
            EngagementState::Disengaged => Transition::None,
        }
    }

    /// Overwrite the state, for test back-doors.
    #[cfg(any(test, feature = "harness"))]
    pub(crate) fn force_state(&mut self, state: EngagementState) {
        self.state = state;
    }

    /// Back to disengaged.
    pub fn reset(&mut self) {
        self.state = EngagementState::Disengaged;
    }
}
