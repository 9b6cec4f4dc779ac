//! Per-vehicle configuration.
//!
//! One gatekeeper algorithm serves every vehicle family; what differs is
//! data: identifiers, signal layouts, numeric limits, and the transmit and
//! forwarding tables. All tables are fixed-capacity so a loaded
//! configuration never allocates.

use crate::checksum::ChecksumAlgorithm;
use crate::signal::{BitField, LinearScale, SignalValue};
use crate::{SafetyError, SafetyResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Externally driven monotonic time. Presets use microseconds.
pub type Tick = u64;

/// Maximum tracked receive identifiers.
pub const MAX_RX_CHECKS: usize = 16;
/// Maximum transmit whitelist entries.
pub const MAX_TX_RULES: usize = 16;
/// Maximum forwarding routes.
pub const MAX_ROUTES: usize = 4;
/// Maximum blacklisted identifiers per route.
pub const MAX_BLACKLIST: usize = 8;
/// Maximum brake sources OR'd into `brake_pressed`.
pub const MAX_BRAKE_SOURCES: usize = 4;
/// Maximum wheel-speed fields.
pub const MAX_WHEELS: usize = 4;
/// Maximum enumerated cruise state values.
pub const MAX_CRUISE_VALUES: usize = 8;

/// Rolling counter location and modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterCheck {
    /// Counter field.
    pub field: BitField,
    /// Counter wraps to zero at this value.
    pub modulus: u8,
}

/// Checksum location and algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChecksumCheck {
    /// Payload byte holding the checksum.
    pub byte: u8,
    /// Algorithm used to recompute it.
    pub algorithm: ChecksumAlgorithm,
}

/// Integrity requirements for one received identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RxCheck {
    /// Arbitration identifier.
    pub id: u32,
    /// Bus the identifier is expected on.
    pub bus: u8,
    /// Rolling counter, if the message carries one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub counter: Option<CounterCheck>,
    /// Checksum, if verified.
    #[cfg_attr(feature = "serde", serde(default))]
    pub checksum: Option<ChecksumCheck>,
    /// Nominal period between frames, in ticks.
    #[cfg_attr(feature = "serde", serde(default))]
    pub expected_interval: Option<Tick>,
}

impl RxCheck {
    /// Check with no counter, checksum or timing requirement.
    #[must_use]
    pub const fn new(id: u32, bus: u8) -> Self {
        Self {
            id,
            bus,
            counter: None,
            checksum: None,
            expected_interval: None,
        }
    }

    /// Require a rolling counter.
    #[must_use]
    pub const fn with_counter(mut self, field: BitField, modulus: u8) -> Self {
        self.counter = Some(CounterCheck { field, modulus });
        self
    }

    /// Require a checksum.
    #[must_use]
    pub const fn with_checksum(mut self, byte: u8, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum = Some(ChecksumCheck { byte, algorithm });
        self
    }

    /// Require a reception period.
    #[must_use]
    pub const fn with_interval(mut self, interval: Tick) -> Self {
        self.expected_interval = Some(interval);
        self
    }

    fn validate(&self) -> SafetyResult<()> {
        if let Some(counter) = &self.counter {
            counter.field.validate()?;
            if counter.field.width > 8 {
                return Err(SafetyError::invalid_config(
                    "rx_checks.counter.field",
                    "counter field wider than 8 bits",
                ));
            }
            if counter.modulus < 2 {
                return Err(SafetyError::invalid_config(
                    "rx_checks.counter.modulus",
                    "modulus must be at least 2",
                ));
            }
            if u32::from(counter.field.width) < 8
                && u32::from(counter.modulus) > (1u32 << counter.field.width)
            {
                return Err(SafetyError::invalid_config(
                    "rx_checks.counter.modulus",
                    "modulus does not fit the counter field",
                ));
            }
        }
        if let Some(checksum) = &self.checksum {
            checksum.algorithm.validate()?;
            if usize::from(checksum.byte) >= crate::frame::MAX_PAYLOAD_LEN {
                return Err(SafetyError::invalid_config(
                    "rx_checks.checksum.byte",
                    "checksum byte outside a 64-byte payload",
                ));
            }
        }
        if self.expected_interval == Some(0) {
            return Err(SafetyError::invalid_config(
                "rx_checks.expected_interval",
                "interval must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Vehicle speed from averaged wheel speeds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedSignal {
    /// Identifier carrying the wheel speeds.
    pub id: u32,
    /// One field per wheel.
    pub wheels: heapless::Vec<BitField, MAX_WHEELS>,
    /// Scale from raw wheel speed to vehicle speed units.
    #[cfg_attr(feature = "serde", serde(default))]
    pub scale: LinearScale,
}

/// A boolean signal: set when the field is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlagSignal {
    /// Identifier carrying the flag.
    pub id: u32,
    /// Flag field.
    pub field: BitField,
}

/// Accelerator pedal position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GasSignal {
    /// Identifier carrying the pedal position.
    pub id: u32,
    /// Pedal field.
    pub field: BitField,
    /// Pressed when the raw value is strictly above this.
    #[cfg_attr(feature = "serde", serde(default))]
    pub threshold: i32,
}

/// Stock cruise control state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CruiseSignal {
    /// Identifier carrying the cruise state.
    pub id: u32,
    /// State field.
    pub field: BitField,
    /// Values meaning "cruise engaged".
    pub engaged_values: heapless::Vec<i32, MAX_CRUISE_VALUES>,
    /// Values meaning "main switch on". Empty when the vehicle does not
    /// report the main switch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub main_on_values: heapless::Vec<i32, MAX_CRUISE_VALUES>,
}

impl CruiseSignal {
    /// True if this vehicle reports the main switch.
    #[must_use]
    pub fn tracks_main_switch(&self) -> bool {
        !self.main_on_values.is_empty()
    }
}

/// Driver-applied steering torque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TorqueSignal {
    /// Identifier carrying the torque.
    pub id: u32,
    /// Signed torque field.
    pub field: BitField,
}

/// Cruise control stalk buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ButtonSignals {
    /// Identifier carrying the buttons.
    pub id: u32,
    /// Cancel button.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cancel: Option<BitField>,
    /// Set button.
    #[cfg_attr(feature = "serde", serde(default))]
    pub set: Option<BitField>,
    /// Resume button.
    #[cfg_attr(feature = "serde", serde(default))]
    pub resume: Option<BitField>,
}

/// Where each tracked signal lives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleSignals {
    /// Bus the vehicle state is read from.
    #[cfg_attr(feature = "serde", serde(default))]
    pub state_bus: u8,
    /// Wheel speeds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed: Option<SpeedSignal>,
    /// Brake sources, OR'd together.
    #[cfg_attr(feature = "serde", serde(default))]
    pub brake: heapless::Vec<FlagSignal, MAX_BRAKE_SOURCES>,
    /// Accelerator pedal.
    #[cfg_attr(feature = "serde", serde(default))]
    pub gas: Option<GasSignal>,
    /// Cruise state.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cruise: Option<CruiseSignal>,
    /// Driver steering torque.
    #[cfg_attr(feature = "serde", serde(default))]
    pub driver_torque: Option<TorqueSignal>,
    /// Cruise buttons.
    #[cfg_attr(feature = "serde", serde(default))]
    pub buttons: Option<ButtonSignals>,
}

impl VehicleSignals {
    /// No tracked signals.
    #[must_use]
    pub const fn none(state_bus: u8) -> Self {
        Self {
            state_bus,
            speed: None,
            brake: heapless::Vec::new(),
            gas: None,
            cruise: None,
            driver_torque: None,
            buttons: None,
        }
    }

    fn validate(&self) -> SafetyResult<()> {
        if let Some(speed) = &self.speed {
            if speed.wheels.is_empty() {
                return Err(SafetyError::invalid_config(
                    "signals.speed.wheels",
                    "at least one wheel speed field is required",
                ));
            }
            if !speed.scale.factor.is_finite() || !speed.scale.offset.is_finite() {
                return Err(SafetyError::invalid_config(
                    "signals.speed.scale",
                    "scale must be finite",
                ));
            }
            for wheel in &speed.wheels {
                wheel.validate()?;
            }
        }
        for source in &self.brake {
            source.field.validate()?;
        }
        if let Some(gas) = &self.gas {
            gas.field.validate()?;
        }
        if let Some(cruise) = &self.cruise {
            cruise.field.validate()?;
            if cruise.engaged_values.is_empty() {
                return Err(SafetyError::invalid_config(
                    "signals.cruise.engaged_values",
                    "at least one engaged value is required",
                ));
            }
        }
        if let Some(torque) = &self.driver_torque {
            torque.field.validate()?;
        }
        if let Some(buttons) = &self.buttons {
            for field in [buttons.cancel, buttons.set, buttons.resume]
                .into_iter()
                .flatten()
            {
                field.validate()?;
            }
        }
        Ok(())
    }
}

/// Torque command limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SteeringLimits {
    /// Largest commanded magnitude.
    pub max_value: i32,
    /// Largest per-frame increase in magnitude.
    pub max_rate_up: i32,
    /// Largest per-frame change when crossing zero.
    pub max_rate_down: i32,
    /// Largest drift away from the real-time anchor.
    pub max_rt_delta: i32,
    /// Ticks between real-time anchor refreshes.
    pub rt_interval: Tick,
    /// Opposing driver torque tolerated before limiting.
    pub driver_torque_allowance: i32,
    /// Command reduction per unit of driver torque above the allowance.
    pub driver_torque_factor: i32,
    /// Samples per driver torque window.
    #[cfg_attr(feature = "serde", serde(default = "default_window_len"))]
    pub driver_window_len: u8,
}

#[cfg(feature = "serde")]
const fn default_window_len() -> u8 {
    6
}

impl SteeringLimits {
    /// Limits shared by the Volkswagen MQB and MLB platforms.
    ///
    /// Units are 0.01 Nm; the real-time interval is in microseconds.
    #[must_use]
    pub const fn volkswagen_mxb() -> Self {
        Self {
            max_value: 300,
            max_rate_up: 4,
            max_rate_down: 10,
            max_rt_delta: 75,
            rt_interval: 250_000,
            driver_torque_allowance: 80,
            driver_torque_factor: 3,
            driver_window_len: 6,
        }
    }

    /// Validate limits.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] for non-positive limits or an
    /// empty driver window.
    pub fn validate(&self) -> SafetyResult<()> {
        let positive = [
            ("steering.max_value", self.max_value),
            ("steering.max_rate_up", self.max_rate_up),
            ("steering.max_rate_down", self.max_rate_down),
            ("steering.max_rt_delta", self.max_rt_delta),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(SafetyError::invalid_config(field, "must be greater than 0"));
            }
        }
        if self.rt_interval == 0 {
            return Err(SafetyError::invalid_config(
                "steering.rt_interval",
                "must be greater than 0",
            ));
        }
        if self.driver_torque_allowance < 0 || self.driver_torque_factor < 0 {
            return Err(SafetyError::invalid_config(
                "steering.driver_torque",
                "allowance and factor cannot be negative",
            ));
        }
        if self.driver_window_len == 0 {
            return Err(SafetyError::invalid_config(
                "steering.driver_window_len",
                "window must hold at least one sample",
            ));
        }
        Ok(())
    }
}

impl SteeringLimits {
    /// Limits for the Stellantis DASM platform.
    #[must_use]
    pub const fn stellantis() -> Self {
        Self {
            max_value: 261,
            max_rate_up: 10,
            max_rate_down: 50,
            max_rt_delta: 112,
            rt_interval: 250_000,
            driver_torque_allowance: 80,
            driver_torque_factor: 3,
            driver_window_len: 6,
        }
    }
}

impl Default for SteeringLimits {
    fn default() -> Self {
        Self::volkswagen_mxb()
    }
}

/// Acceleration command envelope, in m/s² × 1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LongitudinalLimits {
    /// Largest commanded acceleration.
    pub max_accel: i32,
    /// Strongest commanded deceleration.
    pub min_accel: i32,
    /// Value sent while longitudinal control is inactive.
    pub inactive_accel: i32,
}

impl LongitudinalLimits {
    /// Limits shared by the Volkswagen MQB and MLB platforms.
    #[must_use]
    pub const fn volkswagen_mxb() -> Self {
        Self {
            max_accel: 2000,
            min_accel: -3500,
            inactive_accel: 3010,
        }
    }

    /// Validate the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] if `min_accel > max_accel`.
    pub fn validate(&self) -> SafetyResult<()> {
        if self.min_accel > self.max_accel {
            return Err(SafetyError::invalid_config(
                "longitudinal.min_accel",
                "min_accel must not exceed max_accel",
            ));
        }
        Ok(())
    }
}

/// What causes `Disengaged -> Engaged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EngageSource {
    /// Rising edge of the stock cruise engaged state.
    #[default]
    CruiseState,
    /// Release of the set or resume button with the main switch on.
    ButtonRelease,
}

/// Engagement and integrity parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngagementConfig {
    /// Speeds at or below this count as standstill.
    pub standstill_threshold: f32,
    /// Consecutive invalid frames on one identifier that force disengagement.
    pub max_consecutive_invalid: u8,
    /// A tracked identifier lags once silent for `interval * lag_factor`.
    pub lag_factor: u32,
    /// Engagement trigger.
    pub source: EngageSource,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            standstill_threshold: 0.0,
            max_consecutive_invalid: 5,
            lag_factor: 10,
            source: EngageSource::CruiseState,
        }
    }
}

impl EngagementConfig {
    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] for a negative or non-finite
    /// threshold or a zero count.
    pub fn validate(&self) -> SafetyResult<()> {
        if !self.standstill_threshold.is_finite() || self.standstill_threshold < 0.0 {
            return Err(SafetyError::invalid_config(
                "engagement.standstill_threshold",
                "threshold must be finite and non-negative",
            ));
        }
        if self.max_consecutive_invalid == 0 {
            return Err(SafetyError::invalid_config(
                "engagement.max_consecutive_invalid",
                "must be greater than 0",
            ));
        }
        if self.lag_factor == 0 {
            return Err(SafetyError::invalid_config(
                "engagement.lag_factor",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Opt-in relaxations of the default engagement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlternativeExperience {
    /// Pressing the gas does not disengage.
    pub disable_disengage_on_gas: bool,
    /// Engagement is allowed with the gas pressed.
    pub allow_engage_with_gas: bool,
}

/// Which actuation check applies to a whitelisted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum TxKind {
    /// No payload check.
    Passthrough,
    /// Steering torque, rate limited.
    SteeringTorque,
    /// Acceleration request, envelope checked.
    Acceleration,
    /// Cruise buttons; bits in `engage_mask` are refused while disengaged.
    CruiseButtons {
        /// Set and resume bits of the decoded value.
        engage_mask: u32,
    },
}

/// A field that must carry a fixed value for the frame to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinnedSignal {
    /// Field and scale.
    pub value: SignalValue,
    /// Required decoded value.
    pub expected: i32,
}

/// One entry of the outbound whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TxRule {
    /// Arbitration identifier.
    pub id: u32,
    /// Destination bus.
    pub bus: u8,
    /// Actuation check.
    pub kind: TxKind,
    /// Where the checked value sits in the payload.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<SignalValue>,
    /// Field that must hold a fixed value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pinned: Option<PinnedSignal>,
}

impl TxRule {
    /// Whitelist entry with no payload check.
    #[must_use]
    pub const fn passthrough(id: u32, bus: u8) -> Self {
        Self {
            id,
            bus,
            kind: TxKind::Passthrough,
            value: None,
            pinned: None,
        }
    }

    /// Whitelist entry with an actuation check on `value`.
    #[must_use]
    pub const fn checked(id: u32, bus: u8, kind: TxKind, value: SignalValue) -> Self {
        Self {
            id,
            bus,
            kind,
            value: Some(value),
            pinned: None,
        }
    }

    /// Require a pinned field.
    #[must_use]
    pub const fn with_pinned(mut self, value: SignalValue, expected: i32) -> Self {
        self.pinned = Some(PinnedSignal { value, expected });
        self
    }
}

/// Default route from one bus to another.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForwardRoute {
    /// Receiving bus.
    pub from_bus: u8,
    /// Destination bus.
    pub to_bus: u8,
    /// Identifiers never forwarded on this route.
    #[cfg_attr(feature = "serde", serde(default))]
    pub blacklist: heapless::Vec<u32, MAX_BLACKLIST>,
}

impl ForwardRoute {
    /// Route with an empty blacklist.
    #[must_use]
    pub const fn new(from_bus: u8, to_bus: u8) -> Self {
        Self {
            from_bus,
            to_bus,
            blacklist: heapless::Vec::new(),
        }
    }

    /// Route that drops the listed identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::CapacityExceeded`] if more than
    /// [`MAX_BLACKLIST`] identifiers are given.
    pub fn blocking(from_bus: u8, to_bus: u8, ids: &[u32]) -> SafetyResult<Self> {
        let blacklist = heapless::Vec::from_slice(ids)
            .map_err(|()| SafetyError::capacity_exceeded("forwarding.blacklist", MAX_BLACKLIST))?;
        Ok(Self {
            from_bus,
            to_bus,
            blacklist,
        })
    }
}

/// Relay malfunction watch on a self-transmitted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayCheck {
    /// Watched identifier.
    pub id: u32,
    /// Bus the gateway transmits it on.
    pub tx_bus: u8,
    /// Bus its echo is expected on.
    pub echo_bus: u8,
    /// Bus on which seeing it means the relay is stuck.
    #[cfg_attr(feature = "serde", serde(default))]
    pub fault_bus: Option<u8>,
    /// Longest wait for the echo, in ticks.
    pub timeout: Tick,
}

/// Complete configuration for one vehicle family.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleConfig {
    /// Human-readable name.
    pub name: heapless::String<32>,
    /// Integrity checks on received identifiers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rx_checks: heapless::Vec<RxCheck, MAX_RX_CHECKS>,
    /// Vehicle state signals.
    pub signals: VehicleSignals,
    /// Steering torque limits.
    #[cfg_attr(feature = "serde", serde(default))]
    pub steering: Option<SteeringLimits>,
    /// Acceleration limits.
    #[cfg_attr(feature = "serde", serde(default))]
    pub longitudinal: Option<LongitudinalLimits>,
    /// Engagement parameters.
    #[cfg_attr(feature = "serde", serde(default))]
    pub engagement: EngagementConfig,
    /// Engagement relaxations.
    #[cfg_attr(feature = "serde", serde(default))]
    pub alternative_experience: AlternativeExperience,
    /// Outbound whitelist.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tx_rules: heapless::Vec<TxRule, MAX_TX_RULES>,
    /// Forwarding routes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub forwarding: heapless::Vec<ForwardRoute, MAX_ROUTES>,
    /// Relay malfunction watch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub relay: Option<RelayCheck>,
}

impl VehicleConfig {
    /// Empty configuration: nothing tracked, nothing transmitted, nothing
    /// forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] if `name` is longer than 32
    /// bytes.
    pub fn new(name: &str) -> SafetyResult<Self> {
        let name = heapless::String::try_from(name)
            .map_err(|()| SafetyError::invalid_config("name", "name longer than 32 bytes"))?;
        Ok(Self {
            name,
            rx_checks: heapless::Vec::new(),
            signals: VehicleSignals::none(0),
            steering: None,
            longitudinal: None,
            engagement: EngagementConfig::default(),
            alternative_experience: AlternativeExperience::default(),
            tx_rules: heapless::Vec::new(),
            forwarding: heapless::Vec::new(),
            relay: None,
        })
    }

    /// Add an integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::CapacityExceeded`] when the table is full.
    pub fn add_rx_check(&mut self, check: RxCheck) -> SafetyResult<()> {
        self.rx_checks
            .push(check)
            .map_err(|_rejected| SafetyError::capacity_exceeded("rx_checks", MAX_RX_CHECKS))
    }

    /// Add a whitelist entry.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::CapacityExceeded`] when the table is full.
    pub fn allow_tx(&mut self, rule: TxRule) -> SafetyResult<()> {
        self.tx_rules
            .push(rule)
            .map_err(|_rejected| SafetyError::capacity_exceeded("tx_rules", MAX_TX_RULES))
    }

    /// Add a forwarding route.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::CapacityExceeded`] when the table is full.
    pub fn add_route(&mut self, route: ForwardRoute) -> SafetyResult<()> {
        self.forwarding
            .push(route)
            .map_err(|_rejected| SafetyError::capacity_exceeded("forwarding", MAX_ROUTES))
    }

    /// Add a brake source.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::CapacityExceeded`] when all sources are used.
    pub fn add_brake_source(&mut self, source: FlagSignal) -> SafetyResult<()> {
        self.signals
            .brake
            .push(source)
            .map_err(|_rejected| SafetyError::capacity_exceeded("signals.brake", MAX_BRAKE_SOURCES))
    }

    /// Whitelist entry for `(id, bus)`.
    #[must_use]
    pub fn tx_rule(&self, id: u32, bus: u8) -> Option<&TxRule> {
        self.tx_rules.iter().find(|r| r.id == id && r.bus == bus)
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`SafetyError::InvalidConfig`] found.
    pub fn validate(&self) -> SafetyResult<()> {
        for (index, check) in self.rx_checks.iter().enumerate() {
            check.validate()?;
            let duplicate = self
                .rx_checks
                .iter()
                .skip(index + 1)
                .any(|other| other.id == check.id && other.bus == check.bus);
            if duplicate {
                return Err(SafetyError::invalid_config(
                    "rx_checks",
                    "duplicate (id, bus) entry",
                ));
            }
        }

        self.signals.validate()?;
        if let Some(steering) = &self.steering {
            steering.validate()?;
        }
        if let Some(longitudinal) = &self.longitudinal {
            longitudinal.validate()?;
        }
        self.engagement.validate()?;

        if self.engagement.source == EngageSource::ButtonRelease {
            let has_buttons = self
                .signals
                .buttons
                .is_some_and(|b| b.set.is_some() || b.resume.is_some());
            if !has_buttons {
                return Err(SafetyError::invalid_config(
                    "engagement.source",
                    "button engagement needs a set or resume button signal",
                ));
            }
        }

        for (index, rule) in self.tx_rules.iter().enumerate() {
            self.validate_tx_rule(rule)?;
            let duplicate = self
                .tx_rules
                .iter()
                .skip(index + 1)
                .any(|other| other.id == rule.id && other.bus == rule.bus);
            if duplicate {
                return Err(SafetyError::invalid_config(
                    "tx_rules",
                    "duplicate (id, bus) entry",
                ));
            }
        }

        for (index, route) in self.forwarding.iter().enumerate() {
            if route.from_bus == route.to_bus {
                return Err(SafetyError::invalid_config(
                    "forwarding",
                    "route must not forward a bus onto itself",
                ));
            }
            let duplicate = self
                .forwarding
                .iter()
                .skip(index + 1)
                .any(|other| other.from_bus == route.from_bus);
            if duplicate {
                return Err(SafetyError::invalid_config(
                    "forwarding",
                    "more than one route from the same bus",
                ));
            }
        }

        if let Some(relay) = &self.relay {
            if relay.timeout == 0 {
                return Err(SafetyError::invalid_config(
                    "relay.timeout",
                    "must be greater than 0",
                ));
            }
            if relay.echo_bus == relay.tx_bus || relay.fault_bus == Some(relay.echo_bus) {
                return Err(SafetyError::invalid_config(
                    "relay.echo_bus",
                    "echo bus must differ from the transmit and fault buses",
                ));
            }
            if self.tx_rule(relay.id, relay.tx_bus).is_none() {
                return Err(SafetyError::invalid_config(
                    "relay.id",
                    "watched identifier is not whitelisted on the transmit bus",
                ));
            }
        }
        Ok(())
    }

    fn validate_tx_rule(&self, rule: &TxRule) -> SafetyResult<()> {
        if let Some(value) = &rule.value {
            value.validate()?;
        }
        if let Some(pinned) = &rule.pinned {
            pinned.value.validate()?;
        }
        let needs_value = !matches!(rule.kind, TxKind::Passthrough);
        if needs_value && rule.value.is_none() {
            return Err(SafetyError::invalid_config(
                "tx_rules.value",
                "checked rules need a value field",
            ));
        }
        match rule.kind {
            TxKind::SteeringTorque if self.steering.is_none() => Err(SafetyError::invalid_config(
                "tx_rules.kind",
                "steering rule without steering limits",
            )),
            TxKind::Acceleration if self.longitudinal.is_none() => {
                Err(SafetyError::invalid_config(
                    "tx_rules.kind",
                    "acceleration rule without longitudinal limits",
                ))
            }
            _ => Ok(()),
        }
    }
}
