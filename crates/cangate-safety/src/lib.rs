//! Real-time CAN safety gatekeeper.
//!
//! `cangate-safety` sits between an automated-driving controller and the
//! vehicle networks. It classifies every received frame, decides whether
//! each outbound actuation frame may be transmitted, and decides whether
//! each received frame may be forwarded to another bus.
//!
//! # Architecture
//!
//! - **Frame model**: [`CanFrame`], [`BitField`], [`SignalValue`]
//! - **Integrity**: [`IntegrityValidator`] checks rolling counters,
//!   checksums ([`ChecksumAlgorithm`]) and reception timeouts
//! - **Vehicle state**: [`VehicleStateTracker`] folds trusted frames into a
//!   [`VehicleState`] snapshot
//! - **Engagement**: [`EngagementMachine`] owns `controls_allowed`
//! - **Actuation**: [`TorqueMonitor`] rate-limits steering torque;
//!   [`check_acceleration`] and [`check_buttons`] guard the rest
//! - **Policy**: [`TransmitPolicy`] whitelist and [`ForwardingPolicy`] routes
//! - **Relay**: [`RelayDetector`] latches relay malfunctions
//!
//! [`SafetyEngine`] owns one of each and is the only entry point. Vehicle
//! families differ only in their [`VehicleConfig`]; see [`Preset`].
//!
//! # RT-Safety
//!
//! Every engine operation is RT-safe:
//! - No heap allocations; all tables are fixed-capacity
//! - No blocking operations
//! - Bounded execution time
//! - Time is an input ([`SafetyEngine::tick`]), never read from a clock
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  cruise rising edge, pedals released,  ┌─────────┐
//! │ Disengaged │  no relay/integrity/lag fault          │ Engaged │
//! │            │ ─────────────────────────────────────▶ │         │
//! │            │ ◀───────────────────────────────────── │         │
//! └────────────┘  cruise off, brake while moving, gas,  └─────────┘
//!                 main off, cancel, integrity, lag, relay
//! ```
//!
//! # Example
//!
//! ```rust
//! use cangate_safety::{CanFrame, SafetyEngine, SafetyResult, VehicleConfig};
//! use cangate_safety::presets::volkswagen::HCA_01;
//!
//! fn main() -> SafetyResult<()> {
//!     let mut engine = SafetyEngine::new(VehicleConfig::volkswagen_mqb()?)?;
//!
//!     // Untracked frames are ignored.
//!     let frame = CanFrame::classic(0, 0x7FF, [0; 8]);
//!     assert!(engine.process_received(&frame).is_trusted());
//!
//!     // Disengaged: only neutral torque may be sent.
//!     assert!(engine.evaluate_outbound(HCA_01, 0, 0).is_accepted());
//!     assert!(!engine.evaluate_outbound(HCA_01, 0, 4).is_accepted());
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod actuation;
mod checksum;
mod config;
mod engagement;
mod engine;
mod error;
mod frame;
#[cfg(any(test, feature = "harness"))]
mod harness;
mod integrity;
mod policy;
mod relay;
mod signal;
mod vehicle_state;

pub mod prelude;
pub mod presets;

pub use actuation::{
    ActuationState, ActuationViolation, TorqueContext, TorqueMonitor, check_acceleration,
    check_buttons,
};
pub use checksum::ChecksumAlgorithm;
pub use config::{
    AlternativeExperience, ButtonSignals, ChecksumCheck, CounterCheck, CruiseSignal,
    EngageSource, EngagementConfig, FlagSignal, ForwardRoute, GasSignal, LongitudinalLimits,
    MAX_BLACKLIST, MAX_BRAKE_SOURCES, MAX_CRUISE_VALUES, MAX_ROUTES, MAX_RX_CHECKS, MAX_TX_RULES,
    MAX_WHEELS, PinnedSignal, RelayCheck, RxCheck, SpeedSignal, SteeringLimits, Tick,
    TorqueSignal, TxKind, TxRule, VehicleConfig, VehicleSignals,
};
pub use engagement::{DisengageReason, EngagementMachine, EngagementState, Inhibits, Transition};
pub use engine::SafetyEngine;
pub use error::{SafetyError, SafetyResult};
pub use frame::{BusId, CanFrame, LOOPBACK_BUS_FLAG, MAX_PAYLOAD_LEN};
pub use integrity::{CounterState, IntegrityFault, IntegrityValidator, ValidityOutcome};
pub use policy::{ForwardingPolicy, RejectReason, TransmitPolicy, TxVerdict};
pub use presets::Preset;
pub use relay::{RelayDetector, RelayFault};
pub use signal::{BitField, Encoding, LinearScale, SignalValue};
pub use vehicle_state::{DriverTorqueWindow, SignalUpdate, VehicleState, VehicleStateTracker};

#[cfg(test)]
mod tests;
