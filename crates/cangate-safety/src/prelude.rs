//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use cangate_safety::prelude::*;
//! ```

pub use crate::{
    ActuationState, ActuationViolation, BitField, CanFrame, ChecksumAlgorithm, DisengageReason,
    EngagementState, IntegrityFault, Preset, RejectReason, RelayFault, RxCheck, SafetyEngine,
    SafetyError, SafetyResult, SignalValue, SteeringLimits, Tick, TxKind, TxRule, TxVerdict,
    ValidityOutcome, VehicleConfig, VehicleState,
};
