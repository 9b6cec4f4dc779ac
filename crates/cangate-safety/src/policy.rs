//! Outbound whitelist and bus-to-bus forwarding.

use crate::actuation::ActuationViolation;
use crate::config::{ForwardRoute, MAX_ROUTES, MAX_TX_RULES, TxRule, VehicleConfig};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an outbound frame was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "reason", rename_all = "snake_case"))]
pub enum RejectReason {
    /// Relay fault latched; nothing is transmitted.
    RelayMalfunction,
    /// `(id, bus)` is not on the whitelist.
    NotWhitelisted,
    /// Payload does not carry the checked value.
    Malformed,
    /// A pinned field holds the wrong value.
    PinnedSignal {
        /// Decoded value, `None` if the field was missing.
        found: Option<i32>,
    },
    /// Actuation check failed.
    Actuation(ActuationViolation),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelayMalfunction => write!(f, "relay malfunction"),
            Self::NotWhitelisted => write!(f, "not whitelisted"),
            Self::Malformed => write!(f, "malformed payload"),
            Self::PinnedSignal { found: Some(value) } => write!(f, "pinned signal holds {value}"),
            Self::PinnedSignal { found: None } => write!(f, "pinned signal missing"),
            Self::Actuation(violation) => write!(f, "{violation}"),
        }
    }
}

impl From<ActuationViolation> for RejectReason {
    fn from(violation: ActuationViolation) -> Self {
        Self::Actuation(violation)
    }
}

/// Outcome of an outbound check.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "verdict", rename_all = "snake_case"))]
pub enum TxVerdict {
    /// The frame may be transmitted.
    Accept,
    /// The frame must not be transmitted.
    Reject(RejectReason),
}

impl TxVerdict {
    /// True for [`TxVerdict::Accept`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Rejection reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accept => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

impl From<Result<(), RejectReason>> for TxVerdict {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Self::Accept,
            Err(reason) => Self::Reject(reason),
        }
    }
}

/// `(id, bus)` whitelist.
#[derive(Debug, Clone)]
pub struct TransmitPolicy {
    rules: heapless::Vec<TxRule, MAX_TX_RULES>,
}

impl TransmitPolicy {
    /// Whitelist from a configuration.
    #[must_use]
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            rules: config.tx_rules.clone(),
        }
    }

    /// Rule for `(id, bus)`.
    #[must_use]
    pub fn lookup(&self, id: u32, bus: u8) -> Option<&TxRule> {
        self.rules.iter().find(|rule| rule.id == id && rule.bus == bus)
    }

    /// All rules.
    #[must_use]
    pub fn rules(&self) -> &[TxRule] {
        &self.rules
    }
}

/// Bus-to-bus forwarding table.
#[derive(Debug, Clone)]
pub struct ForwardingPolicy {
    routes: heapless::Vec<ForwardRoute, MAX_ROUTES>,
}

impl ForwardingPolicy {
    /// Forwarding table from a configuration.
    #[must_use]
    pub fn new(config: &VehicleConfig) -> Self {
        Self {
            routes: config.forwarding.clone(),
        }
    }

    /// Destination bus for `id` received on `from_bus`, `None` if the bus
    /// has no route or the identifier is blacklisted on it.
    #[must_use]
    pub fn route(&self, from_bus: u8, id: u32) -> Option<u8> {
        let route = self.routes.iter().find(|route| route.from_bus == from_bus)?;
        if route.blacklist.contains(&id) {
            None
        } else {
            Some(route.to_bus)
        }
    }

    /// All routes.
    #[must_use]
    pub fn routes(&self) -> &[ForwardRoute] {
        &self.routes
    }
}
