//! Per-identifier counter, checksum and reception-timeout validation.

use crate::config::{RxCheck, Tick, VehicleConfig, MAX_RX_CHECKS};
use crate::frame::CanFrame;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a tracked frame was not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum IntegrityFault {
    /// Payload too short to carry the counter or checksum.
    Truncated,
    /// Recomputed checksum differs from the transmitted one.
    Checksum {
        /// Transmitted checksum.
        received: u8,
        /// Recomputed checksum.
        computed: u8,
    },
    /// Rolling counter out of sequence.
    Counter {
        /// Counter value that was due.
        expected: u8,
        /// Counter value carried by the frame.
        observed: u8,
    },
}

impl fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "payload too short"),
            Self::Checksum { received, computed } => {
                write!(f, "checksum {received:#04x}, expected {computed:#04x}")
            }
            Self::Counter { expected, observed } => {
                write!(f, "counter {observed}, expected {expected}")
            }
        }
    }
}

/// Classification of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", rename_all = "snake_case"))]
pub enum ValidityOutcome {
    /// Tracked identifier, counter and checksum correct.
    Valid,
    /// Tracked identifier that failed a check.
    Invalid(IntegrityFault),
    /// Identifier without integrity requirements.
    Untracked,
}

impl ValidityOutcome {
    /// True for [`ValidityOutcome::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// True unless the frame failed a check.
    #[must_use]
    pub const fn is_trusted(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Rolling state for one tracked identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CounterState {
    /// Counter value due on the next frame.
    pub expected_counter: u8,
    /// Invalid frames since the last valid one, saturating.
    pub consecutive_mismatches: u8,
    /// Tick of the last valid frame.
    pub last_seen: Option<Tick>,
}

/// Integrity checks for every tracked identifier.
#[derive(Debug, Clone)]
pub struct IntegrityValidator {
    checks: heapless::Vec<(RxCheck, CounterState), MAX_RX_CHECKS>,
    max_consecutive_invalid: u8,
    lag_factor: u32,
}

impl IntegrityValidator {
    /// Build the validator for a configuration.
    #[must_use]
    pub fn new(config: &VehicleConfig) -> Self {
        let checks = config
            .rx_checks
            .iter()
            .map(|check| (*check, CounterState::default()))
            .collect();
        Self {
            checks,
            max_consecutive_invalid: config.engagement.max_consecutive_invalid,
            lag_factor: config.engagement.lag_factor,
        }
    }

    /// Classify a received frame and update its rolling state.
    pub fn check(&mut self, frame: &CanFrame, now: Tick) -> ValidityOutcome {
        let max = self.max_consecutive_invalid;
        let Some((check, state)) = self
            .checks
            .iter_mut()
            .find(|(check, _)| check.id == frame.id() && check.bus == frame.bus())
        else {
            return ValidityOutcome::Untracked;
        };

        match verify(check, state, frame) {
            Ok(()) => {
                state.consecutive_mismatches = 0;
                state.last_seen = Some(now);
                ValidityOutcome::Valid
            }
            Err(fault) => {
                state.consecutive_mismatches = state.consecutive_mismatches.saturating_add(1).min(max);
                ValidityOutcome::Invalid(fault)
            }
        }
    }

    /// Identifier whose invalid streak reached the configured maximum.
    #[must_use]
    pub fn sustained_failure(&self) -> Option<u32> {
        self.checks
            .iter()
            .find(|(_, state)| state.consecutive_mismatches >= self.max_consecutive_invalid)
            .map(|(check, _)| check.id)
    }

    /// Identifier that has gone silent for longer than its lag limit.
    ///
    /// Identifiers that have never been seen are not reported.
    #[must_use]
    pub fn lagging(&self, now: Tick) -> Option<u32> {
        self.checks
            .iter()
            .find(|(check, state)| {
                match (check.expected_interval, state.last_seen) {
                    (Some(interval), Some(seen)) => {
                        now.saturating_sub(seen) > interval.saturating_mul(u64::from(self.lag_factor))
                    }
                    _ => false,
                }
            })
            .map(|(check, _)| check.id)
    }

    /// Rolling state of one identifier.
    #[must_use]
    pub fn state(&self, id: u32, bus: u8) -> Option<&CounterState> {
        self.checks
            .iter()
            .find(|(check, _)| check.id == id && check.bus == bus)
            .map(|(_, state)| state)
    }

    /// Mutable rolling state, for test back-doors.
    #[cfg(any(test, feature = "harness"))]
    pub(crate) fn state_mut(&mut self, id: u32, bus: u8) -> Option<&mut CounterState> {
        self.checks
            .iter_mut()
            .find(|(check, _)| check.id == id && check.bus == bus)
            .map(|(_, state)| state)
    }

    /// Forget all rolling state.
    pub fn reset(&mut self) {
        for (_, state) in &mut self.checks {
            *state = CounterState::default();
        }
    }
}

fn verify(check: &RxCheck, state: &mut CounterState, frame: &CanFrame) -> Result<(), IntegrityFault> {
    let data = frame.data();
    let counter = match &check.counter {
        Some(counter) => {
            let raw = counter.field.raw(data).ok_or(IntegrityFault::Truncated)?;
            Some((u8::try_from(raw).unwrap_or(u8::MAX), counter.modulus))
        }
        None => None,
    };

    if let Some(checksum) = &check.checksum {
        let index = usize::from(checksum.byte);
        let received = data.get(index).copied().ok_or(IntegrityFault::Truncated)?;
        let computed = checksum
            .algorithm
            .compute(frame.id(), data, index, counter.map(|(value, _)| value));
        if received != computed {
            return Err(IntegrityFault::Checksum { received, computed });
        }
    }

    if let Some((observed, modulus)) = counter {
        let expected = state.expected_counter;
        let next = (u16::from(observed) + 1)
            .checked_rem(u16::from(modulus))
            .and_then(|next| u8::try_from(next).ok())
            .unwrap_or(0);
        state.expected_counter = next;
        if observed != expected {
            return Err(IntegrityFault::Counter { expected, observed });
        }
    }
    Ok(())
}
