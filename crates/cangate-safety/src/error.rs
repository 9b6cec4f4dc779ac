//! Error types for gatekeeper construction.
//!
//! Classification outcomes (invalid frames, rejected transmissions) are
//! values, not errors. [`SafetyError`] only covers problems detected while
//! building frames or loading a vehicle configuration.

use thiserror::Error;

/// Errors raised while building frames or validating configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SafetyError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// A fixed-capacity table cannot hold another entry.
    #[error("Capacity exceeded for {table} (max {capacity})")]
    CapacityExceeded {
        /// Table that overflowed.
        table: &'static str,
        /// Maximum number of entries.
        capacity: usize,
    },

    /// A payload longer than the largest supported frame.
    #[error("Frame payload of {len} bytes exceeds {max} bytes")]
    FrameTooLong {
        /// Length that was supplied.
        len: usize,
        /// Maximum supported payload length.
        max: usize,
    },
}

impl SafetyError {
    /// Create an invalid configuration error.
    #[must_use]
    pub const fn invalid_config(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidConfig { field, reason }
    }

    /// Create a capacity error.
    #[must_use]
    pub const fn capacity_exceeded(table: &'static str, capacity: usize) -> Self {
        Self::CapacityExceeded { table, capacity }
    }

    /// Returns true if this error originates from configuration validation.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::CapacityExceeded { .. }
        )
    }
}

/// Result type alias for gatekeeper construction.
pub type SafetyResult<T> = Result<T, SafetyError>;
