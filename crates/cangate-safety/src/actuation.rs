//! Rate-limited actuation checks.
//!
//! Steering torque goes through [`TorqueMonitor`], which keeps the last
//! accepted command and a real-time anchor. Acceleration and cruise-button
//! commands are stateless envelope checks.

use crate::config::{LongitudinalLimits, SteeringLimits, Tick};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// First actuation rule a candidate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "rule", rename_all = "snake_case"))]
pub enum ActuationViolation {
    /// Disengaged and the value is neither neutral nor strictly closer to it.
    NotAllowed,
    /// `|v|` above the configured maximum.
    MagnitudeExceeded,
    /// `|v|` above the maximum reduced by opposing driver torque.
    DriverOverride {
        /// Effective magnitude limit at the time of the check.
        limit: i32,
    },
    /// Step away from zero larger than the up rate.
    RateUpExceeded,
    /// Zero crossing larger than the down rate, or landing beyond the up rate.
    SignFlipExceeded,
    /// Value outside the drift envelope around the real-time anchor.
    RealtimeDriftExceeded,
    /// Acceleration request while longitudinal control is not allowed.
    LongitudinalNotAllowed,
    /// Acceleration outside `[min_accel, max_accel]`.
    AccelOutOfRange,
    /// Engage button pressed on behalf of the driver while disengaged.
    ForceCancel,
}

impl fmt::Display for ActuationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed => write!(f, "controls not allowed"),
            Self::MagnitudeExceeded => write!(f, "magnitude above maximum"),
            Self::DriverOverride { limit } => write!(f, "driver override, limit {limit}"),
            Self::RateUpExceeded => write!(f, "rate up exceeded"),
            Self::SignFlipExceeded => write!(f, "sign flip exceeded"),
            Self::RealtimeDriftExceeded => write!(f, "real-time drift exceeded"),
            Self::LongitudinalNotAllowed => write!(f, "longitudinal control not allowed"),
            Self::AccelOutOfRange => write!(f, "acceleration out of range"),
            Self::ForceCancel => write!(f, "engage button while disengaged"),
        }
    }
}

/// Last accepted steering command and the real-time anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActuationState {
    /// Last accepted value.
    pub desired_value_last: i32,
    /// Anchor of the drift envelope.
    pub realtime_value_last: i32,
    /// Tick at which the anchor was last refreshed.
    pub realtime_timer: Tick,
}

/// Inputs to a torque check that the monitor does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TorqueContext {
    /// Engagement flag.
    pub controls_allowed: bool,
    /// Smallest driver torque in the current window.
    pub driver_torque_min: i32,
    /// Largest driver torque in the current window.
    pub driver_torque_max: i32,
}

/// Steering torque state machine.
#[derive(Debug, Clone)]
pub struct TorqueMonitor {
    limits: SteeringLimits,
    state: ActuationState,
}

impl TorqueMonitor {
    /// Monitor starting from neutral.
    #[must_use]
    pub fn new(limits: SteeringLimits) -> Self {
        Self {
            limits,
            state: ActuationState::default(),
        }
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> &SteeringLimits {
        &self.limits
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ActuationState {
        &self.state
    }

    /// Mutable state, for test back-doors.
    #[cfg(any(test, feature = "harness"))]
    pub(crate) fn state_mut(&mut self) -> &mut ActuationState {
        &mut self.state
    }

    /// Check a candidate without committing it.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn check(&self, value: i32, ctx: TorqueContext) -> Result<(), ActuationViolation> {
        let v = i64::from(value);
        let last = i64::from(self.state.desired_value_last);
        let rt_last = i64::from(self.state.realtime_value_last);
        let limits = &self.limits;

        if !ctx.controls_allowed {
            let relaxing = v.signum() == last.signum() && v.abs() < last.abs();
            if v != 0 && !relaxing {
                return Err(ActuationViolation::NotAllowed);
            }
        }

        let max = i64::from(limits.max_value);
        if v.abs() > max {
            return Err(ActuationViolation::MagnitudeExceeded);
        }

        let opposing = if v > 0 && ctx.driver_torque_max < 0 {
            -i64::from(ctx.driver_torque_max)
        } else if v < 0 && ctx.driver_torque_min > 0 {
            i64::from(ctx.driver_torque_min)
        } else {
            0
        };
        let allowance = i64::from(limits.driver_torque_allowance);
        if opposing > allowance {
            let reduction = (opposing - allowance) * i64::from(limits.driver_torque_factor);
            let limit = (max - reduction).max(0);
            if v.abs() > limit {
                return Err(ActuationViolation::DriverOverride {
                    limit: i32::try_from(limit).unwrap_or(0),
                });
            }
        }

        let crossing = v.signum() * last.signum() < 0;
        if crossing {
            if (v - last).abs() > i64::from(limits.max_rate_down) || v.abs() > i64::from(limits.max_rate_up) {
                return Err(ActuationViolation::SignFlipExceeded);
            }
        } else if v.abs() > last.abs() && v.abs() - last.abs() > i64::from(limits.max_rate_up) {
            return Err(ActuationViolation::RateUpExceeded);
        }

        let delta = i64::from(limits.max_rt_delta);
        let low = rt_last.min(0) - delta;
        let high = rt_last.max(0) + delta;
        if v < low || v > high {
            return Err(ActuationViolation::RealtimeDriftExceeded);
        }

        Ok(())
    }

    /// Record an accepted value.
    pub fn commit(&mut self, value: i32, now: Tick) {
        self.state.desired_value_last = value;
        if now.saturating_sub(self.state.realtime_timer) > self.limits.rt_interval {
            self.state.realtime_value_last = value;
            self.state.realtime_timer = now;
        }
    }

    /// Check and, if accepted, commit.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule; the state is left untouched.
    pub fn evaluate(&mut self, value: i32, ctx: TorqueContext, now: Tick) -> Result<(), ActuationViolation> {
        self.check(value, ctx)?;
        self.commit(value, now);
        Ok(())
    }

    /// Back to neutral.
    pub fn reset(&mut self) {
        self.state = ActuationState::default();
    }

    /// Back to neutral with the real-time anchor starting at `now`.
    pub fn rearm(&mut self, now: Tick) {
        self.state = ActuationState {
            realtime_timer: now,
            ..ActuationState::default()
        };
    }
}

/// Acceleration envelope check.
///
/// # Errors
///
/// The inactive value always passes. Anything else needs longitudinal
/// control and a value inside the configured range.
pub fn check_acceleration(
    limits: &LongitudinalLimits,
    value: i32,
    longitudinal_allowed: bool,
) -> Result<(), ActuationViolation> {
    if value == limits.inactive_accel {
        return Ok(());
    }
    if !longitudinal_allowed {
        return Err(ActuationViolation::LongitudinalNotAllowed);
    }
    if value < limits.min_accel || value > limits.max_accel {
        return Err(ActuationViolation::AccelOutOfRange);
    }
    Ok(())
}

/// Cruise button check: set/resume bits are refused while disengaged.
///
/// # Errors
///
/// Returns [`ActuationViolation::ForceCancel`] when an engage bit is set
/// without controls allowed.
pub fn check_buttons(value: i32, engage_mask: u32, controls_allowed: bool) -> Result<(), ActuationViolation> {
    if !controls_allowed && value.cast_unsigned() & engage_mask != 0 {
        return Err(ActuationViolation::ForceCancel);
    }
    Ok(())
}
