//! Test back-doors.
//!
//! These setters write engine state directly and bypass every check. They
//! exist so that tests can start from a precise state (engaged, a given
//! last torque, a given driver torque envelope) without replaying the frame
//! sequence that would produce it. Compiled only for tests or with the
//! `harness` feature; production code must not enable it.

use crate::config::Tick;
use crate::engagement::EngagementState;
use crate::engine::SafetyEngine;
use crate::vehicle_state::VehicleState;

impl SafetyEngine {
    /// Force the engagement state.
    pub fn set_controls_allowed(&mut self, allowed: bool) {
        let (engagement, ..) = self.parts_mut();
        engagement.force_state(if allowed {
            EngagementState::Engaged
        } else {
            EngagementState::Disengaged
        });
    }

    /// Overwrite the last accepted steering value.
    pub fn set_desired_value_last(&mut self, value: i32) {
        if let (_, _, Some(torque), _) = self.parts_mut() {
            torque.state_mut().desired_value_last = value;
        }
    }

    /// Overwrite the real-time anchor value.
    pub fn set_realtime_value_last(&mut self, value: i32) {
        if let (_, _, Some(torque), _) = self.parts_mut() {
            torque.state_mut().realtime_value_last = value;
        }
    }

    /// Overwrite the real-time anchor tick.
    pub fn set_realtime_timer(&mut self, timer: Tick) {
        if let (_, _, Some(torque), _) = self.parts_mut() {
            torque.state_mut().realtime_timer = timer;
        }
    }

    /// Overwrite the driver torque envelope.
    pub fn set_driver_torque(&mut self, min: i32, max: i32) {
        let (_, tracker, ..) = self.parts_mut();
        tracker.state_mut().driver_torque.force(min, max);
    }

    /// Direct access to the vehicle state.
    pub fn vehicle_state_mut(&mut self) -> &mut VehicleState {
        let (_, tracker, ..) = self.parts_mut();
        tracker.state_mut()
    }

    /// Overwrite the expected counter of a tracked identifier. Returns false
    /// if `(id, bus)` is not tracked.
    pub fn set_expected_counter(&mut self, id: u32, bus: u8, counter: u8) -> bool {
        let (.., integrity) = self.parts_mut();
        match integrity.state_mut(id, bus) {
            Some(state) => {
                state.expected_counter = counter;
                true
            }
            None => false,
        }
    }
}
