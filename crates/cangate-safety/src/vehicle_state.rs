//! Vehicle state snapshot built from trusted frames.

use crate::config::{VehicleSignals, MAX_BRAKE_SOURCES};
use crate::frame::CanFrame;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Min/max envelope of recent driver torque readings.
///
/// Samples are folded into a window of `len` readings. Within a window
/// `max` only grows and `min` only shrinks. When the window is full the next
/// sample opens a new one seeded with the latest reading, so the envelope
/// follows the driver with constant memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverTorqueWindow {
    min: i32,
    max: i32,
    last: i32,
    revision: u8,
    len: u8,
}

impl DriverTorqueWindow {
    /// Empty window of `len` samples.
    #[must_use]
    pub const fn new(len: u8) -> Self {
        Self {
            min: 0,
            max: 0,
            last: 0,
            revision: 0,
            len: if len == 0 { 1 } else { len },
        }
    }

    /// Fold in a new reading.
    pub fn push(&mut self, sample: i32) {
        if self.revision >= self.len {
            self.min = self.last;
            self.max = self.last;
            self.revision = 0;
        }
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.last = sample;
        self.revision = self.revision.saturating_add(1);
    }

    /// Smallest reading in the current window.
    #[must_use]
    pub const fn min(&self) -> i32 {
        self.min
    }

    /// Largest reading in the current window.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Most recent reading.
    #[must_use]
    pub const fn last(&self) -> i32 {
        self.last
    }

    /// Samples folded into the current window.
    #[must_use]
    pub const fn revision(&self) -> u8 {
        self.revision
    }

    /// Overwrite the envelope, for test back-doors.
    #[cfg(any(test, feature = "harness"))]
    pub(crate) fn force(&mut self, min: i32, max: i32) {
        self.min = min;
        self.max = max;
        self.last = max;
        self.revision = 0;
    }

    /// Back to an empty window.
    pub fn reset(&mut self) {
        *self = Self::new(self.len);
    }
}

impl Default for DriverTorqueWindow {
    fn default() -> Self {
        Self::new(6)
    }
}

/// Snapshot of the vehicle as seen on the state bus.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleState {
    /// Mean wheel speed, never negative.
    pub speed: f32,
    /// Speed at or below the standstill threshold.
    pub standstill: bool,
    /// Any brake source active.
    pub brake_pressed: bool,
    /// `brake_pressed` at the previous engagement evaluation.
    pub brake_pressed_prev: bool,
    /// Accelerator above its threshold.
    pub gas_pressed: bool,
    /// `gas_pressed` at the previous engagement evaluation.
    pub gas_pressed_prev: bool,
    /// Stock cruise engaged.
    pub cruise_engaged: bool,
    /// `cruise_engaged` at the previous engagement evaluation.
    pub cruise_engaged_prev: bool,
    /// Cruise main switch on.
    pub acc_main_on: bool,
    /// Cancel button held.
    pub cancel_pressed: bool,
    /// Set button held.
    pub set_pressed: bool,
    /// `set_pressed` at the previous engagement evaluation.
    pub set_pressed_prev: bool,
    /// Resume button held.
    pub resume_pressed: bool,
    /// `resume_pressed` at the previous engagement evaluation.
    pub resume_pressed_prev: bool,
    /// Driver torque envelope.
    pub driver_torque: DriverTorqueWindow,
}

impl VehicleState {
    /// Safe initial state for a window of `window_len` torque samples.
    #[must_use]
    pub const fn new(window_len: u8) -> Self {
        Self {
            speed: 0.0,
            standstill: true,
            brake_pressed: false,
            brake_pressed_prev: false,
            gas_pressed: false,
            gas_pressed_prev: false,
            cruise_engaged: false,
            cruise_engaged_prev: false,
            acc_main_on: false,
            cancel_pressed: false,
            set_pressed: false,
            set_pressed_prev: false,
            resume_pressed: false,
            resume_pressed_prev: false,
            driver_torque: DriverTorqueWindow::new(window_len),
        }
    }

    /// Smallest driver torque in the current window.
    #[must_use]
    pub const fn driver_torque_min(&self) -> i32 {
        self.driver_torque.min()
    }

    /// Largest driver torque in the current window.
    #[must_use]
    pub const fn driver_torque_max(&self) -> i32 {
        self.driver_torque.max()
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new(6)
    }
}

/// Which signals a frame carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalUpdate {
    /// Wheel speeds.
    pub speed: bool,
    /// A brake source.
    pub brake: bool,
    /// Accelerator.
    pub gas: bool,
    /// Cruise state.
    pub cruise: bool,
    /// Driver torque.
    pub driver_torque: bool,
    /// Cruise buttons.
    pub buttons: bool,
}

impl SignalUpdate {
    /// True if the frame carried any tracked signal.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.speed || self.brake || self.gas || self.cruise || self.driver_torque || self.buttons
    }
}

/// Folds trusted state-bus frames into a [`VehicleState`].
#[derive(Debug, Clone)]
pub struct VehicleStateTracker {
    signals: VehicleSignals,
    standstill_threshold: f32,
    window_len: u8,
    brake_sources: [bool; MAX_BRAKE_SOURCES],
    state: VehicleState,
}

impl VehicleStateTracker {
    /// Tracker for the given signal layout.
    #[must_use]
    pub fn new(signals: VehicleSignals, standstill_threshold: f32, window_len: u8) -> Self {
        Self {
            signals,
            standstill_threshold,
            window_len,
            brake_sources: [false; MAX_BRAKE_SOURCES],
            state: VehicleState::new(window_len),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub const fn state(&self) -> &VehicleState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut VehicleState {
        &mut self.state
    }

    /// Update from one trusted frame. Frames off the state bus and frames
    /// carrying no tracked signal change nothing.
    pub fn process(&mut self, frame: &CanFrame) -> SignalUpdate {
        let mut update = SignalUpdate::default();
        if frame.bus() != self.signals.state_bus {
            return update;
        }
        let id = frame.id();
        let data = frame.data();

        if let Some(speed) = self.signals.speed.as_ref().filter(|s| s.id == id) {
            let mut sum = 0.0f32;
            let mut complete = true;
            for wheel in &speed.wheels {
                match wheel.extract(data) {
                    Some(raw) => sum += speed.scale.apply(raw),
                    None => complete = false,
                }
            }
            let count = u8::try_from(speed.wheels.len()).unwrap_or(u8::MAX);
            if complete && count > 0 {
                self.state.speed = (sum / f32::from(count)).max(0.0);
                self.state.standstill = self.state.speed <= self.standstill_threshold;
                update.speed = true;
            }
        }

        for (source, active) in self.signals.brake.iter().zip(self.brake_sources.iter_mut()) {
            if source.id == id {
                if let Some(set) = source.field.is_set(data) {
                    *active = set;
                    update.brake = true;
                }
            }
        }
        if update.brake {
            self.state.brake_pressed = self.brake_sources.iter().any(|active| *active);
        }

        if let Some(gas) = self.signals.gas.filter(|g| g.id == id) {
            if let Some(value) = gas.field.extract(data) {
                self.state.gas_pressed = value > gas.threshold;
                update.gas = true;
            }
        }

        if let Some(cruise) = self.signals.cruise.as_ref().filter(|c| c.id == id) {
            if let Some(value) = cruise.field.extract(data) {
                let engaged = cruise.engaged_values.contains(&value);
                self.state.cruise_engaged = engaged;
                if cruise.tracks_main_switch() {
                    self.state.acc_main_on = engaged || cruise.main_on_values.contains(&value);
                }
                update.cruise = true;
            }
        }

        if let Some(torque) = self.signals.driver_torque.filter(|t| t.id == id) {
            if let Some(value) = torque.field.extract(data) {
                self.state.driver_torque.push(value);
                update.driver_torque = true;
            }
        }

        if let Some(buttons) = self.signals.buttons.filter(|b| b.id == id) {
            let read = |field: Option<crate::signal::BitField>| {
                field.and_then(|f| f.is_set(data)).unwrap_or(false)
            };
            self.state.cancel_pressed = read(buttons.cancel);
            self.state.set_pressed = read(buttons.set);
            self.state.resume_pressed = read(buttons.resume);
            update.buttons = true;
        }

        update
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        self.brake_sources = [false; MAX_BRAKE_SOURCES];
        self.state = VehicleState::new(self.window_len);
    }
}
