//! The gatekeeper engine.

use crate::actuation::{ActuationState, TorqueContext, TorqueMonitor, check_acceleration, check_buttons};
use crate::config::{Tick, TxKind, TxRule, VehicleConfig};
use crate::engagement::{DisengageReason, EngagementMachine, EngagementState, Inhibits, Transition};
use crate::frame::CanFrame;
use crate::integrity::{IntegrityValidator, ValidityOutcome};
use crate::policy::{ForwardingPolicy, RejectReason, TransmitPolicy, TxVerdict};
use crate::relay::{RelayDetector, RelayFault};
use crate::vehicle_state::{VehicleState, VehicleStateTracker};
use crate::SafetyResult;

/// One gatekeeper instance for one vehicle.
///
/// Every call runs to completion without allocating. Time only advances
/// through [`SafetyEngine::tick`].
#[derive(Debug, Clone)]
pub struct SafetyEngine {
    config: VehicleConfig,
    integrity: IntegrityValidator,
    tracker: VehicleStateTracker,
    engagement: EngagementMachine,
    torque: Option<TorqueMonitor>,
    transmit: TransmitPolicy,
    forwarding: ForwardingPolicy,
    relay: RelayDetector,
    now: Tick,
}

impl SafetyEngine {
    /// Build an engine, disengaged, at tick 0.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found by
    /// [`VehicleConfig::validate`].
    pub fn new(config: VehicleConfig) -> SafetyResult<Self> {
        config.validate()?;
        let window_len = config.steering.unwrap_or_default().driver_window_len;
        let tracks_main_switch = config
            .signals
            .cruise
            .as_ref()
            .is_some_and(|cruise| cruise.tracks_main_switch());

        let engine = Self {
            integrity: IntegrityValidator::new(&config),
            tracker: VehicleStateTracker::new(
                config.signals.clone(),
                config.engagement.standstill_threshold,
                window_len,
            ),
            engagement: EngagementMachine::new(
                config.engagement,
                config.alternative_experience,
                tracks_main_switch,
            ),
            torque: config.steering.map(TorqueMonitor::new),
            transmit: TransmitPolicy::new(&config),
            forwarding: ForwardingPolicy::new(&config),
            relay: RelayDetector::new(config.relay),
            now: 0,
            config,
        };
        tracing::debug!(vehicle = %engine.config.name, "Safety engine created");
        Ok(engine)
    }

    /// Classify a received frame and fold it into the vehicle state.
    pub fn process_received(&mut self, frame: &CanFrame) -> ValidityOutcome {
        if let Some(fault) = self.relay.poll(self.now) {
            self.on_relay_fault(fault);
        }
        if let Some(fault) = self.relay.observe(frame, self.now) {
            self.on_relay_fault(fault);
        }

        let outcome = self.integrity.check(frame, self.now);
        match outcome {
            ValidityOutcome::Invalid(fault) => {
                tracing::debug!(id = frame.id(), bus = frame.bus(), fault = %fault, "Invalid frame");
                if let Some(id) = self.integrity.sustained_failure() {
                    let transition = self.engagement.force_disengage(DisengageReason::IntegrityFailure { id });
                    if transition != Transition::None {
                        tracing::warn!(id = id, "Sustained integrity failure");
                    }
                    self.on_transition(transition);
                }
            }
            ValidityOutcome::Valid | ValidityOutcome::Untracked => {
                if self.tracker.process(frame).any() {
                    self.evaluate_engagement();
                }
            }
        }
        outcome
    }

    fn evaluate_engagement(&mut self) {
        let inhibits = Inhibits {
            relay_malfunction: self.relay.is_latched(),
            integrity_failure: self.integrity.sustained_failure(),
            lagging: self.integrity.lagging(self.now),
        };
        let transition = self.engagement.evaluate(self.tracker.state_mut(), inhibits);
        self.on_transition(transition);
    }

    /// Gate a decoded actuation value for `(id, bus)`.
    pub fn evaluate_outbound(&mut self, id: u32, bus: u8, candidate: i32) -> TxVerdict {
        let verdict = self.whitelisted(id, bus).and_then(|rule| self.gate(&rule, candidate));
        self.finish(id, bus, verdict)
    }

    /// Gate a complete outbound frame, decoding the checked value from its
    /// payload.
    pub fn evaluate_frame(&mut self, frame: &CanFrame) -> TxVerdict {
        let verdict = self.whitelisted(frame.id(), frame.bus()).and_then(|rule| {
            let data = frame.data();
            if let Some(pinned) = &rule.pinned {
                let found = pinned.value.decode(data);
                if found != Some(pinned.expected) {
                    return Err(RejectReason::PinnedSignal { found });
                }
            }
            let candidate = match &rule.value {
                Some(value) => value.decode(data).ok_or(RejectReason::Malformed)?,
                None => 0,
            };
            self.gate(&rule, candidate)
        });
        self.finish(frame.id(), frame.bus(), verdict)
    }

    fn whitelisted(&self, id: u32, bus: u8) -> Result<TxRule, RejectReason> {
        if self.relay.is_latched() {
            return Err(RejectReason::RelayMalfunction);
        }
        self.transmit.lookup(id, bus).copied().ok_or(RejectReason::NotWhitelisted)
    }

    fn gate(&mut self, rule: &TxRule, candidate: i32) -> Result<(), RejectReason> {
        let controls_allowed = self.controls_allowed();
        match rule.kind {
            TxKind::Passthrough => Ok(()),
            TxKind::SteeringTorque => {
                let state = self.tracker.state();
                let ctx = TorqueContext {
                    controls_allowed,
                    driver_torque_min: state.driver_torque_min(),
                    driver_torque_max: state.driver_torque_max(),
                };
                let monitor = self.torque.as_mut().ok_or(RejectReason::NotWhitelisted)?;
                monitor
                    .evaluate(candidate, ctx, self.now)
                    .map_err(RejectReason::Actuation)
            }
            TxKind::Acceleration => {
                let longitudinal_allowed = self.longitudinal_allowed();
                let limits = self.config.longitudinal.as_ref().ok_or(RejectReason::NotWhitelisted)?;
                check_acceleration(limits, candidate, longitudinal_allowed).map_err(RejectReason::Actuation)
            }
            TxKind::CruiseButtons { engage_mask } => {
                check_buttons(candidate, engage_mask, controls_allowed).map_err(RejectReason::Actuation)
            }
        }
    }

    fn finish(&mut self, id: u32, bus: u8, verdict: Result<(), RejectReason>) -> TxVerdict {
        match &verdict {
            Ok(()) => self.relay.on_transmit(id, bus, self.now),
            Err(reason) => tracing::debug!(id = id, bus = bus, reason = %reason, "Outbound frame rejected"),
        }
        TxVerdict::from(verdict)
    }

    /// Destination bus for a received frame, `None` if it must not be
    /// forwarded.
    #[must_use]
    pub fn should_forward(&self, frame: &CanFrame, source_bus: u8) -> Option<u8> {
        if self.relay.is_latched() {
            return None;
        }
        self.forwarding.route(source_bus, frame.id())
    }

    /// Advance time and run the time-based checks. Time never moves
    /// backwards; an older `now` is ignored.
    pub fn tick(&mut self, now: Tick) {
        self.now = self.now.max(now);
        if let Some(fault) = self.relay.poll(self.now) {
            self.on_relay_fault(fault);
        }
        if let Some(id) = self.integrity.lagging(self.now) {
            let transition = self.engagement.force_disengage(DisengageReason::RxLagging { id });
            if transition != Transition::None {
                tracing::warn!(id = id, now = self.now, "Tracked identifier stopped arriving");
            }
            self.on_transition(transition);
        }
    }

    fn on_relay_fault(&mut self, fault: RelayFault) {
        tracing::error!(fault = %fault, "Relay malfunction latched");
        let transition = self.engagement.force_disengage(DisengageReason::RelayMalfunction);
        self.on_transition(transition);
        if let Some(monitor) = self.torque.as_mut() {
            monitor.reset();
        }
    }

    fn on_transition(&mut self, transition: Transition) {
        match transition {
            Transition::None => {}
            Transition::Engaged => {
                // Commands from before the engagement do not carry over.
                if let Some(monitor) = self.torque.as_mut() {
                    monitor.rearm(self.now);
                }
                tracing::info!(vehicle = %self.config.name, "Controls engaged");
            }
            Transition::Disengaged(reason) => {
                tracing::info!(vehicle = %self.config.name, reason = %reason, "Controls disengaged");
            }
        }
    }

    /// True while actuation commands may reach the vehicle.
    #[must_use]
    pub fn controls_allowed(&self) -> bool {
        self.engagement.controls_allowed()
    }

    /// Engagement state.
    #[must_use]
    pub const fn engagement_state(&self) -> EngagementState {
        self.engagement.state()
    }

    /// True while acceleration requests may be sent: engaged and the gas
    /// pedal released at the last evaluation.
    #[must_use]
    pub fn longitudinal_allowed(&self) -> bool {
        self.controls_allowed() && !self.tracker.state().gas_pressed_prev
    }

    /// Latest vehicle state.
    #[must_use]
    pub const fn vehicle_state(&self) -> &VehicleState {
        self.tracker.state()
    }

    /// Steering actuation state; neutral when steering is not configured.
    #[must_use]
    pub fn actuation_state(&self) -> ActuationState {
        self.torque.as_ref().map(|monitor| *monitor.state()).unwrap_or_default()
    }

    /// Latched relay fault.
    #[must_use]
    pub const fn relay_malfunction(&self) -> Option<RelayFault> {
        self.relay.fault()
    }

    /// Integrity validator, for per-identifier counter state.
    #[must_use]
    pub const fn integrity(&self) -> &IntegrityValidator {
        &self.integrity
    }

    /// Current tick.
    #[must_use]
    pub const fn now(&self) -> Tick {
        self.now
    }

    /// Configuration the engine was built from.
    #[must_use]
    pub const fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Back to the start-up state: disengaged, counters and torque at zero,
    /// relay fault cleared. The current tick is kept.
    pub fn reset(&mut self) {
        self.integrity.reset();
        self.tracker.reset();
        self.engagement.reset();
        if let Some(monitor) = self.torque.as_mut() {
            monitor.reset();
        }
        self.relay.reset();
        tracing::debug!(vehicle = %self.config.name, "Safety engine reset");
    }

    #[cfg(any(test, feature = "harness"))]
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (
        &mut EngagementMachine,
        &mut VehicleStateTracker,
        Option<&mut TorqueMonitor>,
        &mut IntegrityValidator,
    ) {
        (
            &mut self.engagement,
            &mut self.tracker,
            self.torque.as_mut(),
            &mut self.integrity,
        )
    }
}
