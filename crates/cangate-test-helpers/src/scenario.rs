//! A driven engine with its own clock and counters.

use crate::frames::FramePacker;
use crate::vw;
use cangate_safety::presets::volkswagen::{HCA_01, TSK_06};
use cangate_safety::{
    CanFrame, LOOPBACK_BUS_FLAG, Preset, SafetyEngine, SafetyResult, Tick, TxVerdict,
    ValidityOutcome, VehicleConfig,
};

/// Vehicle-side bus of the shipped presets.
pub const VEHICLE_BUS: u8 = 0;
/// Camera-side bus of the shipped presets.
pub const CAMERA_BUS: u8 = 2;

/// Engine plus the plumbing a vehicle would provide: a clock, in-sequence
/// counters and the transceiver echo of accepted frames.
#[derive(Debug)]
pub struct Scenario {
    engine: SafetyEngine,
    packer: FramePacker,
    now: Tick,
    echo: bool,
}

impl Scenario {
    /// Scenario for a configuration. Accepted steering frames are echoed on
    /// the loopback bus.
    pub fn new(config: VehicleConfig) -> SafetyResult<Self> {
        let packer = FramePacker::new(&config);
        Ok(Self {
            engine: SafetyEngine::new(config)?,
            packer,
            now: 0,
            echo: true,
        })
    }

    /// Scenario for a preset.
    pub fn preset(preset: Preset) -> SafetyResult<Self> {
        Self::new(preset.config()?)
    }

    /// Stop echoing accepted frames, as if the relay stayed closed.
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn engine(&self) -> &SafetyEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SafetyEngine {
        &mut self.engine
    }

    pub fn packer_mut(&mut self) -> &mut FramePacker {
        &mut self.packer
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Receive the next in-sequence frame on the vehicle bus.
    pub fn rx(&mut self, id: u32, data: [u8; 8]) -> ValidityOutcome {
        let frame = self.packer.next(VEHICLE_BUS, id, data);
        self.engine.process_received(&frame)
    }

    /// Receive a prepared frame.
    pub fn rx_frame(&mut self, frame: &CanFrame) -> ValidityOutcome {
        self.engine.process_received(frame)
    }

    /// Move the clock forward and run the time-based checks.
    pub fn advance(&mut self, dt: Tick) {
        self.now = self.now.saturating_add(dt);
        self.engine.tick(self.now);
    }

    /// Cruise standby then active on TSK_06.
    pub fn engage_stock(&mut self) -> bool {
        self.rx(TSK_06, vw::cruise_status(vw::tsk_status::STANDBY));
        self.rx(TSK_06, vw::cruise_status(vw::tsk_status::ACTIVE));
        self.engine.controls_allowed()
    }

    /// Send a steering request and, if accepted, its loopback echo.
    pub fn steer(&mut self, torque: i16) -> TxVerdict {
        let data = vw::steering_request(torque);
        let verdict = self
            .engine
            .evaluate_frame(&CanFrame::classic(VEHICLE_BUS, HCA_01, data));
        if verdict.is_accepted() && self.echo {
            let echo = CanFrame::classic(LOOPBACK_BUS_FLAG | VEHICLE_BUS, HCA_01, data);
            self.engine.process_received(&echo);
        }
        verdict
    }

    /// Ramp steering towards `target` at the largest allowed step, one
    /// request per `period`. Returns the last accepted torque.
    pub fn ramp_to(&mut self, target: i16, step: i16, period: Tick) -> i16 {
        let mut current = i16::try_from(self.engine.actuation_state().desired_value_last).unwrap();
        while current != target {
            let next = if target > current {
                (current + step).min(target)
            } else {
                (current - step).max(target)
            };
            if !self.steer(next).is_accepted() {
                break;
            }
            current = next;
            self.advance(period);
        }
        current
    }
}
