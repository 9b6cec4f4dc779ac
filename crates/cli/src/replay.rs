//! Drive a gatekeeper engine from a recorded log.

use cangate_safety::{
    CanFrame, EngagementState, LOOPBACK_BUS_FLAG, RelayFault, SafetyEngine, Tick, TxVerdict,
    ValidityOutcome, VehicleConfig,
};
use serde::Serialize;

use crate::candump::{Direction, LogRecord};
use crate::error::CliError;

/// Engine decision for one logged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Decision {
    Rx {
        #[serde(flatten)]
        outcome: ValidityOutcome,
        forward: Option<u8>,
    },
    Tx {
        #[serde(flatten)]
        verdict: TxVerdict,
    },
}

/// One line of the replay report.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayEvent {
    pub line: usize,
    /// Microseconds since the first record.
    pub tick: Tick,
    pub frame: String,
    #[serde(flatten)]
    pub decision: Decision,
    pub controls_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<EngagementState>,
}

/// Totals over a whole replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub vehicle: String,
    pub frames: usize,
    pub valid: usize,
    pub invalid: usize,
    pub untracked: usize,
    pub forwarded: usize,
    pub blocked: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub engagements: usize,
    pub disengagements: usize,
    pub relay_fault: Option<RelayFault>,
    pub final_state: EngagementState,
    pub duration: Tick,
}

impl ReplaySummary {
    /// True when every outbound frame was accepted and every tracked frame
    /// passed its checks.
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.invalid == 0 && self.relay_fault.is_none()
    }

    pub fn into_result(self) -> Result<Self, CliError> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(CliError::ReplayFaults {
                rejected: self.rejected,
                invalid: self.invalid,
                relay_fault: self.relay_fault,
            })
        }
    }
}

/// Replay options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Feed accepted outbound frames back as their loopback echo.
    pub echo: bool,
}

/// Runs records through an engine, one at a time.
#[derive(Debug)]
pub struct Replayer {
    engine: SafetyEngine,
    options: ReplayOptions,
    origin: Option<Tick>,
    summary: ReplaySummary,
}

impl Replayer {
    pub fn new(config: VehicleConfig, options: ReplayOptions) -> Result<Self, CliError> {
        let summary = ReplaySummary {
            vehicle: config.name.to_string(),
            ..ReplaySummary::default()
        };
        Ok(Self {
            engine: SafetyEngine::new(config)?,
            options,
            origin: None,
            summary,
        })
    }

    pub fn engine(&self) -> &SafetyEngine {
        &self.engine
    }

    /// Advance the clock to the record's timestamp and apply it.
    pub fn step(&mut self, record: &LogRecord) -> ReplayEvent {
        let origin = *self.origin.get_or_insert(record.timestamp);
        let tick = record.timestamp.saturating_sub(origin);
        let before = self.engine.engagement_state();
        self.engine.tick(tick);

        let decision = match record.direction {
            Direction::Rx => self.receive(&record.frame),
            Direction::Tx => self.transmit(&record.frame),
        };

        let after = self.engine.engagement_state();
        let transition = (before != after).then_some(after);
        match transition {
            Some(EngagementState::Engaged) => {
                self.summary.engagements = self.summary.engagements.saturating_add(1);
            }
            Some(EngagementState::Disengaged) => {
                self.summary.disengagements = self.summary.disengagements.saturating_add(1);
            }
            None => {}
        }
        self.summary.frames = self.summary.frames.saturating_add(1);
        self.summary.duration = self.engine.now();

        ReplayEvent {
            line: record.line,
            tick,
            frame: record.frame.to_string(),
            decision,
            controls_allowed: self.engine.controls_allowed(),
            transition,
        }
    }

    fn receive(&mut self, frame: &CanFrame) -> Decision {
        let outcome = self.engine.process_received(frame);
        let counter = match outcome {
            ValidityOutcome::Valid => &mut self.summary.valid,
            ValidityOutcome::Invalid(_) => &mut self.summary.invalid,
            ValidityOutcome::Untracked => &mut self.summary.untracked,
        };
        *counter = counter.saturating_add(1);

        let forward = self.engine.should_forward(frame, frame.bus());
        let counter = if forward.is_some() {
            &mut self.summary.forwarded
        } else {
            &mut self.summary.blocked
        };
        *counter = counter.saturating_add(1);
        Decision::Rx { outcome, forward }
    }

    fn transmit(&mut self, frame: &CanFrame) -> Decision {
        let verdict = self.engine.evaluate_frame(frame);
        if verdict.is_accepted() {
            self.summary.accepted = self.summary.accepted.saturating_add(1);
            if self.options.echo {
                let echo = frame.with_bus(frame.bus() | LOOPBACK_BUS_FLAG);
                let echoed = self.engine.process_received(&echo);
                tracing::trace!(frame = %echo, outcome = ?echoed, "Loopback echo");
            }
        } else {
            self.summary.rejected = self.summary.rejected.saturating_add(1);
        }
        Decision::Tx { verdict }
    }

    /// Final totals.
    pub fn finish(mut self) -> ReplaySummary {
        self.summary.relay_fault = self.engine.relay_malfunction();
        self.summary.final_state = self.engine.engagement_state();
        self.summary
    }
}
