//! Relay malfunction detection.
//!
//! The gateway sits behind a relay that disconnects the stock controller
//! from the vehicle bus while the gateway drives it. When the gateway
//! transmits the watched identifier, the transceiver echoes it back on the
//! loopback bus. A missing echo, or the identifier showing up on the bus
//! where only the stock controller could have sent it, means the relay did
//! not switch. The fault latches until [`RelayDetector::reset`].

use crate::config::{RelayCheck, Tick};
use crate::frame::CanFrame;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Latched relay fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "fault", rename_all = "snake_case"))]
pub enum RelayFault {
    /// No echo within the timeout.
    EchoTimeout {
        /// Ticks waited.
        waited: Tick,
    },
    /// Watched identifier received on the fault bus.
    SeenOnFaultBus {
        /// Bus it arrived on.
        bus: u8,
    },
}

impl fmt::Display for RelayFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EchoTimeout { waited } => write!(f, "no echo after {waited} ticks"),
            Self::SeenOnFaultBus { bus } => write!(f, "watched identifier seen on bus {bus}"),
        }
    }
}

/// Relay watch.
#[derive(Debug, Clone)]
pub struct RelayDetector {
    check: Option<RelayCheck>,
    waiting_since: Option<Tick>,
    fault: Option<RelayFault>,
}

impl RelayDetector {
    /// Detector for a check; `None` disables detection.
    #[must_use]
    pub const fn new(check: Option<RelayCheck>) -> Self {
        Self {
            check,
            waiting_since: None,
            fault: None,
        }
    }

    /// True once a fault has latched.
    #[must_use]
    pub const fn is_latched(&self) -> bool {
        self.fault.is_some()
    }

    /// Latched fault.
    #[must_use]
    pub const fn fault(&self) -> Option<RelayFault> {
        self.fault
    }

    /// Tick since which an echo is awaited.
    #[must_use]
    pub const fn waiting_since(&self) -> Option<Tick> {
        self.waiting_since
    }

    /// Note an accepted transmission.
    pub fn on_transmit(&mut self, id: u32, bus: u8, now: Tick) {
        let Some(check) = &self.check else {
            return;
        };
        if check.id == id && check.tx_bus == bus && self.waiting_since.is_none() {
            self.waiting_since = Some(now);
        }
    }

    /// Inspect a received frame. Returns the fault if this frame latched it.
    pub fn observe(&mut self, frame: &CanFrame, now: Tick) -> Option<RelayFault> {
        let check = self.check?;
        if frame.id() != check.id || self.is_latched() {
            return None;
        }
        if frame.bus() == check.echo_bus {
            self.waiting_since = None;
            return None;
        }
        if check.fault_bus == Some(frame.bus()) {
            return self.latch(RelayFault::SeenOnFaultBus { bus: frame.bus() });
        }
        self.poll(now)
    }

    /// Check the echo timeout. Returns the fault if this call latched it.
    pub fn poll(&mut self, now: Tick) -> Option<RelayFault> {
        let check = self.check?;
        let since = self.waiting_since?;
        let waited = now.saturating_sub(since);
        if self.is_latched() || waited <= check.timeout {
            return None;
        }
        self.latch(RelayFault::EchoTimeout { waited })
    }

    fn latch(&mut self, fault: RelayFault) -> Option<RelayFault> {
        self.waiting_since = None;
        self.fault = Some(fault);
        Some(fault)
    }

    /// Clear the latch and any pending wait.
    pub fn reset(&mut self) {
        self.waiting_since = None;
        self.fault = None;
    }
}
