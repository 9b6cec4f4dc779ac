//! Fixed-size CAN / CAN-FD frame representation.

use crate::{SafetyError, SafetyResult};
use core::fmt;

/// Largest payload carried by a CAN-FD frame.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Bit OR'd into the bus index of frames the gateway transmitted itself and
/// received back from the transceiver.
pub const LOOPBACK_BUS_FLAG: u8 = 0x80;

/// Bus index and identifier of a frame, without the payload.
pub type BusId = (u8, u32);

/// One message on a vehicle network.
///
/// Frames are plain values: the engine classifies them but never mutates
/// them. The payload buffer is inline so that no allocation happens on the
/// receive path.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    bus: u8,
    id: u32,
    payload: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl CanFrame {
    /// Build a frame from a payload slice.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::FrameTooLong`] if `data` is longer than
    /// [`MAX_PAYLOAD_LEN`].
    pub fn new(bus: u8, id: u32, data: &[u8]) -> SafetyResult<Self> {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let slot = payload
            .get_mut(..data.len())
            .ok_or(SafetyError::FrameTooLong {
                len: data.len(),
                max: MAX_PAYLOAD_LEN,
            })?;
        slot.copy_from_slice(data);
        let len = u8::try_from(data.len()).map_err(|_overflow| SafetyError::FrameTooLong {
            len: data.len(),
            max: MAX_PAYLOAD_LEN,
        })?;
        Ok(Self {
            bus,
            id,
            payload,
            len,
        })
    }

    /// Classic 8-byte frame.
    #[must_use]
    pub fn classic(bus: u8, id: u32, data: [u8; 8]) -> Self {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        for (dst, src) in payload.iter_mut().zip(data) {
            *dst = src;
        }
        Self {
            bus,
            id,
            payload,
            len: 8,
        }
    }

    /// Bus the frame was received on (or will be sent on).
    #[must_use]
    pub const fn bus(&self) -> u8 {
        self.bus
    }

    /// Arbitration identifier.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Payload length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns true for a zero-length frame.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload bytes, `len()` long.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.payload.get(..self.len()).unwrap_or(&[])
    }

    /// Single payload byte, `None` past the end of the payload.
    #[must_use]
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data().get(index).copied()
    }

    /// True if the transceiver flagged this as our own transmission.
    #[must_use]
    pub const fn is_loopback(&self) -> bool {
        self.bus & LOOPBACK_BUS_FLAG != 0
    }

    /// The same frame addressed to another bus.
    #[must_use]
    pub const fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    /// `(bus, id)` key used by the whitelist and integrity tables.
    #[must_use]
    pub const fn key(&self) -> BusId {
        (self.bus, self.id)
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanFrame")
            .field("bus", &self.bus)
            .field("id", &format_args!("{:#05x}", self.id))
            .field("data", &self.data())
            .finish()
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:03X}#", self.bus, self.id)?;
        for byte in self.data() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
