//! Payload checksum algorithms.
//!
//! The checksum byte itself is excluded from the computation; every other
//! payload byte is covered, in order.

use crate::{SafetyError, SafetyResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Checksum family used by an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ChecksumAlgorithm {
    /// XOR of the covered bytes.
    Xor {
        /// Also fold in the low and high bytes of the identifier.
        #[cfg_attr(feature = "serde", serde(default))]
        fold_identifier: bool,
    },
    /// MSB-first CRC-8.
    Crc8 {
        /// Generator polynomial without the implicit x^8 term.
        poly: u8,
        /// Initial register value.
        init: u8,
        /// Value XOR'd into the result.
        xor_out: u8,
        /// Per-message pad indexed by the rolling counter, folded in as one
        /// extra CRC step after the payload.
        #[cfg_attr(feature = "serde", serde(default))]
        counter_pad: Option<[u8; 16]>,
    },
}

impl ChecksumAlgorithm {
    /// AUTOSAR CRC-8 (polynomial 0x2F) with a constant per-message pad.
    #[must_use]
    pub const fn autosar_crc8(pad: u8) -> Self {
        Self::Crc8 {
            poly: 0x2F,
            init: 0xFF,
            xor_out: 0xFF,
            counter_pad: Some([pad; 16]),
        }
    }

    /// SAE J1850 CRC-8 (polynomial 0x1D).
    #[must_use]
    pub const fn sae_j1850() -> Self {
        Self::Crc8 {
            poly: 0x1D,
            init: 0xFF,
            xor_out: 0xFF,
            counter_pad: None,
        }
    }

    /// Compute the checksum of `data`, skipping byte `skip`.
    ///
    /// `counter` selects the pad entry for padded CRCs and is ignored
    /// otherwise; a padded CRC without a counter skips the pad step.
    #[must_use]
    pub fn compute(&self, id: u32, data: &[u8], skip: usize, counter: Option<u8>) -> u8 {
        let covered = data
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != skip)
            .map(|(_, byte)| *byte);
        match *self {
            Self::Xor { fold_identifier } => {
                let mut sum = covered.fold(0u8, |acc, byte| acc ^ byte);
                if fold_identifier {
                    let [low, high, ..] = id.to_le_bytes();
                    sum ^= low ^ high;
                }
                sum
            }
            Self::Crc8 {
                poly,
                init,
                xor_out,
                counter_pad,
            } => {
                let mut crc = covered.fold(init, |crc, byte| crc8_step(poly, crc ^ byte));
                if let (Some(pad), Some(counter)) = (counter_pad, counter) {
                    if let Some(pad_byte) = pad.get(usize::from(counter & 0x0F)) {
                        crc = crc8_step(poly, crc ^ pad_byte);
                    }
                }
                crc ^ xor_out
            }
        }
    }

    /// Validate algorithm parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] for a zero CRC polynomial.
    pub fn validate(&self) -> SafetyResult<()> {
        match self {
            Self::Crc8 { poly: 0, .. } => Err(SafetyError::invalid_config(
                "checksum.poly",
                "CRC polynomial must be non-zero",
            )),
            _ => Ok(()),
        }
    }
}

/// One byte of a bitwise MSB-first CRC-8.
const fn crc8_step(poly: u8, mut crc: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ poly
        } else {
            crc << 1
        };
        bit += 1;
    }
    crc
}
