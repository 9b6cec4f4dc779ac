//! Bit-field layout of signals inside a frame payload.
//!
//! Bit numbering is little-endian ("Intel"): bit `n` is bit `n % 8` of byte
//! `n / 8`, and a field of width `w` starting at bit `s` covers bits
//! `s .. s + w`, least significant bit first.

use crate::{SafetyError, SafetyResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// 64-byte CAN-FD payload.
const MAX_BIT: u32 = 64 * 8;

/// How the raw bits of a field map to a signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Encoding {
    /// Plain unsigned integer.
    #[default]
    Unsigned,
    /// Two's complement over the field width.
    TwosComplement,
    /// Magnitude in the field, sign in a separate bit (set = negative).
    SignMagnitude {
        /// Bit index of the sign flag.
        sign_bit: u16,
    },
}

/// Location and encoding of one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BitField {
    /// First (least significant) bit of the field.
    pub start_bit: u16,
    /// Number of bits, 1..=32.
    pub width: u8,
    /// Value encoding.
    #[cfg_attr(feature = "serde", serde(default))]
    pub encoding: Encoding,
}

impl BitField {
    /// Unsigned field.
    #[must_use]
    pub const fn unsigned(start_bit: u16, width: u8) -> Self {
        Self {
            start_bit,
            width,
            encoding: Encoding::Unsigned,
        }
    }

    /// Single-bit flag.
    #[must_use]
    pub const fn flag(bit: u16) -> Self {
        Self::unsigned(bit, 1)
    }

    /// Two's complement field.
    #[must_use]
    pub const fn twos_complement(start_bit: u16, width: u8) -> Self {
        Self {
            start_bit,
            width,
            encoding: Encoding::TwosComplement,
        }
    }

    /// Magnitude field with a detached sign bit.
    #[must_use]
    pub const fn sign_magnitude(start_bit: u16, width: u8, sign_bit: u16) -> Self {
        Self {
            start_bit,
            width,
            encoding: Encoding::SignMagnitude { sign_bit },
        }
    }

    /// One past the last bit touched by this field, sign bit included.
    #[must_use]
    pub fn end_bit(&self) -> u32 {
        let field_end = u32::from(self.start_bit) + u32::from(self.width);
        match self.encoding {
            Encoding::SignMagnitude { sign_bit } => field_end.max(u32::from(sign_bit) + 1),
            _ => field_end,
        }
    }

    /// Minimum payload length needed to carry this field.
    #[must_use]
    pub fn min_len(&self) -> usize {
        usize::try_from(self.end_bit().div_ceil(8)).unwrap_or(usize::MAX)
    }

    /// Validate the layout.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] if the width is out of range
    /// for the encoding, the field runs past a 64-byte payload, or the sign
    /// bit overlaps the magnitude.
    pub fn validate(&self) -> SafetyResult<()> {
        let max_width = match self.encoding {
            Encoding::TwosComplement => 32,
            Encoding::Unsigned | Encoding::SignMagnitude { .. } => 31,
        };
        if self.width == 0 || self.width > max_width {
            return Err(SafetyError::invalid_config(
                "bit_field.width",
                "width must be 1..=31 (1..=32 for two's complement)",
            ));
        }
        if self.end_bit() > MAX_BIT {
            return Err(SafetyError::invalid_config(
                "bit_field.start_bit",
                "field extends past a 64-byte payload",
            ));
        }
        if let Encoding::SignMagnitude { sign_bit } = self.encoding {
            let start = u32::from(self.start_bit);
            let sign = u32::from(sign_bit);
            if sign >= start && sign < start + u32::from(self.width) {
                return Err(SafetyError::invalid_config(
                    "bit_field.sign_bit",
                    "sign bit overlaps the magnitude bits",
                ));
            }
        }
        Ok(())
    }

    /// Raw bits of the field, `None` if the payload is too short.
    #[must_use]
    pub fn raw(&self, data: &[u8]) -> Option<u32> {
        let mut value = 0u32;
        for offset in 0..u32::from(self.width.min(32)) {
            if read_bit(data, u32::from(self.start_bit) + offset)? {
                value |= 1 << offset;
            }
        }
        Some(value)
    }

    /// Decoded signed value, `None` if the payload is too short.
    #[must_use]
    pub fn extract(&self, data: &[u8]) -> Option<i32> {
        let raw = self.raw(data)?;
        match self.encoding {
            Encoding::Unsigned => i32::try_from(raw).ok(),
            Encoding::TwosComplement => {
                let width = u32::from(self.width);
                if width == 0 {
                    return Some(0);
                }
                if width >= 32 {
                    return Some(i32::from_ne_bytes(raw.to_ne_bytes()));
                }
                let value = i64::from(raw);
                let negative = (raw >> (width - 1)) & 1 == 1;
                let value = if negative { value - (1i64 << width) } else { value };
                i32::try_from(value).ok()
            }
            Encoding::SignMagnitude { sign_bit } => {
                let magnitude = i32::try_from(raw).ok()?;
                if read_bit(data, u32::from(sign_bit))? {
                    Some(-magnitude)
                } else {
                    Some(magnitude)
                }
            }
        }
    }

    /// True if any bit of the field is set.
    #[must_use]
    pub fn is_set(&self, data: &[u8]) -> Option<bool> {
        self.raw(data).map(|raw| raw != 0)
    }

    /// Encode `value` into the payload.
    ///
    /// Returns `None` without touching `data` if the value does not fit the
    /// field or the payload is too short.
    pub fn insert(&self, data: &mut [u8], value: i32) -> Option<()> {
        if data.len() < self.min_len() {
            return None;
        }
        let width = u32::from(self.width.min(32));
        if width == 0 {
            return None;
        }
        let mask = if width >= 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        };
        let (raw, sign) = match self.encoding {
            Encoding::Unsigned => {
                let raw = u32::try_from(value).ok()?;
                (raw, None)
            }
            Encoding::TwosComplement => {
                if width < 32 {
                    let limit = 1i64 << (width - 1);
                    let value = i64::from(value);
                    if value < -limit || value >= limit {
                        return None;
                    }
                }
                (u32::from_ne_bytes(value.to_ne_bytes()) & mask, None)
            }
            Encoding::SignMagnitude { sign_bit } => {
                (value.unsigned_abs(), Some((sign_bit, value < 0)))
            }
        };
        if raw & !mask != 0 {
            return None;
        }
        for offset in 0..width {
            write_bit(data, u32::from(self.start_bit) + offset, (raw >> offset) & 1 == 1)?;
        }
        if let Some((sign_bit, negative)) = sign {
            write_bit(data, u32::from(sign_bit), negative)?;
        }
        Some(())
    }
}

fn read_bit(data: &[u8], bit: u32) -> Option<bool> {
    let byte = data.get(usize::try_from(bit / 8).ok()?)?;
    Some((byte >> (bit % 8)) & 1 == 1)
}

fn write_bit(data: &mut [u8], bit: u32, set: bool) -> Option<()> {
    let byte = data.get_mut(usize::try_from(bit / 8).ok()?)?;
    let mask = 1u8 << (bit % 8);
    if set {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
    Some(())
}

/// Linear scaling of a decoded field to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearScale {
    /// Multiplier applied to the raw value.
    pub factor: f32,
    /// Offset added after scaling.
    pub offset: f32,
}

impl LinearScale {
    /// Identity scale.
    pub const IDENTITY: Self = Self {
        factor: 1.0,
        offset: 0.0,
    };

    /// Scale with zero offset.
    #[must_use]
    pub const fn factor(factor: f32) -> Self {
        Self {
            factor,
            offset: 0.0,
        }
    }

    /// Apply the scale to a decoded value.
    #[must_use]
    pub fn apply(&self, value: i32) -> f32 {
        // Signal fields are at most 32 bits wide; f32 precision is enough
        // for the speed ranges these fields carry.
        #[expect(clippy::cast_precision_loss, reason = "bounded signal width")]
        let value = value as f32;
        value * self.factor + self.offset
    }
}

impl Default for LinearScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Integer-scaled actuation value carried in an outbound frame.
///
/// `value = raw * factor + offset`, computed without floating point so that
/// limit comparisons stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalValue {
    /// Field carrying the raw value.
    pub field: BitField,
    /// Integer multiplier.
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub factor: i32,
    /// Integer offset.
    #[cfg_attr(feature = "serde", serde(default))]
    pub offset: i32,
}

#[cfg(feature = "serde")]
const fn one() -> i32 {
    1
}

impl SignalValue {
    /// Unscaled value.
    #[must_use]
    pub const fn raw(field: BitField) -> Self {
        Self {
            field,
            factor: 1,
            offset: 0,
        }
    }

    /// Scaled value.
    #[must_use]
    pub const fn scaled(field: BitField, factor: i32, offset: i32) -> Self {
        Self {
            field,
            factor,
            offset,
        }
    }

    /// Decode the scaled value from a payload.
    #[must_use]
    pub fn decode(&self, data: &[u8]) -> Option<i32> {
        self.field
            .extract(data)?
            .checked_mul(self.factor)?
            .checked_add(self.offset)
    }

    /// Encode a scaled value into a payload.
    ///
    /// Values that do not land exactly on a raw step are rejected.
    pub fn encode(&self, data: &mut [u8], value: i32) -> Option<()> {
        let shifted = value.checked_sub(self.offset)?;
        if self.factor == 0 || shifted.checked_rem(self.factor)? != 0 {
            return None;
        }
        self.field.insert(data, shifted.checked_div(self.factor)?)
    }

    /// Validate the field and scale.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::InvalidConfig`] for a zero factor or a bad
    /// field layout.
    pub fn validate(&self) -> SafetyResult<()> {
        if self.factor == 0 {
            return Err(SafetyError::invalid_config(
                "signal_value.factor",
                "factor must be non-zero",
            ));
        }
        self.field.validate()
    }
}
