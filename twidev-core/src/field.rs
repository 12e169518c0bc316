//! Register bit-field arithmetic
//!
//! A field is named by its highest bit and its length, counting down toward
//! bit 0, which is how most sensor datasheets draw register maps:
//!
//! ```text
//! 01101001 register value
//! 76543210 bit numbers
//!    xxx   bit_start = 4, length = 3
//!    010   masked
//!   -> 010 right-aligned
//! ```
//!
//! The field's lowest bit sits at `bit_start - length + 1`. Pairs where that
//! would go below bit 0, or where `bit_start` lies outside the register, are
//! rejected with [`BusError::InvalidField`] instead of producing a shifted
//! garbage mask. A zero-length field is valid and selects nothing.

use crate::BusError;

/// Contiguous bit range inside an 8- or 16-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSpec {
    /// Highest bit of the field (0-7 or 0-15)
    pub bit_start: u8,
    /// Number of bits, extending from `bit_start` toward bit 0
    pub length: u8,
}

impl FieldSpec {
    /// Describe a field; validity is checked against the register width on use
    pub const fn new(bit_start: u8, length: u8) -> Self {
        Self { bit_start, length }
    }

    /// Single-bit field
    pub const fn bit(bit: u8) -> Self {
        Self::new(bit, 1)
    }

    /// Position of the field's lowest bit in a register `width` bits wide
    fn shift(&self, width: u8) -> Result<u32, BusError> {
        if self.bit_start >= width || self.length > self.bit_start + 1 {
            return Err(BusError::InvalidField);
        }
        Ok(u32::from(self.bit_start + 1 - self.length))
    }

    fn mask(&self, width: u8) -> Result<(u32, u32), BusError> {
        let shift = self.shift(width)?;
        let mask = ((1u32 << self.length) - 1) << shift;
        Ok((mask, shift))
    }

    fn extract(&self, width: u8, value: u32) -> Result<u32, BusError> {
        let (mask, shift) = self.mask(width)?;
        Ok((value & mask) >> shift)
    }

    fn insert(&self, width: u8, current: u32, value: u32) -> Result<u32, BusError> {
        let (mask, shift) = self.mask(width)?;
        Ok((current & !mask) | ((value << shift) & mask))
    }

    /// Mask selecting the field in an 8-bit register
    pub fn mask8(&self) -> Result<u8, BusError> {
        self.mask(8).map(|(mask, _)| mask as u8)
    }

    /// Mask selecting the field in a 16-bit register
    pub fn mask16(&self) -> Result<u16, BusError> {
        self.mask(16).map(|(mask, _)| mask as u16)
    }

    /// Right-aligned field value from an 8-bit register value
    pub fn extract8(&self, register: u8) -> Result<u8, BusError> {
        self.extract(8, register.into()).map(|v| v as u8)
    }

    /// Right-aligned field value from a 16-bit register value
    pub fn extract16(&self, register: u16) -> Result<u16, BusError> {
        self.extract(16, register.into()).map(|v| v as u16)
    }

    /// Replace the field in an 8-bit register value
    ///
    /// `value` is right-aligned; bits that do not fit the field are dropped.
    pub fn insert8(&self, register: u8, value: u8) -> Result<u8, BusError> {
        self.insert(8, register.into(), value.into()).map(|v| v as u8)
    }

    /// Replace the field in a 16-bit register value
    pub fn insert16(&self, register: u16, value: u16) -> Result<u16, BusError> {
        self.insert(16, register.into(), value.into()).map(|v| v as u16)
    }
}
