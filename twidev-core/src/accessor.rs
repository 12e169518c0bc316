//! Register bit-field access
//!
//! Reads extract a right-aligned field from one register; writes are
//! read-modify-write cycles that leave every bit outside the field as the
//! device reported it. Field positions follow [`FieldSpec`]. Invalid
//! positions fail before any bus traffic, and a write whose read fails is
//! abandoned without touching the device.

use twidev_hal::{Clock, TwiRegisters};

use crate::device::I2cDev;
use crate::{BusError, DeviceAddress, FieldSpec};

impl<R: TwiRegisters, C: Clock> I2cDev<R, C> {
    /// Read a single bit of an 8-bit register
    pub fn read_bit(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
    ) -> Result<bool, BusError> {
        self.read_bit_with_timeout(device, register, bit, self.read_timeout_ms)
    }

    /// Read a single bit of an 8-bit register with an explicit timeout
    pub fn read_bit_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
        timeout_ms: u16,
    ) -> Result<bool, BusError> {
        let value = self.read_bits_with_timeout(device, register, FieldSpec::bit(bit), timeout_ms)?;
        Ok(value != 0)
    }

    /// Read a single bit of a 16-bit register
    pub fn read_bit_w(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
    ) -> Result<bool, BusError> {
        self.read_bit_w_with_timeout(device, register, bit, self.read_timeout_ms)
    }

    /// Read a single bit of a 16-bit register with an explicit timeout
    pub fn read_bit_w_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
        timeout_ms: u16,
    ) -> Result<bool, BusError> {
        let value =
            self.read_bits_w_with_timeout(device, register, FieldSpec::bit(bit), timeout_ms)?;
        Ok(value != 0)
    }

    /// Read a field of an 8-bit register, right-aligned
    pub fn read_bits(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
    ) -> Result<u8, BusError> {
        self.read_bits_with_timeout(device, register, field, self.read_timeout_ms)
    }

    /// Read a field of an 8-bit register with an explicit timeout
    pub fn read_bits_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
        timeout_ms: u16,
    ) -> Result<u8, BusError> {
        field.mask8()?;
        let current = self.read_byte_with_timeout(device, register, timeout_ms)?;
        field.extract8(current)
    }

    /// Read a field of a 16-bit register, right-aligned
    pub fn read_bits_w(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
    ) -> Result<u16, BusError> {
        self.read_bits_w_with_timeout(device, register, field, self.read_timeout_ms)
    }

    /// Read a field of a 16-bit register with an explicit timeout
    pub fn read_bits_w_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
        timeout_ms: u16,
    ) -> Result<u16, BusError> {
        field.mask16()?;
        let current = self.read_word_with_timeout(device, register, timeout_ms)?;
        field.extract16(current)
    }

    /// Set or clear a single bit of an 8-bit register
    pub fn write_bit(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
        value: bool,
    ) -> Result<(), BusError> {
        self.write_bits(device, register, FieldSpec::bit(bit), u8::from(value))
    }

    /// Set or clear a single bit of a 16-bit register
    pub fn write_bit_w(
        &mut self,
        device: DeviceAddress,
        register: u8,
        bit: u8,
        value: bool,
    ) -> Result<(), BusError> {
        self.write_bits_w(device, register, FieldSpec::bit(bit), u16::from(value))
    }

    /// Replace a field of an 8-bit register
    ///
    /// `value` is right-aligned; bits that do not fit the field are dropped.
    pub fn write_bits(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
        value: u8,
    ) -> Result<(), BusError> {
        field.mask8()?;
        let current = self.read_byte(device, register)?;
        let updated = field.insert8(current, value)?;
        trace!(
            "I2C ({=u8:#x}) reg {=u8:#x}: {=u8:#x} -> {=u8:#x}",
            device.get(),
            register,
            current,
            updated
        );
        self.write_byte(device, register, updated)
    }

    /// Replace a field of a 16-bit register
    pub fn write_bits_w(
        &mut self,
        device: DeviceAddress,
        register: u8,
        field: FieldSpec,
        value: u16,
    ) -> Result<(), BusError> {
        field.mask16()?;
        let current = self.read_word(device, register)?;
        let updated = field.insert16(current, value)?;
        trace!(
            "I2C ({=u8:#x}) reg {=u8:#x}: {=u16:#x} -> {=u16:#x}",
            device.get(),
            register,
            current,
            updated
        );
        self.write_word(device, register, updated)
    }
}
