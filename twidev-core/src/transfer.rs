//! Byte and word transfers
//!
//! Register reads run one write phase (device address, register address)
//! and one read phase joined by a repeated START. On top of the engine's
//! per-cycle spin budget, reads carry a coarse millisecond timeout: if the
//! read did not deliver everything and at least `timeout_ms` passed since
//! it began, the result becomes [`BusError::TransferTimeout`].
//!
//! Words are big-endian on the wire (high byte first), whatever the host
//! byte order.

use twidev_hal::{Clock, TwiRegisters};

use crate::device::I2cDev;
use crate::{BusError, DeviceAddress};

impl<R: TwiRegisters, C: Clock> I2cDev<R, C> {
    /// Apply the millisecond timeout to a finished read
    fn check_deadline(
        &self,
        started: u32,
        timeout_ms: u16,
        expected: usize,
        result: Result<usize, BusError>,
    ) -> Result<usize, BusError> {
        let complete = matches!(result, Ok(count) if count >= expected);
        if timeout_ms > 0 && !complete {
            let elapsed = self.clock.now_ms().wrapping_sub(started);
            if elapsed >= u32::from(timeout_ms) {
                warn!("I2C read timed out after {} ms", elapsed);
                return Err(BusError::TransferTimeout);
            }
        }
        result
    }

    /// Read consecutive registers into `buf` using the default timeout
    ///
    /// Returns the number of bytes read, always `buf.len()` on success.
    ///
    /// Bytes are stored as they arrive. If the read fails part way, the
    /// bytes received before the failure are left in `buf`; its contents
    /// after an `Err` are unspecified and must not be used.
    pub fn read_bytes(
        &mut self,
        device: DeviceAddress,
        register: u8,
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        self.read_bytes_with_timeout(device, register, buf, self.read_timeout_ms)
    }

    /// Read consecutive registers into `buf` with an explicit timeout
    /// (0 disables the millisecond check)
    pub fn read_bytes_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        buf: &mut [u8],
        timeout_ms: u16,
    ) -> Result<usize, BusError> {
        trace!(
            "I2C ({=u8:#x}) reading {} bytes from {=u8:#x}",
            device.get(),
            buf.len(),
            register
        );

        let started = self.clock.now_ms();
        let count = buf.len();
        let result = self
            .engine
            .read_register(device, register, count, |i, byte| buf[i] = byte)
            .map(|()| count);

        self.check_deadline(started, timeout_ms, count, result)
    }

    /// Read consecutive 16-bit registers using the default timeout
    ///
    /// Returns the number of words read. As with
    /// [`read_bytes`](Self::read_bytes), `buf` may hold partially
    /// assembled words after an `Err`.
    pub fn read_words(
        &mut self,
        device: DeviceAddress,
        register: u8,
        buf: &mut [u16],
    ) -> Result<usize, BusError> {
        self.read_words_with_timeout(device, register, buf, self.read_timeout_ms)
    }

    /// Read consecutive 16-bit registers with an explicit timeout
    pub fn read_words_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        buf: &mut [u16],
        timeout_ms: u16,
    ) -> Result<usize, BusError> {
        trace!(
            "I2C ({=u8:#x}) reading {} words from {=u8:#x}",
            device.get(),
            buf.len(),
            register
        );

        let started = self.clock.now_ms();
        let count = buf.len();
        let result = self
            .engine
            .read_register(device, register, count * 2, |i, byte| {
                let word = &mut buf[i / 2];
                if i % 2 == 0 {
                    *word = u16::from(byte) << 8;
                } else {
                    *word |= u16::from(byte);
                }
            })
            .map(|()| count);

        self.check_deadline(started, timeout_ms, count, result)
    }

    /// Read one 8-bit register
    pub fn read_byte(&mut self, device: DeviceAddress, register: u8) -> Result<u8, BusError> {
        self.read_byte_with_timeout(device, register, self.read_timeout_ms)
    }

    /// Read one 8-bit register with an explicit timeout
    pub fn read_byte_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        timeout_ms: u16,
    ) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.read_bytes_with_timeout(device, register, &mut buf, timeout_ms)?;
        Ok(buf[0])
    }

    /// Read one 16-bit register
    pub fn read_word(&mut self, device: DeviceAddress, register: u8) -> Result<u16, BusError> {
        self.read_word_with_timeout(device, register, self.read_timeout_ms)
    }

    /// Read one 16-bit register with an explicit timeout
    pub fn read_word_with_timeout(
        &mut self,
        device: DeviceAddress,
        register: u8,
        timeout_ms: u16,
    ) -> Result<u16, BusError> {
        let mut buf = [0u16; 1];
        self.read_words_with_timeout(device, register, &mut buf, timeout_ms)?;
        Ok(buf[0])
    }

    /// Write consecutive registers in one transaction
    ///
    /// Fails at the first byte the device does not acknowledge.
    pub fn write_bytes(
        &mut self,
        device: DeviceAddress,
        register: u8,
        data: &[u8],
    ) -> Result<(), BusError> {
        trace!(
            "I2C ({=u8:#x}) writing {} bytes to {=u8:#x}",
            device.get(),
            data.len(),
            register
        );
        self.engine
            .write_register(device, register, data.iter().copied())
    }

    /// Write consecutive 16-bit registers, high byte first
    pub fn write_words(
        &mut self,
        device: DeviceAddress,
        register: u8,
        data: &[u16],
    ) -> Result<(), BusError> {
        trace!(
            "I2C ({=u8:#x}) writing {} words to {=u8:#x}",
            device.get(),
            data.len(),
            register
        );
        self.engine
            .write_register(device, register, data.iter().flat_map(|w| w.to_be_bytes()))
    }

    /// Write one 8-bit register
    pub fn write_byte(
        &mut self,
        device: DeviceAddress,
        register: u8,
        value: u8,
    ) -> Result<(), BusError> {
        self.write_bytes(device, register, &[value])
    }

    /// Write one 16-bit register
    pub fn write_word(
        &mut self,
        device: DeviceAddress,
        register: u8,
        value: u16,
    ) -> Result<(), BusError> {
        self.write_words(device, register, &[value])
    }
}
