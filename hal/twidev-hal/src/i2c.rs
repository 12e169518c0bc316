//! I2C bus abstractions
//!
//! Provides the generic I2C master trait that device drivers can target,
//! and the bus configuration used when bringing the peripheral up.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// I2C bus master
///
/// Provides basic I2C read/write operations for communicating with
/// peripheral devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a register address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}

/// Bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// SCL frequency in kHz
    pub frequency_khz: u16,
    /// Enable the internal pull-ups on SDA/SCL
    pub pullups: bool,
    /// CPU clock feeding the bit-rate generator, in Hz
    pub cpu_frequency_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl BusConfig {
    /// Standard mode (100 kHz) on a 16 MHz part
    pub const STANDARD: Self = Self {
        frequency_khz: 100,
        pullups: false,
        cpu_frequency_hz: 16_000_000,
    };

    /// Fast mode (400 kHz) on a 16 MHz part
    pub const FAST: Self = Self {
        frequency_khz: 400,
        pullups: false,
        cpu_frequency_hz: 16_000_000,
    };

    /// Same configuration with the internal pull-ups switched on
    pub const fn with_pullups(mut self) -> Self {
        self.pullups = true;
        self
    }

    /// Bit-rate register value for a prescaler of 1
    ///
    /// SCL = CPU / (16 + 2 * TWBR), so TWBR = (CPU / SCL - 16) / 2.
    /// Returns `None` when the requested frequency is zero, faster than
    /// the CPU can generate, or too slow to fit the 8-bit divisor.
    pub fn bit_rate(&self) -> Option<u8> {
        if self.frequency_khz == 0 {
            return None;
        }
        let cpu_khz = self.cpu_frequency_hz / 1000;
        let divider = cpu_khz / self.frequency_khz as u32;
        let twbr = divider.checked_sub(16)? / 2;
        u8::try_from(twbr).ok()
    }
}
