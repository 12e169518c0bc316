//! Bus session
//!
//! [`I2cDev`] bundles the bus engine with the millisecond clock and the
//! default read timeout. Transfer and field operations are implemented on
//! it in the [`transfer`](crate::transfer) and [`accessor`](crate::accessor)
//! modules.

use twidev_hal::{BusConfig, Clock, TwiRegisters};

use crate::engine::BusEngine;
use crate::BusError;

/// Read timeout used until [`I2cDev::set_read_timeout`] is called
pub const DEFAULT_READ_TIMEOUT_MS: u16 = 1000;

/// I2C master session
///
/// # Example
///
/// ```ignore
/// let mut dev = I2cDev::new(twi, clock);
/// dev.setup(&BusConfig::FAST)?;
///
/// let mpu = DeviceAddress::new(0x68).unwrap();
/// // Wake up: clear SLEEP (bit 6 of PWR_MGMT_1)
/// dev.write_bit(mpu, 0x6B, 6, false)?;
/// let accel_x = dev.read_word(mpu, 0x3B)?;
/// ```
pub struct I2cDev<R, C> {
    pub(crate) engine: BusEngine<R>,
    pub(crate) clock: C,
    pub(crate) read_timeout_ms: u16,
}

impl<R: TwiRegisters, C: Clock> I2cDev<R, C> {
    /// Create a session over the given registers and clock
    ///
    /// The peripheral is left untouched; call [`setup`](Self::setup) before
    /// the first transfer.
    pub fn new(registers: R, clock: C) -> Self {
        Self::from_engine(BusEngine::new(registers), clock)
    }

    /// Create a session around an existing engine
    pub fn from_engine(engine: BusEngine<R>, clock: C) -> Self {
        Self {
            engine,
            clock,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }

    /// Configure clock rate and pull-ups and enable the bus
    pub fn setup(&mut self, config: &BusConfig) -> Result<(), BusError> {
        self.engine.setup(config)
    }

    /// Disable the peripheral
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Emit a STOP condition, e.g. to release a bus left open by a crash
    pub fn stop(&mut self) -> Result<(), BusError> {
        self.engine.stop()
    }

    /// Default read timeout in milliseconds (0 = disabled)
    pub fn read_timeout(&self) -> u16 {
        self.read_timeout_ms
    }

    /// Change the default read timeout; 0 disables the check
    pub fn set_read_timeout(&mut self, timeout_ms: u16) {
        self.read_timeout_ms = timeout_ms;
    }

    /// Run `f` with a different default read timeout, restoring it afterwards
    pub fn with_read_timeout<T>(&mut self, timeout_ms: u16, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = core::mem::replace(&mut self.read_timeout_ms, timeout_ms);
        let result = f(self);
        self.read_timeout_ms = saved;
        result
    }

    /// Direct access to the engine, for hand-built transactions
    pub fn engine_mut(&mut self) -> &mut BusEngine<R> {
        &mut self.engine
    }

    /// The session clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Tear the session down and return its parts
    pub fn release(self) -> (R, C) {
        (self.engine.release(), self.clock)
    }
}
