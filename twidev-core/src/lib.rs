//! Twidev Core
//!
//! Register-level I2C master for microcontroller TWI peripherals. The bus
//! is driven by polling the peripheral's completion flag after each
//! primitive, so no interrupts are required and every wait is bounded.
//!
//! # Layers
//!
//! - [`engine`] - START, address, data byte and STOP primitives with spin
//!   and retry budgets, plus whole register transactions
//! - [`transfer`] - Byte and word register reads/writes with millisecond
//!   read timeouts
//! - [`accessor`] - Bit and bit-field read-modify-write on 8- and 16-bit
//!   registers
//! - [`bus`] - [`twidev_hal::I2cBus`] and `embedded-hal` I2C trait impls
//!
//! The register and clock collaborators come from `twidev-hal`; enable the
//! `sim` feature for a simulated peripheral to test drivers on the host.

#![no_std]
#![deny(unsafe_code)]

// Logging macros; must precede the modules that use them
#[macro_use]
mod fmt;

pub mod accessor;
pub mod address;
pub mod bus;
pub mod device;
pub mod engine;
pub mod error;
pub mod field;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod transfer;

pub use address::DeviceAddress;
pub use device::{I2cDev, DEFAULT_READ_TIMEOUT_MS};
pub use engine::{BusEngine, RETRY_BUDGET, SPIN_BUDGET};
pub use error::BusError;
pub use field::FieldSpec;
