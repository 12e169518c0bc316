//! Twidev Hardware Abstraction Layer
//!
//! This crate defines the collaborators the Twidev bus engine needs from
//! the chip it runs on. Chip-specific crates implement them against real
//! registers; the core crate's simulator implements them for host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Device drivers (accelerometers, ...)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twidev-core (engine, transfers, fields)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twidev-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ twidev-hal-   │       │ twidev-core   │
//! │     avr       │       │  sim module   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`twi::TwiRegisters`] - TWI control, status, bit-rate and data registers
//! - [`clock::Clock`] - Free-running millisecond counter
//! - [`i2c::I2cBus`] - Generic I2C master operations

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod i2c;
pub mod twi;

// Re-export key traits at crate root for convenience
pub use clock::Clock;
pub use i2c::{BusConfig, I2cBus};
pub use twi::{BusStatus, Direction, TwiRegisters};
