//! ATmega328P HAL for the Twidev I2C master
//!
//! Implements the `twidev-hal` traits on top of the `avr-device` register
//! blocks:
//!
//! - [`Atmega328pTwi`] - TWI control/status/bit-rate/data registers and the
//!   SDA/SCL pull-ups on PORTC
//! - [`Timer2Millis`] - Millisecond counter driven by the Timer2 compare
//!   interrupt
//!
//! Global interrupts must be enabled (`avr_device::interrupt::enable`)
//! before the millisecond counter advances.

#![no_std]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

pub mod millis;
pub mod twi;

pub use millis::Timer2Millis;
pub use twi::Atmega328pTwi;

// Re-export shared traits from twidev-hal for convenience
pub use twidev_hal::{Clock, TwiRegisters};
