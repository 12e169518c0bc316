//! TWI register access for the ATmega328P
//!
//! SDA and SCL are PC4 and PC5; their PORTC output bits switch the internal
//! pull-ups while the pins are inputs.

use avr_device::atmega328p::{PORTC, TWI};
use twidev_hal::TwiRegisters;

/// PC4 (SDA) and PC5 (SCL)
const PULLUP_MASK: u8 = (1 << 4) | (1 << 5);

/// Owned TWI peripheral
pub struct Atmega328pTwi {
    twi: TWI,
    portc: PORTC,
}

impl Atmega328pTwi {
    /// Take ownership of the TWI block and PORTC
    pub fn new(twi: TWI, portc: PORTC) -> Self {
        Self { twi, portc }
    }

    /// Give the peripherals back
    pub fn free(self) -> (TWI, PORTC) {
        (self.twi, self.portc)
    }
}

impl TwiRegisters for Atmega328pTwi {
    fn write_control(&mut self, value: u8) {
        self.twi.twcr.write(|w| unsafe { w.bits(value) });
    }

    fn read_control(&mut self) -> u8 {
        self.twi.twcr.read().bits()
    }

    fn read_status(&mut self) -> u8 {
        self.twi.twsr.read().bits()
    }

    fn write_status(&mut self, value: u8) {
        self.twi.twsr.write(|w| unsafe { w.bits(value) });
    }

    fn write_bit_rate(&mut self, value: u8) {
        self.twi.twbr.write(|w| unsafe { w.bits(value) });
    }

    fn write_data(&mut self, value: u8) {
        self.twi.twdr.write(|w| unsafe { w.bits(value) });
    }

    fn read_data(&mut self) -> u8 {
        self.twi.twdr.read().bits()
    }

    fn set_pullups(&mut self, enabled: bool) {
        self.portc.portc.modify(|r, w| {
            let bits = if enabled {
                r.bits() | PULLUP_MASK
            } else {
                r.bits() & !PULLUP_MASK
            };
            unsafe { w.bits(bits) }
        });
    }
}
