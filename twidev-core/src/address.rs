//! 7-bit device addresses

use twidev_hal::Direction;

use crate::BusError;

/// 7-bit I2C slave address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Highest valid 7-bit address
    pub const MAX: u8 = 0x7F;

    /// Create an address, rejecting values that do not fit in 7 bits
    pub const fn new(address: u8) -> Option<Self> {
        if address > Self::MAX {
            None
        } else {
            Some(Self(address))
        }
    }

    /// The raw 7-bit address
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Address frame as sent on the wire: address in bits 7..1, R/W in bit 0
    pub const fn frame(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction as u8
    }
}

impl TryFrom<u8> for DeviceAddress {
    type Error = BusError;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        Self::new(address).ok_or(BusError::InvalidAddress)
    }
}

impl From<DeviceAddress> for u8 {
    fn from(address: DeviceAddress) -> u8 {
        address.0
    }
}
