//! Bus error taxonomy

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Errors reported by the bus engine and the layers above it
///
/// Every failure is returned to the caller; nothing is retried beyond the
/// engine's address-phase retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Operation-complete flag not seen within the spin budget
    BusTimeout,
    /// Unexpected status code for the current state (masked raw value)
    ProtocolError(u8),
    /// Slave did not acknowledge its address after all retries
    AddressNack,
    /// Slave did not acknowledge a data byte during a write
    DataNack,
    /// Another master won arbitration
    ArbitrationLost,
    /// Read did not complete within the millisecond timeout
    TransferTimeout,
    /// Bit number or (bit_start, length) pair does not fit the register
    InvalidField,
    /// Address does not fit in 7 bits
    InvalidAddress,
    /// Bus configuration has no valid bit-rate divisor
    InvalidConfig,
}

impl BusError {
    /// True for the two not-acknowledge failures
    pub fn is_nack(&self) -> bool {
        matches!(self, BusError::AddressNack | BusError::DataNack)
    }

    /// True for the spin-budget and millisecond timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::BusTimeout | BusError::TransferTimeout)
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            BusError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            BusError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            BusError::ProtocolError(_) => ErrorKind::Bus,
            BusError::BusTimeout
            | BusError::TransferTimeout
            | BusError::InvalidField
            | BusError::InvalidAddress
            | BusError::InvalidConfig => ErrorKind::Other,
        }
    }
}
