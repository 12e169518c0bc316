//! Two-wire serial interface (TWI) register abstraction
//!
//! The bus engine drives the peripheral exclusively through
//! [`TwiRegisters`]. Bit positions and status codes follow the AVR TWI
//! peripheral, which is what most register-level I2C masters of this
//! shape are modelled on.

/// Control register bits
pub mod control {
    /// Operation complete flag (write 1 to clear and start the next cycle)
    pub const TWINT: u8 = 1 << 7;
    /// Enable acknowledge generation
    pub const TWEA: u8 = 1 << 6;
    /// Generate a START condition
    pub const TWSTA: u8 = 1 << 5;
    /// Generate a STOP condition
    pub const TWSTO: u8 = 1 << 4;
    /// Write collision flag
    pub const TWWC: u8 = 1 << 3;
    /// Enable the peripheral
    pub const TWEN: u8 = 1 << 2;
    /// Interrupt enable (never set by the engine)
    pub const TWIE: u8 = 1 << 0;
}

/// Raw status codes (status register masked with [`status::MASK`])
pub mod status {
    /// Prescaler bits live in the low three bits of the status register
    pub const MASK: u8 = 0xF8;

    /// START transmitted
    pub const START: u8 = 0x08;
    /// Repeated START transmitted
    pub const REP_START: u8 = 0x10;

    /// Master transmitter: address+W sent, ACK received
    pub const MT_SLA_ACK: u8 = 0x18;
    /// Master transmitter: address+W sent, NACK received
    pub const MT_SLA_NACK: u8 = 0x20;
    /// Master transmitter: data sent, ACK received
    pub const MT_DATA_ACK: u8 = 0x28;
    /// Master transmitter: data sent, NACK received
    pub const MT_DATA_NACK: u8 = 0x30;

    /// Arbitration lost (both transmitter and receiver modes)
    pub const ARB_LOST: u8 = 0x38;

    /// Master receiver: address+R sent, ACK received
    pub const MR_SLA_ACK: u8 = 0x40;
    /// Master receiver: address+R sent, NACK received
    pub const MR_SLA_NACK: u8 = 0x48;
    /// Master receiver: data received, ACK returned
    pub const MR_DATA_ACK: u8 = 0x50;
    /// Master receiver: data received, NACK returned
    pub const MR_DATA_NACK: u8 = 0x58;
}

/// Transfer direction, sent as bit 0 of the address frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    /// Master writes to the slave
    Write = 0,
    /// Master reads from the slave
    Read = 1,
}

/// Classified bus status after a completed bus cycle
///
/// Derived from the status register every time the operation-complete
/// flag is observed; never stored. Acknowledge codes are direction
/// specific: a transmitter code seen while receiving (or the reverse) is
/// [`BusStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusStatus {
    /// START condition transmitted
    Start,
    /// Repeated START condition transmitted
    RepeatedStart,
    /// Address frame acknowledged
    AddrAck,
    /// Address frame not acknowledged
    AddrNack,
    /// Data byte acknowledged
    DataAck,
    /// Data byte not acknowledged
    DataNack,
    /// Another master won the bus
    ArbitrationLost,
    /// Any code that does not apply to the current direction (masked raw value)
    Unknown(u8),
}

impl BusStatus {
    /// Classify a raw status register value for a transfer in `direction`
    ///
    /// The prescaler bits are masked off before matching. START and
    /// arbitration codes are shared by both directions.
    pub fn from_raw(raw: u8, direction: Direction) -> Self {
        match (raw & status::MASK, direction) {
            (status::START, _) => BusStatus::Start,
            (status::REP_START, _) => BusStatus::RepeatedStart,
            (status::ARB_LOST, _) => BusStatus::ArbitrationLost,
            (status::MT_SLA_ACK, Direction::Write) | (status::MR_SLA_ACK, Direction::Read) => {
                BusStatus::AddrAck
            }
            (status::MT_SLA_NACK, Direction::Write) | (status::MR_SLA_NACK, Direction::Read) => {
                BusStatus::AddrNack
            }
            (status::MT_DATA_ACK, Direction::Write) | (status::MR_DATA_ACK, Direction::Read) => {
                BusStatus::DataAck
            }
            (status::MT_DATA_NACK, Direction::Write) | (status::MR_DATA_NACK, Direction::Read) => {
                BusStatus::DataNack
            }
            (other, _) => BusStatus::Unknown(other),
        }
    }
}

/// TWI peripheral registers
///
/// The engine assumes it is the only user of these registers. Implementations
/// are plain register reads and writes; no sequencing logic belongs here.
pub trait TwiRegisters {
    /// Write the control register
    fn write_control(&mut self, value: u8);

    /// Read the control register
    fn read_control(&mut self) -> u8;

    /// Read the status register (unmasked)
    fn read_status(&mut self) -> u8;

    /// Write the status register (only the prescaler bits are writable)
    fn write_status(&mut self, value: u8);

    /// Write the bit-rate divisor register
    fn write_bit_rate(&mut self, value: u8);

    /// Write the data register
    fn write_data(&mut self, value: u8);

    /// Read the data register
    fn read_data(&mut self) -> u8;

    /// Enable or disable the internal pull-ups on SDA and SCL
    fn set_pullups(&mut self, enabled: bool);
}

impl<T: TwiRegisters + ?Sized> TwiRegisters for &mut T {
    fn write_control(&mut self, value: u8) {
        (**self).write_control(value)
    }

    fn read_control(&mut self) -> u8 {
        (**self).read_control()
    }

    fn read_status(&mut self) -> u8 {
        (**self).read_status()
    }

    fn write_status(&mut self, value: u8) {
        (**self).write_status(value)
    }

    fn write_bit_rate(&mut self, value: u8) {
        (**self).write_bit_rate(value)
    }

    fn write_data(&mut self, value: u8) {
        (**self).write_data(value)
    }

    fn read_data(&mut self) -> u8 {
        (**self).read_data()
    }

    fn set_pullups(&mut self, enabled: bool) {
        (**self).set_pullups(enabled)
    }
}
