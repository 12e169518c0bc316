//! Busy-wait TWI bus engine
//!
//! Drives one bus primitive per call (START, address, data byte, STOP)
//! straight through the peripheral's control and status registers. No
//! interrupts are used: after every control write the engine polls the
//! completion flag at most [`SPIN_BUDGET`] times.
//!
//! # Transaction shapes
//!
//! ```text
//! register write:  S | addr+W | reg | data... | P
//! register read:   S | addr+W | reg | Sr | addr+R | data(ACK)... data(NACK) | P
//! ```
//!
//! An address NACK repeats START+address up to [`RETRY_BUDGET`] more times.
//! Every composite transaction ends with STOP, on success and on failure.

use twidev_hal::twi::control::{TWEA, TWEN, TWINT, TWSTA, TWSTO};
use twidev_hal::twi::status;
use twidev_hal::{BusConfig, BusStatus, Direction, TwiRegisters};

use crate::{BusError, DeviceAddress};

/// Completion-flag polls before a bus cycle is declared lost
pub const SPIN_BUDGET: u16 = 250;

/// Extra START+address attempts after an address NACK
pub const RETRY_BUDGET: u8 = 2;

/// START, or repeated START while a transaction is open
const CTRL_START: u8 = TWINT | TWEN | TWSTA;
/// Clock one address or data byte
const CTRL_CLOCK: u8 = TWINT | TWEN;
/// STOP
const CTRL_STOP: u8 = TWINT | TWEN | TWSTO;

/// Map a status the current state did not expect to an error
fn unexpected(raw: u8) -> BusError {
    if raw == status::ARB_LOST {
        BusError::ArbitrationLost
    } else {
        BusError::ProtocolError(raw)
    }
}

/// TWI bus master
///
/// Owns the peripheral registers; every operation takes `&mut self`, so a
/// single caller has the bus for the duration of each transaction.
pub struct BusEngine<R> {
    regs: R,
}

impl<R: TwiRegisters> BusEngine<R> {
    /// Wrap the peripheral registers without touching them
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Configure clock rate and pull-ups, then enable the peripheral
    ///
    /// Fails with [`BusError::InvalidConfig`] without touching any register
    /// when the requested rate has no bit-rate divisor.
    pub fn setup(&mut self, config: &BusConfig) -> Result<(), BusError> {
        let bit_rate = config.bit_rate().ok_or(BusError::InvalidConfig)?;

        self.regs.write_control(0);
        self.regs.set_pullups(config.pullups);
        // Prescaler 1
        self.regs.write_status(0);
        self.regs.write_bit_rate(bit_rate);
        self.regs.write_control(TWEN);

        debug!(
            "TWI enabled at {} kHz (TWBR={}, pullups={})",
            config.frequency_khz,
            bit_rate,
            config.pullups
        );
        Ok(())
    }

    /// Disable the peripheral, abandoning any transaction in progress
    pub fn reset(&mut self) {
        self.regs.write_control(0);
    }

    /// Access the underlying registers
    pub fn registers(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Give the registers back
    pub fn release(self) -> R {
        self.regs
    }

    /// Poll the completion flag
    fn wait_complete(&mut self) -> Result<(), BusError> {
        for _ in 0..SPIN_BUDGET {
            if self.regs.read_control() & TWINT != 0 {
                return Ok(());
            }
        }
        Err(BusError::BusTimeout)
    }

    /// Masked status register
    fn status(&mut self) -> u8 {
        self.regs.read_status() & status::MASK
    }

    /// Issue a START (or repeated START) condition
    pub fn start(&mut self) -> Result<(), BusError> {
        self.regs.write_control(CTRL_START);
        self.wait_complete()?;

        let raw = self.status();
        match raw {
            status::START | status::REP_START => Ok(()),
            _ => Err(unexpected(raw)),
        }
    }

    /// START followed by the address frame, retrying on address NACK
    ///
    /// Only the acknowledge codes of `direction` are accepted; a
    /// transmitter code during a read address phase (or the reverse) is a
    /// protocol error and is not retried.
    pub fn begin(&mut self, address: DeviceAddress, direction: Direction) -> Result<(), BusError> {
        let mut retries = RETRY_BUDGET;
        loop {
            self.start()?;

            self.regs.write_data(address.frame(direction));
            self.regs.write_control(CTRL_CLOCK);
            self.wait_complete()?;

            let raw = self.status();
            match BusStatus::from_raw(raw, direction) {
                BusStatus::AddrAck => return Ok(()),
                BusStatus::AddrNack if retries > 0 => {
                    retries -= 1;
                    debug!("I2C ({=u8:#x}) address NACK, retrying", address.get());
                }
                BusStatus::AddrNack => {
                    debug!("I2C ({=u8:#x}) address NACK, giving up", address.get());
                    return Err(BusError::AddressNack);
                }
                _ => return Err(unexpected(raw)),
            }
        }
    }

    /// Transmit one data byte to the addressed slave
    pub fn send(&mut self, byte: u8) -> Result<(), BusError> {
        self.regs.write_data(byte);
        self.regs.write_control(CTRL_CLOCK);
        self.wait_complete()?;

        let raw = self.status();
        match BusStatus::from_raw(raw, Direction::Write) {
            BusStatus::DataAck => Ok(()),
            BusStatus::DataNack => Err(BusError::DataNack),
            _ => Err(unexpected(raw)),
        }
    }

    /// Clock in one byte from the addressed slave
    ///
    /// With `ack` the master acknowledges, asking for another byte; without
    /// it the master NACKs, which is how the last byte of a read is ended.
    pub fn receive(&mut self, ack: bool) -> Result<u8, BusError> {
        let control = if ack { CTRL_CLOCK | TWEA } else { CTRL_CLOCK };
        self.regs.write_control(control);
        self.wait_complete()?;

        let raw = self.status();
        match BusStatus::from_raw(raw, Direction::Read) {
            BusStatus::DataAck | BusStatus::DataNack => Ok(self.regs.read_data()),
            _ => Err(unexpected(raw)),
        }
    }

    /// Issue a STOP condition
    ///
    /// The peripheral clears the STOP bit once the condition is on the wire;
    /// the flag is polled like any other cycle.
    pub fn stop(&mut self) -> Result<(), BusError> {
        self.regs.write_control(CTRL_STOP);
        for _ in 0..SPIN_BUDGET {
            if self.regs.read_control() & TWSTO == 0 {
                return Ok(());
            }
        }
        Err(BusError::BusTimeout)
    }

    /// End a transaction with STOP, keeping the transaction's own result
    pub(crate) fn finish<T>(&mut self, result: Result<T, BusError>) -> Result<T, BusError> {
        if let Err(e) = &result {
            debug!("I2C transaction failed: {}", e);
        }
        if self.stop().is_err() {
            warn!("I2C STOP did not complete");
        }
        result
    }

    fn transmit<I>(&mut self, address: DeviceAddress, bytes: I) -> Result<(), BusError>
    where
        I: IntoIterator<Item = u8>,
    {
        self.begin(address, Direction::Write)?;
        for byte in bytes {
            self.send(byte)?;
        }
        Ok(())
    }

    fn receive_into<F>(
        &mut self,
        address: DeviceAddress,
        count: usize,
        mut sink: F,
    ) -> Result<(), BusError>
    where
        F: FnMut(usize, u8),
    {
        self.begin(address, Direction::Read)?;
        for i in 0..count {
            let byte = self.receive(i + 1 < count)?;
            sink(i, byte);
        }
        Ok(())
    }

    /// Write `data` to consecutive registers starting at `register`
    ///
    /// One transaction; aborts at the first byte the slave does not ACK.
    pub fn write_register<I>(
        &mut self,
        address: DeviceAddress,
        register: u8,
        data: I,
    ) -> Result<(), BusError>
    where
        I: IntoIterator<Item = u8>,
    {
        let result = self.transmit(address, core::iter::once(register).chain(data));
        self.finish(result)
    }

    /// Read `count` bytes starting at `register`
    ///
    /// Sends the register address, then switches to reading with a repeated
    /// START. Each received byte is handed to `sink` with its index.
    pub fn read_register<F>(
        &mut self,
        address: DeviceAddress,
        register: u8,
        count: usize,
        sink: F,
    ) -> Result<(), BusError>
    where
        F: FnMut(usize, u8),
    {
        let result = self
            .transmit(address, [register])
            .and_then(|()| self.receive_into(address, count, sink));
        self.finish(result)
    }

    /// Plain write transaction
    pub fn write(&mut self, address: DeviceAddress, data: &[u8]) -> Result<(), BusError> {
        let result = self.transmit(address, data.iter().copied());
        self.finish(result)
    }

    /// Plain read transaction
    pub fn read(&mut self, address: DeviceAddress, buf: &mut [u8]) -> Result<(), BusError> {
        let result = self.receive_into(address, buf.len(), |i, byte| buf[i] = byte);
        self.finish(result)
    }

    /// Write then read with a repeated START in between
    pub fn write_read(
        &mut self,
        address: DeviceAddress,
        data: &[u8],
        buf: &mut [u8],
    ) -> Result<(), BusError> {
        let result = self
            .transmit(address, data.iter().copied())
            .and_then(|()| self.receive_into(address, buf.len(), |i, byte| buf[i] = byte));
        self.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDevice, SimTwi, WireEvent};

    const DEV: u8 = 0x68;

    fn addr() -> DeviceAddress {
        DeviceAddress::new(DEV).unwrap()
    }

    fn engine_with(device: SimDevice) -> BusEngine<SimTwi> {
        let mut engine = BusEngine::new(SimTwi::new().with_device(device));
        engine.setup(&BusConfig::STANDARD).unwrap();
        engine
    }

    #[test]
    fn test_setup_programs_registers() {
        let mut engine = BusEngine::new(SimTwi::new());
        engine.setup(&BusConfig::FAST.with_pullups()).unwrap();

        let twi = engine.registers();
        assert!(twi.is_enabled());
        assert!(twi.pullups());
        assert_eq!(twi.bit_rate(), 12);
        assert_eq!(twi.prescaler(), 0);
    }

    #[test]
    fn test_setup_rejects_bad_rate() {
        let mut engine = BusEngine::new(SimTwi::new());
        let config = BusConfig {
            frequency_khz: 0,
            ..BusConfig::STANDARD
        };

        assert_eq!(engine.setup(&config), Err(BusError::InvalidConfig));
        assert!(!engine.registers().is_enabled());
    }

    #[test]
    fn test_reset_disables() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.reset();
        assert!(!engine.registers().is_enabled());
    }

    #[test]
    fn test_register_write_wire_sequence() {
        let mut engine = engine_with(SimDevice::new(DEV));

        engine.write_register(addr(), 0x6B, [0x01, 0x02]).unwrap();

        assert_eq!(
            engine.registers().wire_log(),
            &[
                WireEvent::Start,
                WireEvent::Address { frame: 0xD0, acked: true },
                WireEvent::Write { byte: 0x6B, acked: true },
                WireEvent::Write { byte: 0x01, acked: true },
                WireEvent::Write { byte: 0x02, acked: true },
                WireEvent::Stop,
            ]
        );
        let twi = engine.release();
        assert_eq!(twi.device(DEV).unwrap().register(0x6B), 0x01);
        assert_eq!(twi.device(DEV).unwrap().register(0x6C), 0x02);
    }

    #[test]
    fn test_register_read_acks_all_but_last() {
        let mut engine =
            engine_with(SimDevice::new(DEV).with_registers(0x3B, &[0x11, 0x22, 0x33]));
        let mut buf = [0u8; 3];

        engine
            .read_register(addr(), 0x3B, buf.len(), |i, b| buf[i] = b)
            .unwrap();

        assert_eq!(buf, [0x11, 0x22, 0x33]);
        assert_eq!(
            engine.registers().wire_log(),
            &[
                WireEvent::Start,
                WireEvent::Address { frame: 0xD0, acked: true },
                WireEvent::Write { byte: 0x3B, acked: true },
                WireEvent::RepeatedStart,
                WireEvent::Address { frame: 0xD1, acked: true },
                WireEvent::Read { byte: 0x11, acked: true },
                WireEvent::Read { byte: 0x22, acked: true },
                WireEvent::Read { byte: 0x33, acked: false },
                WireEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_address_nack_retries_then_succeeds() {
        let mut engine =
            engine_with(SimDevice::new(DEV).nack_address(2).with_register(0x75, 0x68));
        let mut buf = [0u8; 1];

        engine.read(addr(), &mut buf).unwrap();
        engine.write_read(addr(), &[0x75], &mut buf).unwrap();

        assert_eq!(buf, [0x68]);
    }

    #[test]
    fn test_address_nack_exhausts_budget() {
        let mut engine = engine_with(SimDevice::new(DEV).nack_address(u8::MAX));

        let result = engine.write_register(addr(), 0x6B, [0x00]);

        assert_eq!(result, Err(BusError::AddressNack));
        let log = engine.registers().wire_log();
        let attempts = log
            .iter()
            .filter(|e| matches!(e, WireEvent::Address { .. }))
            .count();
        assert_eq!(attempts, 1 + RETRY_BUDGET as usize);
        // No data phase was attempted and the bus was released
        assert!(!log.iter().any(|e| matches!(e, WireEvent::Write { .. })));
        assert_eq!(log.last(), Some(&WireEvent::Stop));
    }

    #[test]
    fn test_absent_device() {
        let mut engine = engine_with(SimDevice::new(DEV));
        let other = DeviceAddress::new(0x69).unwrap();

        assert_eq!(engine.write(other, &[0x00]), Err(BusError::AddressNack));
    }

    #[test]
    fn test_data_nack_aborts_write() {
        let mut engine = engine_with(SimDevice::new(DEV).nack_writes_after(2));

        let result = engine.write_register(addr(), 0x10, [0xAA, 0xBB, 0xCC]);

        assert_eq!(result, Err(BusError::DataNack));
        let writes = engine
            .registers()
            .wire_log()
            .iter()
            .filter(|e| matches!(e, WireEvent::Write { .. }))
            .count();
        // Register pointer and first byte accepted, second NACKed, third never sent
        assert_eq!(writes, 3);
    }

    #[test]
    fn test_stalled_bus_times_out() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.registers().set_stalled(true);
        let before = engine.registers().control_reads();

        assert_eq!(engine.start(), Err(BusError::BusTimeout));

        let polls = engine.registers().control_reads() - before;
        assert_eq!(polls, SPIN_BUDGET as u32);
    }

    #[test]
    fn test_stalled_read_delivers_nothing() {
        let mut engine = engine_with(SimDevice::new(DEV).with_register(0x00, 0x42));
        engine.registers().set_stalled(true);
        let mut buf = [0u8; 2];

        let result = engine.read_register(addr(), 0x00, buf.len(), |i, b| buf[i] = b);

        assert_eq!(result, Err(BusError::BusTimeout));
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn test_stop_timeout_reported() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.registers().set_stalled(true);

        assert_eq!(engine.stop(), Err(BusError::BusTimeout));
    }

    #[test]
    fn test_unexpected_start_status() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.registers().force_next_status(status::MT_DATA_ACK);

        assert_eq!(
            engine.start(),
            Err(BusError::ProtocolError(status::MT_DATA_ACK))
        );
    }

    #[test]
    fn test_arbitration_lost_detected() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.registers().force_next_status(status::ARB_LOST);

        assert_eq!(
            engine.write_register(addr(), 0x00, [0x00]),
            Err(BusError::ArbitrationLost)
        );
    }

    #[test]
    fn test_receive_rejects_transmitter_status() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.begin(addr(), Direction::Read).unwrap();
        engine.registers().force_next_status(status::MT_SLA_ACK);

        assert_eq!(
            engine.receive(false),
            Err(BusError::ProtocolError(status::MT_SLA_ACK))
        );
    }

    #[test]
    fn test_receive_rejects_transmitter_data_status() {
        let mut engine = engine_with(SimDevice::new(DEV).with_register(0x00, 0x42));
        engine.begin(addr(), Direction::Read).unwrap();
        engine.registers().force_next_status(status::MT_DATA_ACK);

        assert_eq!(
            engine.receive(false),
            Err(BusError::ProtocolError(status::MT_DATA_ACK))
        );
    }

    #[test]
    fn test_send_rejects_receiver_data_status() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.begin(addr(), Direction::Write).unwrap();
        engine.registers().force_next_status(status::MR_DATA_ACK);

        assert_eq!(
            engine.send(0x00),
            Err(BusError::ProtocolError(status::MR_DATA_ACK))
        );
    }

    #[test]
    fn test_read_address_rejects_transmitter_ack() {
        let mut engine = engine_with(SimDevice::new(DEV));
        // START completes normally, the address cycle reports MT_SLA_ACK
        engine.registers().force_status_after(1, status::MT_SLA_ACK);

        assert_eq!(
            engine.begin(addr(), Direction::Read),
            Err(BusError::ProtocolError(status::MT_SLA_ACK))
        );
    }

    #[test]
    fn test_wrong_direction_nack_not_retried() {
        let mut engine = engine_with(SimDevice::new(DEV));
        engine.registers().force_status_after(1, status::MR_SLA_NACK);

        assert_eq!(
            engine.begin(addr(), Direction::Write),
            Err(BusError::ProtocolError(status::MR_SLA_NACK))
        );
        let attempts = engine
            .registers()
            .wire_log()
            .iter()
            .filter(|e| matches!(e, WireEvent::Address { .. }))
            .count();
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_primitives_build_transaction() {
        let mut engine = engine_with(SimDevice::new(DEV));

        engine.begin(addr(), Direction::Write).unwrap();
        engine.send(0x20).unwrap();
        engine.send(0x7F).unwrap();
        engine.stop().unwrap();

        let twi = engine.release();
        assert_eq!(twi.device(DEV).unwrap().register(0x20), 0x7F);
        assert!(!twi.bus_active());
    }
}
