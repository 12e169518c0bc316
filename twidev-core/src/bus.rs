//! Generic I2C master traits for the bus engine
//!
//! Lets drivers written against [`twidev_hal::I2cBus`] or
//! [`embedded_hal::i2c::I2c`] run on the engine unchanged. Raw addresses
//! wider than 7 bits are rejected with [`BusError::InvalidAddress`] before
//! any bus traffic.

use embedded_hal::i2c::{ErrorType, I2c, Operation};
use twidev_hal::{Direction, I2cBus, TwiRegisters};

use crate::engine::BusEngine;
use crate::{BusError, DeviceAddress};

impl<R: TwiRegisters> I2cBus for BusEngine<R> {
    type Error = BusError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        let address = DeviceAddress::try_from(address)?;
        BusEngine::write(self, address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let address = DeviceAddress::try_from(address)?;
        BusEngine::read(self, address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        let address = DeviceAddress::try_from(address)?;
        BusEngine::write_read(self, address, write_data, read_buf)
    }
}

impl<R: TwiRegisters> ErrorType for BusEngine<R> {
    type Error = BusError;
}

/// Whether the read run containing `operations[index]` receives more bytes
/// after it
///
/// Empty reads are skipped; any write ends the run.
fn read_continues(operations: &[Operation<'_>], index: usize) -> bool {
    for operation in &operations[index + 1..] {
        match operation {
            Operation::Read(buf) if buf.is_empty() => continue,
            Operation::Read(_) => return true,
            Operation::Write(_) => return false,
        }
    }
    false
}

impl<R: TwiRegisters> BusEngine<R> {
    /// Run a sequence of operations inside one START..STOP frame
    ///
    /// Adjacent operations of the same direction share one address frame; a
    /// direction change issues a repeated START. The master NACKs only the
    /// final byte of a run of reads.
    fn run_operations(
        &mut self,
        address: DeviceAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        if operations.is_empty() {
            // Address-only probe
            return self.begin(address, Direction::Write);
        }

        let mut direction = None;
        for i in 0..operations.len() {
            let read_follows = read_continues(operations, i);
            match &mut operations[i] {
                Operation::Write(data) => {
                    if direction != Some(Direction::Write) {
                        self.begin(address, Direction::Write)?;
                        direction = Some(Direction::Write);
                    }
                    for &byte in data.iter() {
                        self.send(byte)?;
                    }
                }
                Operation::Read(buf) => {
                    if direction != Some(Direction::Read) {
                        self.begin(address, Direction::Read)?;
                        direction = Some(Direction::Read);
                    }
                    let len = buf.len();
                    for (j, slot) in buf.iter_mut().enumerate() {
                        let last = j + 1 == len && !read_follows;
                        *slot = self.receive(!last)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<R: TwiRegisters> I2c for BusEngine<R> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let address = DeviceAddress::try_from(address)?;
        let result = self.run_operations(address, operations);
        self.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDevice, SimTwi, WireEvent};
    use twidev_hal::BusConfig;

    const DEV: u8 = 0x50;

    fn engine_with(device: SimDevice) -> BusEngine<SimTwi> {
        let mut engine = BusEngine::new(SimTwi::new().with_device(device));
        engine.setup(&BusConfig::STANDARD).unwrap();
        engine
    }

    #[test]
    fn test_i2c_bus_write_read() {
        let mut engine = engine_with(SimDevice::new(DEV).with_registers(0x08, &[0xDE, 0xAD]));
        let mut buf = [0u8; 2];

        I2cBus::write_read(&mut engine, DEV, &[0x08], &mut buf).unwrap();
        assert_eq!(buf, [0xDE, 0xAD]);

        I2cBus::write(&mut engine, DEV, &[0x08, 0x01]).unwrap();
        I2cBus::read(&mut engine, DEV, &mut buf).unwrap();
        // Pointer left after the written byte
        assert_eq!(buf, [0xAD, 0x00]);
    }

    #[test]
    fn test_wide_address_rejected() {
        let mut engine = engine_with(SimDevice::new(DEV));
        let mut buf = [0u8; 1];

        assert_eq!(
            I2cBus::read(&mut engine, 0xA0, &mut buf),
            Err(BusError::InvalidAddress)
        );
        assert_eq!(
            I2c::write(&mut engine, 0x80, &[0x00]),
            Err(BusError::InvalidAddress)
        );
        assert!(engine.registers().wire_log().is_empty());
    }

    #[test]
    fn test_transaction_merges_same_direction() {
        let mut engine = engine_with(SimDevice::new(DEV).with_registers(0x10, &[1, 2, 3]));
        let mut first = [0u8; 1];
        let mut rest = [0u8; 2];

        engine
            .transaction(
                DEV,
                &mut [
                    Operation::Write(&[0x10]),
                    Operation::Read(&mut first),
                    Operation::Read(&mut rest),
                ],
            )
            .unwrap();

        assert_eq!((first, rest), ([1], [2, 3]));
        assert_eq!(
            engine.registers().wire_log(),
            &[
                WireEvent::Start,
                WireEvent::Address { frame: 0xA0, acked: true },
                WireEvent::Write { byte: 0x10, acked: true },
                WireEvent::RepeatedStart,
                WireEvent::Address { frame: 0xA1, acked: true },
                WireEvent::Read { byte: 1, acked: true },
                WireEvent::Read { byte: 2, acked: true },
                WireEvent::Read { byte: 3, acked: false },
                WireEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_trailing_empty_read_still_nacks_last_byte() {
        let mut engine = engine_with(SimDevice::new(DEV).with_registers(0x00, &[1, 2]));
        let mut buf = [0u8; 2];

        engine
            .transaction(DEV, &mut [Operation::Read(&mut buf), Operation::Read(&mut [])])
            .unwrap();

        assert_eq!(buf, [1, 2]);
        assert_eq!(
            engine.registers().wire_log(),
            &[
                WireEvent::Start,
                WireEvent::Address { frame: 0xA1, acked: true },
                WireEvent::Read { byte: 1, acked: true },
                WireEvent::Read { byte: 2, acked: false },
                WireEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_empty_read_inside_run_keeps_acking() {
        let mut engine = engine_with(SimDevice::new(DEV).with_registers(0x00, &[1, 2, 3]));
        let mut first = [0u8; 1];
        let mut rest = [0u8; 2];

        engine
            .transaction(
                DEV,
                &mut [
                    Operation::Read(&mut first),
                    Operation::Read(&mut []),
                    Operation::Read(&mut rest),
                ],
            )
            .unwrap();

        assert_eq!((first, rest), ([1], [2, 3]));
        let acks: heapless::Vec<bool, 8> = engine
            .registers()
            .wire_log()
            .iter()
            .filter_map(|e| match e {
                WireEvent::Read { acked, .. } => Some(*acked),
                _ => None,
            })
            .collect();
        assert_eq!(acks.as_slice(), &[true, true, false]);
    }

    #[test]
    fn test_read_before_write_nacked() {
        let mut engine = engine_with(SimDevice::new(DEV).with_registers(0x00, &[7, 8]));
        let mut buf = [0u8; 2];

        engine
            .transaction(DEV, &mut [Operation::Read(&mut buf), Operation::Write(&[0x05])])
            .unwrap();

        assert_eq!(buf, [7, 8]);
        let log = engine.registers().wire_log();
        assert_eq!(log[3], WireEvent::Read { byte: 8, acked: false });
        assert_eq!(log[4], WireEvent::RepeatedStart);
    }

    #[test]
    fn test_transaction_write_write() {
        let mut engine = engine_with(SimDevice::new(DEV));

        engine
            .transaction(DEV, &mut [Operation::Write(&[0x20]), Operation::Write(&[0xAA, 0xBB])])
            .unwrap();

        let twi = engine.release();
        let device = twi.device(DEV).unwrap();
        assert_eq!(device.register(0x20), 0xAA);
        assert_eq!(device.register(0x21), 0xBB);
        let starts = twi
            .wire_log()
            .iter()
            .filter(|e| matches!(e, WireEvent::Start | WireEvent::RepeatedStart))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_empty_transaction_probes() {
        let mut engine = engine_with(SimDevice::new(DEV));

        assert!(engine.transaction(DEV, &mut []).is_ok());
        assert_eq!(
            engine.transaction(0x51, &mut []),
            Err(BusError::AddressNack)
        );
        assert!(!engine.registers().bus_active());
    }

    #[test]
    fn test_transaction_error_releases_bus() {
        let mut engine = engine_with(SimDevice::new(DEV).nack_writes_after(1));

        let result = I2c::write(&mut engine, DEV, &[0x00, 0x01, 0x02]);

        assert_eq!(result, Err(BusError::DataNack));
        assert_eq!(engine.registers().wire_log().last(), Some(&WireEvent::Stop));
        assert!(!engine.registers().bus_active());
    }
}
