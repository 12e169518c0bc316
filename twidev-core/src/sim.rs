//! Simulated TWI peripheral and clock
//!
//! [`SimTwi`] models the TWI register interface closely enough for the bus
//! engine to run unmodified: writing the control register performs one bus
//! cycle against the attached [`SimDevice`]s and raises the completion flag
//! immediately. Each device is a 256-byte register file with an
//! auto-incrementing register pointer, the layout most sensor chips use.
//!
//! Faults can be injected: address NACKs, data NACKs after a number of
//! accepted bytes, a forced status code, or a stalled peripheral that never
//! completes a cycle.

use core::cell::Cell;

use heapless::Vec;
use twidev_hal::twi::control::{TWEA, TWEN, TWINT, TWSTA, TWSTO};
use twidev_hal::twi::status;
use twidev_hal::{Clock, TwiRegisters};

/// Maximum number of simulated slaves on one bus
pub const MAX_DEVICES: usize = 4;

/// Number of wire events kept; later events are dropped once full
pub const WIRE_LOG_LEN: usize = 256;

/// Status code when no bus state applies
const NO_INFO: u8 = 0xF8;

/// One observable event on the simulated wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEvent {
    /// START condition
    Start,
    /// Repeated START condition
    RepeatedStart,
    /// STOP condition
    Stop,
    /// Address frame and whether a slave acknowledged it
    Address { frame: u8, acked: bool },
    /// Byte written by the master and whether the slave acknowledged it
    Write { byte: u8, acked: bool },
    /// Byte read by the master and whether the master acknowledged it
    Read { byte: u8, acked: bool },
}

/// Simulated slave with a 256-byte register file
#[derive(Debug, Clone)]
pub struct SimDevice {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
    address_nacks: u8,
    write_limit: Option<usize>,
    written: usize,
}

impl SimDevice {
    /// Create a device answering at `address` with all registers zero
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
            address_nacks: 0,
            write_limit: None,
            written: 0,
        }
    }

    /// Preset one register
    pub fn with_register(mut self, register: u8, value: u8) -> Self {
        self.registers[register as usize] = value;
        self
    }

    /// Preset consecutive registers starting at `start` (wrapping at 0xFF)
    pub fn with_registers(mut self, start: u8, values: &[u8]) -> Self {
        let mut register = start;
        for &value in values {
            self.registers[register as usize] = value;
            register = register.wrapping_add(1);
        }
        self
    }

    /// NACK the next `count` address frames; `u8::MAX` NACKs forever
    pub fn nack_address(mut self, count: u8) -> Self {
        self.address_nacks = count;
        self
    }

    /// Accept only `accepted` bytes per write transaction (register pointer
    /// included) and NACK the rest
    pub fn nack_writes_after(mut self, accepted: usize) -> Self {
        self.write_limit = Some(accepted);
        self
    }

    /// The device's 7-bit address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current value of a register
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Overwrite a register
    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[register as usize] = value;
    }

    /// Current register pointer
    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    fn accept_address(&mut self) -> bool {
        match self.address_nacks {
            0 => true,
            u8::MAX => false,
            _ => {
                self.address_nacks -= 1;
                false
            }
        }
    }

    fn write(&mut self, byte: u8) -> bool {
        if let Some(limit) = self.write_limit {
            if self.written >= limit {
                return false;
            }
        }
        if self.written == 0 {
            self.pointer = byte;
        } else {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.written += 1;
        true
    }

    fn read(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusState {
    /// No slave selected
    Idle,
    /// START sent, next cycle transmits the address frame
    Addressing,
    /// Master transmitter talking to device at index
    Transmitting(usize),
    /// Master receiver talking to device at index
    Receiving(usize),
}

/// Simulated TWI peripheral
#[derive(Debug)]
pub struct SimTwi {
    control: u8,
    status: u8,
    data: u8,
    bit_rate: u8,
    prescaler: u8,
    pullups: bool,
    state: BusState,
    active: bool,
    stalled: bool,
    /// Completed cycles to let pass, then the status to report instead
    forced_status: Option<(u16, u8)>,
    control_reads: u32,
    devices: Vec<SimDevice, MAX_DEVICES>,
    log: Vec<WireEvent, WIRE_LOG_LEN>,
}

impl Default for SimTwi {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTwi {
    /// Create a disabled peripheral with no slaves attached
    pub fn new() -> Self {
        Self {
            control: 0,
            status: NO_INFO,
            data: 0xFF,
            bit_rate: 0,
            prescaler: 0,
            pullups: false,
            state: BusState::Idle,
            active: false,
            stalled: false,
            forced_status: None,
            control_reads: 0,
            devices: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Attach a slave; gives the device back if the bus is full
    pub fn attach(&mut self, device: SimDevice) -> Result<(), SimDevice> {
        self.devices.push(device)
    }

    /// Builder form of [`attach`](Self::attach)
    ///
    /// # Panics
    ///
    /// Panics if [`MAX_DEVICES`] slaves are already attached.
    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.devices.push(device).expect("simulated bus is full");
        self
    }

    /// Look up an attached slave
    pub fn device(&self, address: u8) -> Option<&SimDevice> {
        self.devices.iter().find(|d| d.address == address)
    }

    /// Look up an attached slave for modification
    pub fn device_mut(&mut self, address: u8) -> Option<&mut SimDevice> {
        self.devices.iter_mut().find(|d| d.address == address)
    }

    /// Stop completing bus cycles (the completion flag never rises and
    /// STOP never clears)
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Report `code` instead of the real status after the next completed cycle
    pub fn force_next_status(&mut self, code: u8) {
        self.force_status_after(0, code);
    }

    /// Let `cycles` bus cycles complete normally, then report `code`
    /// instead of the real status for the one after
    ///
    /// Every START and every clocked address or data byte counts as one
    /// cycle; STOP does not.
    pub fn force_status_after(&mut self, cycles: u16, code: u8) {
        self.forced_status = Some((cycles, code));
    }

    /// Events seen on the wire so far
    pub fn wire_log(&self) -> &[WireEvent] {
        &self.log
    }

    /// Forget recorded wire events
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Number of control register reads (completion polls)
    pub fn control_reads(&self) -> u32 {
        self.control_reads
    }

    /// Last value written to the bit-rate register
    pub fn bit_rate(&self) -> u8 {
        self.bit_rate
    }

    /// Prescaler bits last written to the status register
    pub fn prescaler(&self) -> u8 {
        self.prescaler
    }

    /// Whether the internal pull-ups are enabled
    pub fn pullups(&self) -> bool {
        self.pullups
    }

    /// Whether the peripheral is enabled
    pub fn is_enabled(&self) -> bool {
        self.control & TWEN != 0
    }

    /// Whether a transaction is open (START seen, no STOP yet)
    pub fn bus_active(&self) -> bool {
        self.active
    }

    fn record(&mut self, event: WireEvent) {
        let _ = self.log.push(event);
    }

    fn complete(&mut self, value: u8, code: u8) {
        let code = match self.forced_status.take() {
            Some((0, forced)) => forced,
            Some((remaining, forced)) => {
                self.forced_status = Some((remaining - 1, forced));
                code
            }
            None => code,
        };
        self.status = code | self.prescaler;
        self.control = value | TWINT;
    }

    fn select(&mut self, address: u8, read: bool) -> bool {
        let Some(idx) = self.devices.iter().position(|d| d.address == address) else {
            self.state = BusState::Idle;
            return false;
        };
        let device = &mut self.devices[idx];
        if !device.accept_address() {
            self.state = BusState::Idle;
            return false;
        }
        if read {
            self.state = BusState::Receiving(idx);
        } else {
            device.written = 0;
            self.state = BusState::Transmitting(idx);
        }
        true
    }

    fn clock_cycle(&mut self, ack: bool) -> u8 {
        match self.state {
            BusState::Addressing => {
                let frame = self.data;
                let read = frame & 1 != 0;
                let acked = self.select(frame >> 1, read);
                self.record(WireEvent::Address { frame, acked });
                match (read, acked) {
                    (false, true) => status::MT_SLA_ACK,
                    (false, false) => status::MT_SLA_NACK,
                    (true, true) => status::MR_SLA_ACK,
                    (true, false) => status::MR_SLA_NACK,
                }
            }
            BusState::Transmitting(idx) => {
                let byte = self.data;
                let acked = self.devices[idx].write(byte);
                self.record(WireEvent::Write { byte, acked });
                if acked {
                    status::MT_DATA_ACK
                } else {
                    status::MT_DATA_NACK
                }
            }
            BusState::Receiving(idx) => {
                let byte = self.devices[idx].read();
                self.data = byte;
                self.record(WireEvent::Read { byte, acked: ack });
                if ack {
                    status::MR_DATA_ACK
                } else {
                    status::MR_DATA_NACK
                }
            }
            BusState::Idle => NO_INFO,
        }
    }
}

impl TwiRegisters for SimTwi {
    fn write_control(&mut self, value: u8) {
        if value & TWEN == 0 {
            self.control = value;
            self.state = BusState::Idle;
            self.active = false;
            return;
        }
        if self.stalled {
            self.control = value & !TWINT;
            return;
        }

        if value & TWSTA != 0 {
            // START with STOP set closes an open transaction first
            let repeated = self.active && value & TWSTO == 0;
            if self.active && !repeated {
                self.record(WireEvent::Stop);
            }
            self.record(if repeated {
                WireEvent::RepeatedStart
            } else {
                WireEvent::Start
            });
            self.active = true;
            self.state = BusState::Addressing;
            let code = if repeated {
                status::REP_START
            } else {
                status::START
            };
            self.complete(value & !TWSTO, code);
        } else if value & TWSTO != 0 {
            self.record(WireEvent::Stop);
            self.active = false;
            self.state = BusState::Idle;
            self.status = NO_INFO | self.prescaler;
            self.control = value & !(TWSTO | TWINT);
        } else if value & TWINT != 0 {
            let code = self.clock_cycle(value & TWEA != 0);
            self.complete(value, code);
        } else {
            self.control = value;
        }
    }

    fn read_control(&mut self) -> u8 {
        self.control_reads = self.control_reads.wrapping_add(1);
        self.control
    }

    fn read_status(&mut self) -> u8 {
        self.status
    }

    fn write_status(&mut self, value: u8) {
        self.prescaler = value & 0x03;
        self.status = (self.status & status::MASK) | self.prescaler;
    }

    fn write_bit_rate(&mut self, value: u8) {
        self.bit_rate = value;
    }

    fn write_data(&mut self, value: u8) {
        self.data = value;
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }

    fn set_pullups(&mut self, enabled: bool) {
        self.pullups = enabled;
    }
}

/// Manually driven millisecond clock
///
/// Every [`now_ms`](Clock::now_ms) call returns the current time and then
/// advances it by the configured step, so a test can make a transfer appear
/// to take any amount of time.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<u32>,
    step: Cell<u32>,
}

impl SimClock {
    /// Clock frozen at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances `step` ms on every read
    pub fn stepping(step: u32) -> Self {
        Self {
            now: Cell::new(0),
            step: Cell::new(step),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    /// Move time forward
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    /// Change the per-read step
    pub fn set_step(&self, step: u32) {
        self.step.set(step);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step.get()));
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_bus() -> SimTwi {
        let mut twi = SimTwi::new().with_device(SimDevice::new(0x50).with_register(0x10, 0xAB));
        twi.write_control(TWEN);
        twi
    }

    #[test]
    fn test_start_then_repeated_start() {
        let mut twi = enabled_bus();

        twi.write_control(TWINT | TWEN | TWSTA);
        assert_eq!(twi.read_status() & status::MASK, status::START);
        assert!(twi.read_control() & TWINT != 0);

        twi.write_control(TWINT | TWEN | TWSTA);
        assert_eq!(twi.read_status() & status::MASK, status::REP_START);

        assert_eq!(twi.wire_log(), &[WireEvent::Start, WireEvent::RepeatedStart]);
    }

    #[test]
    fn test_start_with_stop_restarts_transaction() {
        let mut twi = enabled_bus();

        twi.write_control(TWINT | TWEN | TWSTA);
        twi.write_control(TWINT | TWEN | TWSTO | TWSTA);

        assert_eq!(twi.read_status() & status::MASK, status::START);
        assert_eq!(
            twi.wire_log(),
            &[WireEvent::Start, WireEvent::Stop, WireEvent::Start]
        );
    }

    #[test]
    fn test_register_pointer_read() {
        let mut twi = enabled_bus();

        twi.write_control(TWINT | TWEN | TWSTA);
        twi.write_data(0x50 << 1);
        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::MT_SLA_ACK);

        twi.write_data(0x10);
        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::MT_DATA_ACK);

        twi.write_control(TWINT | TWEN | TWSTA);
        twi.write_data((0x50 << 1) | 1);
        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::MR_SLA_ACK);

        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::MR_DATA_NACK);
        assert_eq!(twi.read_data(), 0xAB);
    }

    #[test]
    fn test_absent_device_nacks() {
        let mut twi = enabled_bus();

        twi.write_control(TWINT | TWEN | TWSTA);
        twi.write_data(0x51 << 1);
        twi.write_control(TWINT | TWEN);

        assert_eq!(twi.read_status() & status::MASK, status::MT_SLA_NACK);
    }

    #[test]
    fn test_stop_clears_immediately() {
        let mut twi = enabled_bus();

        twi.write_control(TWINT | TWEN | TWSTA);
        twi.write_control(TWINT | TWEN | TWSTO);

        assert_eq!(twi.read_control() & (TWSTO | TWINT), 0);
        assert!(!twi.bus_active());
    }

    #[test]
    fn test_stalled_never_completes() {
        let mut twi = enabled_bus();
        twi.set_stalled(true);

        twi.write_control(TWINT | TWEN | TWSTA);
        assert_eq!(twi.read_control() & TWINT, 0);

        twi.write_control(TWINT | TWEN | TWSTO);
        assert!(twi.read_control() & TWSTO != 0);
        assert!(twi.wire_log().is_empty());
    }

    #[test]
    fn test_prescaler_reported_in_status() {
        let mut twi = enabled_bus();
        twi.write_status(0x01);

        twi.write_control(TWINT | TWEN | TWSTA);

        assert_eq!(twi.read_status(), status::START | 0x01);
        assert_eq!(twi.prescaler(), 0x01);
    }

    #[test]
    fn test_forced_status_after_cycles() {
        let mut twi = enabled_bus();
        twi.force_status_after(1, status::ARB_LOST);

        twi.write_control(TWINT | TWEN | TWSTA);
        assert_eq!(twi.read_status() & status::MASK, status::START);

        twi.write_data(0x50 << 1);
        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::ARB_LOST);

        // One-shot: the next cycle reports its real status
        twi.write_data(0x10);
        twi.write_control(TWINT | TWEN);
        assert_eq!(twi.read_status() & status::MASK, status::MT_DATA_ACK);
    }

    #[test]
    fn test_attach_rejects_extra_device() {
        let mut twi = SimTwi::new();
        for address in 0..MAX_DEVICES as u8 {
            assert!(twi.attach(SimDevice::new(address)).is_ok());
        }

        let rejected = twi.attach(SimDevice::new(0x70)).unwrap_err();
        assert_eq!(rejected.address(), 0x70);
        assert!(twi.device(0x70).is_none());
    }

    #[test]
    #[should_panic(expected = "simulated bus is full")]
    fn test_with_device_panics_when_full() {
        let mut twi = SimTwi::new();
        for address in 0..=MAX_DEVICES as u8 {
            twi = twi.with_device(SimDevice::new(address));
        }
    }

    #[test]
    fn test_stepping_clock() {
        let clock = SimClock::stepping(5);

        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 5);

        clock.advance(100);
        assert_eq!(clock.now_ms(), 110);

        clock.set_step(0);
        clock.set(u32::MAX);
        assert_eq!(clock.now_ms(), u32::MAX);
    }
}
