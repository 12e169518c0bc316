//! Millisecond counter on Timer2
//!
//! Timer2 runs in CTC mode with prescaler 64 and OCR2A = 249, so at 16 MHz
//! the compare-match interrupt fires every 250 timer ticks, once per
//! millisecond. The count wraps after about 49.7 days; callers compare
//! timestamps with wrapping subtraction.

use core::cell::Cell;

use avr_device::atmega328p::TC2;
use avr_device::interrupt::{self, Mutex};
use twidev_hal::Clock;

/// TCCR2A: WGM21 (CTC, TOP = OCR2A)
const TCCR2A_CTC: u8 = 1 << 1;
/// TCCR2B: CS22 (clk/64)
const TCCR2B_CLK_DIV_64: u8 = 1 << 2;
/// TIMSK2: OCIE2A
const TIMSK2_OCIE2A: u8 = 1 << 1;
/// Compare value for a 1 kHz tick at 16 MHz / 64
const COMPARE_1KHZ: u8 = 249;

static MILLIS: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

/// Timer2-backed millisecond clock
pub struct Timer2Millis {
    tc2: TC2,
}

impl Timer2Millis {
    /// Reset the count to zero and start the timer
    pub fn init(tc2: TC2) -> Self {
        tc2.tccr2a.write(|w| unsafe { w.bits(TCCR2A_CTC) });
        tc2.ocr2a.write(|w| unsafe { w.bits(COMPARE_1KHZ) });
        tc2.timsk2.write(|w| unsafe { w.bits(TIMSK2_OCIE2A) });

        interrupt::free(|cs| MILLIS.borrow(cs).set(0));
        tc2.tccr2b.write(|w| unsafe { w.bits(TCCR2B_CLK_DIV_64) });

        Self { tc2 }
    }

    /// Stop the timer and its interrupt; the count freezes
    pub fn stop(self) -> TC2 {
        self.tc2.timsk2.write(|w| unsafe { w.bits(0) });
        self.tc2.tccr2b.write(|w| unsafe { w.bits(0) });
        self.tc2
    }
}

impl Clock for Timer2Millis {
    fn now_ms(&self) -> u32 {
        interrupt::free(|cs| MILLIS.borrow(cs).get())
    }
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega328p)]
fn TIMER2_COMPA() {
    interrupt::free(|cs| {
        let millis = MILLIS.borrow(cs);
        millis.set(millis.get().wrapping_add(1));
    });
}
