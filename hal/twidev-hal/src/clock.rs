//! Millisecond clock abstraction

/// Free-running millisecond counter
///
/// Only used to bound read timeouts, so it needs no particular accuracy.
/// The counter wraps after about 49 days; callers measure elapsed time
/// with wrapping subtraction.
pub trait Clock {
    /// Milliseconds since the counter was started
    fn now_ms(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
