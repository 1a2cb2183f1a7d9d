//! Source of sample timestamps

use std::time::Instant;

/// Monotonic time source for sample timestamps.
///
/// Tick scheduling always uses the real clock; only the instants stored in
/// records come from here.
pub trait Clock: Send + 'static {
    fn now(&self) -> Instant;
}

/// The process's monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
