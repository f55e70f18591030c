//! Monotonic microsecond timebase.
//!
//! Timestamps everywhere in tslink are microseconds counted from a
//! process-local monotonic origin. The external recorder only needs the
//! values to be strictly ordered within one process run; absolute epoch
//! does not matter for cross-linking the two streams.

use std::time::Instant;

/// Monotonic microsecond clock anchored at construction time.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Microseconds elapsed since the clock origin.
    ///
    /// Never goes backwards. Wraps after ~584 thousand years, which is
    /// treated as unreachable.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}
