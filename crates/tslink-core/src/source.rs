//! Timestamp producer.
//!
//! Samples the shared monotonic clock and publishes into the timestamp
//! cell. In production the surrounding control loop decides when to
//! publish (typically at its own cycle boundaries); the periodic mode
//! here drives the same path on a fixed interval for standalone
//! operation and testing.

use crate::cell::TimestampWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, trace};
use tslink_common::{LinkError, LinkResult, MonotonicClock};

/// Producer of monotonic microsecond timestamps.
#[derive(Debug)]
pub struct TimestampSource {
    clock: MonotonicClock,
    writer: TimestampWriter,
}

impl TimestampSource {
    /// Create a source publishing through `writer`.
    ///
    /// The clock must be the same one the transmitter uses for latency
    /// accounting; both sides copy a single shared origin.
    #[must_use]
    pub fn new(clock: MonotonicClock, writer: TimestampWriter) -> Self {
        Self { clock, writer }
    }

    /// Sample the clock and publish the timestamp, returning it.
    pub fn publish_now(&self) -> u64 {
        let timestamp = self.clock.now_us();
        self.writer.publish(timestamp);
        trace!(timestamp, "timestamp published");
        timestamp
    }

    /// Run periodic publication on a dedicated named thread.
    ///
    /// Publishes every `interval` until `count` publications have been
    /// made (`count = 0` runs until `shutdown` is set). When a finite
    /// count is exhausted the source sets the shutdown flag itself, so
    /// the transmitter loop winds down with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_periodic(
        self,
        interval: Duration,
        count: u64,
        shutdown: Arc<AtomicBool>,
    ) -> LinkResult<JoinHandle<()>> {
        thread::Builder::new()
            .name("tslink-source".into())
            .spawn(move || {
                info!(
                    interval_ms = interval.as_millis(),
                    count,
                    "timestamp source started"
                );

                let mut published = 0u64;
                while !shutdown.load(Ordering::Acquire) {
                    self.publish_now();
                    published += 1;
                    if count != 0 && published >= count {
                        break;
                    }
                    thread::sleep(interval);
                }

                if count != 0 {
                    // Give the transmitter one last chance to drain the
                    // final value before requesting shutdown.
                    thread::sleep(interval);
                    shutdown.store(true, Ordering::Release);
                }

                info!(published, "timestamp source exited");
            })
            .map_err(|e| LinkError::ThreadSpawn(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::timestamp_cell;

    #[test]
    fn test_publish_now_lands_in_cell() {
        let (writer, mut reader) = timestamp_cell();
        let source = TimestampSource::new(MonotonicClock::new(), writer);

        // Let the clock tick away from zero; a zero publication is
        // indistinguishable from the cell's initial state.
        std::thread::sleep(Duration::from_millis(1));
        let sent = source.publish_now();
        assert!(sent > 0);
        assert_eq!(reader.poll(), Some(sent));
    }

    #[test]
    fn test_published_values_are_monotonic() {
        let (writer, mut reader) = timestamp_cell();
        let source = TimestampSource::new(MonotonicClock::new(), writer);

        let mut last = 0u64;
        for _ in 0..5 {
            std::thread::sleep(Duration::from_micros(10));
            let sent = source.publish_now();
            assert!(sent >= last);
            last = sent;
        }
        assert_eq!(reader.poll(), Some(last));
    }

    #[test]
    fn test_finite_count_sets_shutdown() {
        let (writer, _reader) = timestamp_cell();
        let source = TimestampSource::new(MonotonicClock::new(), writer);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = source
            .spawn_periodic(Duration::from_millis(1), 3, Arc::clone(&shutdown))
            .unwrap();
        handle.join().unwrap();

        assert!(shutdown.load(Ordering::Acquire));
    }

    #[test]
    fn test_external_shutdown_stops_infinite_source() {
        let (writer, _reader) = timestamp_cell();
        let source = TimestampSource::new(MonotonicClock::new(), writer);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = source
            .spawn_periodic(Duration::from_millis(1), 0, Arc::clone(&shutdown))
            .unwrap();

        std::thread::sleep(Duration::from_millis(10));
        shutdown.store(true, Ordering::Release);
        handle.join().unwrap();

        // Infinite mode never sets the flag itself; it was ours.
        assert!(shutdown.load(Ordering::Acquire));
    }
}
