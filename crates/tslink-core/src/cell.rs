//! Single-slot timestamp cell between producer and transmitter.
//!
//! A deliberately lossy, latest-value-wins channel: the producer
//! overwrites freely, the consumer only ever observes the most recent
//! value. No queueing - only the timestamp current at trigger time
//! matters for cross-linking the streams, not a complete history.
//!
//! # Threading Model
//!
//! - **Producer thread**: publishes via [`TimestampWriter::publish`]
//! - **Transmitter thread**: polls via [`TimestampReader::poll`]
//!
//! One atomic word, so a published value is always observed whole;
//! the "have I seen this already" state lives privately in the reader,
//! keeping the shared footprint to a single cache line.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct CellInner {
    /// Latest published timestamp. Padded so producer stores never
    /// false-share with anything the consumer owns.
    value: CachePadded<AtomicU64>,
}

/// Create a connected writer/reader pair over a fresh cell.
///
/// The cell starts at zero; the reader reports the first published
/// value that differs from zero. Timestamps are microseconds since
/// process start and are published after startup, so a literal zero
/// publication never occurs in practice.
#[must_use]
pub fn timestamp_cell() -> (TimestampWriter, TimestampReader) {
    let inner = Arc::new(CellInner {
        value: CachePadded::new(AtomicU64::new(0)),
    });
    (
        TimestampWriter {
            inner: Arc::clone(&inner),
        },
        TimestampReader {
            last_observed: inner.value.load(Ordering::Acquire),
            inner,
        },
    )
}

/// Producer end of the timestamp cell.
///
/// Single-writer by construction: not `Clone`, and `publish` never
/// blocks regardless of what the consumer is doing.
#[derive(Debug)]
pub struct TimestampWriter {
    inner: Arc<CellInner>,
}

impl TimestampWriter {
    /// Overwrite the cell with a new timestamp.
    ///
    /// Non-blocking. If called N times between two consumer polls,
    /// only the last value is ever observed.
    #[inline]
    pub fn publish(&self, timestamp: u64) {
        self.inner.value.store(timestamp, Ordering::Release);
    }
}

/// Consumer end of the timestamp cell.
#[derive(Debug)]
pub struct TimestampReader {
    inner: Arc<CellInner>,
    /// Last value this reader returned from `poll`.
    last_observed: u64,
}

impl TimestampReader {
    /// Poll for a changed timestamp.
    ///
    /// Returns `Some(value)` exactly once per distinct published value
    /// observed; returns `None` while the cell still holds the last
    /// value this reader consumed. Never blocks.
    #[inline]
    pub fn poll(&mut self) -> Option<u64> {
        let value = self.inner.value.load(Ordering::Acquire);
        if value != self.last_observed {
            self.last_observed = value;
            Some(value)
        } else {
            None
        }
    }

    /// Read the current cell contents without consuming a change.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.inner.value.load(Ordering::Acquire)
    }
}
