//! Transfer metrics collection for round-trip latency monitoring.
//!
//! Provides a ring buffer-based histogram for tracking bitcode
//! round-trip latencies without heap allocations between transfers.

use std::time::Duration;

/// Per-transfer metrics with ring buffer for latency tracking.
#[derive(Debug)]
pub struct TransferMetrics {
    /// Ring buffer of round-trip latencies in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples retained (saturates at buffer size).
    sample_count: usize,
    /// Total transfers completed.
    total_transfers: u64,
    /// Number of read-back verification mismatches.
    mismatch_count: u64,
    /// Minimum observed latency in nanoseconds.
    min_ns: u64,
    /// Maximum observed latency in nanoseconds.
    max_ns: u64,
    /// Sum of all latencies for mean calculation.
    sum_ns: u64,
}

impl TransferMetrics {
    /// Create a new metrics collector with the given histogram size.
    #[must_use]
    pub fn new(histogram_size: usize) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_transfers: 0,
            mismatch_count: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
        }
    }

    /// Record a completed transfer.
    ///
    /// Allocation-free; safe to call from the transmitter thread
    /// between transfers.
    pub fn record(&mut self, latency: Duration, matched: bool) {
        let ns = latency.as_nanos() as u64;

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_transfers += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);

        if !matched {
            self.mismatch_count += 1;
        }
    }

    /// Get total number of transfers completed.
    #[must_use]
    pub fn total_transfers(&self) -> u64 {
        self.total_transfers
    }

    /// Get number of read-back mismatches.
    #[must_use]
    pub fn mismatch_count(&self) -> u64 {
        self.mismatch_count
    }

    /// Get minimum observed round-trip latency.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        if self.total_transfers > 0 {
            Some(Duration::from_nanos(self.min_ns))
        } else {
            None
        }
    }

    /// Get maximum observed round-trip latency.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.total_transfers > 0 {
            Some(Duration::from_nanos(self.max_ns))
        } else {
            None
        }
    }

    /// Get mean round-trip latency.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.total_transfers > 0 {
            Some(Duration::from_nanos(self.sum_ns / self.total_transfers))
        } else {
            None
        }
    }

    /// Compute a percentile from the ring buffer.
    ///
    /// Returns `None` if no samples have been collected or if the
    /// percentile is out of range.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }
        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Compute multiple percentiles in one sort.
    ///
    /// Invalid percentiles (< 0, > 100, or NaN) are skipped.
    #[must_use]
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<(f64, Duration)> {
        if self.sample_count == 0 {
            return vec![];
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        percentiles
            .iter()
            .filter(|&&p| (0.0..=100.0).contains(&p) && !p.is_nan())
            .map(|&p| {
                let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
                let idx = idx.min(sorted.len() - 1);
                (p, Duration::from_nanos(sorted[idx]))
            })
            .collect()
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_transfers: self.total_transfers,
            mismatch_count: self.mismatch_count,
            min_ns: (self.total_transfers > 0).then_some(self.min_ns),
            max_ns: (self.total_transfers > 0).then_some(self.max_ns),
            mean_ns: if self.total_transfers > 0 {
                Some(self.sum_ns / self.total_transfers)
            } else {
                None
            },
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_transfers = 0;
        self.mismatch_count = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
    }
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total transfers completed.
    pub total_transfers: u64,
    /// Number of read-back mismatches.
    pub mismatch_count: u64,
    /// Minimum round-trip latency in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum round-trip latency in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean round-trip latency in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get latency jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
