//! Bitcode transmitter state machine.
//!
//! Runs on a dedicated thread. Whenever the shared timestamp cell
//! changes, one transfer cycle executes:
//!
//! 1. `MarkerAsserted` - immediate HIGH on the marker line, the
//!    low-latency timing edge for the external recorder
//! 2. `TransferInFlight` - clocked write of the encoded bitcode, with
//!    the paired clocked read triggering the write's start; both
//!    channels stopped afterwards so they can be re-triggered
//! 3. `MarkerDeasserted` - immediate LOW closes the timing bracket
//! 4. `Verified` - decode the read-back and compare against the sent
//!    value; a mismatch is logged, never retried
//!
//! Driver errors funnel through one handler: log and continue. No
//! error escapes a transfer cycle, and the shutdown flag is honored
//! only while idle - an in-flight transfer always runs to completion.

use crate::bitcode;
use crate::cell::TimestampReader;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use tslink_common::{
    LinkError, LinkResult, MonotonicClock, TransferConfig, TransferMetrics,
};
use tslink_dio::{ChannelHandle, ClockConfig, DioDriver, LineDirection, TriggerSource};

/// Outcome of one transfer cycle. Ephemeral: consumed by logging and
/// metrics, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    /// Timestamp that was encoded and written.
    pub sent: u64,
    /// Timestamp decoded from the read-back, if the read succeeded.
    pub received: Option<u64>,
    /// Whether the read-back decoded to the sent value.
    pub matched: bool,
    /// Round-trip latency from publication to verification, in
    /// microseconds of the shared monotonic clock.
    pub latency_us: u64,
}

/// Transfer cycle phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    MarkerAsserted,
    TransferInFlight,
    MarkerDeasserted,
    Verified,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::MarkerAsserted => write!(f, "MARKER_ASSERTED"),
            Self::TransferInFlight => write!(f, "TRANSFER_IN_FLIGHT"),
            Self::MarkerDeasserted => write!(f, "MARKER_DEASSERTED"),
            Self::Verified => write!(f, "VERIFIED"),
        }
    }
}

/// Bitcode transmitter over an abstract digital-I/O driver.
pub struct Transmitter<D: DioDriver> {
    driver: D,
    marker: ChannelHandle,
    data: ChannelHandle,
    readback: ChannelHandle,
    repeat: usize,
    poll_interval: Duration,
    reader: TimestampReader,
    clock: MonotonicClock,
    metrics: TransferMetrics,
    phase: Phase,
}

impl<D: DioDriver> Transmitter<D> {
    /// Open and configure the marker, data, and read-back channels.
    ///
    /// The read-back channel reads one sample more than the data
    /// channel writes, and the data channel's start trigger is wired
    /// to the read-back channel's start event, so both begin on the
    /// same clock edge with the read stream trailing by one sample.
    ///
    /// Also performs one warm-up immediate write/read on the marker
    /// line; the first immediate operation on a fresh channel is far
    /// slower than the steady state, and the marker edge must be tight.
    ///
    /// # Errors
    ///
    /// Returns an error if channel setup fails; unlike per-transfer
    /// driver calls, a broken setup is not something to continue past.
    pub fn new(
        mut driver: D,
        reader: TimestampReader,
        clock: MonotonicClock,
        config: &TransferConfig,
        histogram_size: usize,
    ) -> LinkResult<Self> {
        let repeat = config.repeat;
        let sample_rate_hz = config.sample_rate_hz();

        let marker = driver.open_line(&config.marker_line, LineDirection::Output)?;
        let readback = driver.open_line(&config.readback_line, LineDirection::Input)?;
        let data = driver.open_line(&config.data_line, LineDirection::Output)?;

        driver.configure_clock(
            readback,
            &ClockConfig {
                sample_rate_hz,
                edge: tslink_dio::ClockEdge::Rising,
                samples: bitcode::readback_len(repeat),
                trigger: None,
            },
        )?;
        driver.configure_clock(
            data,
            &ClockConfig {
                sample_rate_hz,
                edge: tslink_dio::ClockEdge::Rising,
                samples: bitcode::physical_len(repeat),
                trigger: Some(TriggerSource::ReadStart(readback)),
            },
        )?;

        // Warm-up: prime the immediate path so the first real marker
        // edge is not the slow first call.
        driver.write_immediate(marker, false)?;
        driver.read_immediate(marker)?;

        info!(
            marker = %config.marker_line,
            data = %config.data_line,
            readback = %config.readback_line,
            sample_rate_hz,
            repeat,
            code_samples = bitcode::physical_len(repeat),
            "transmitter channels configured"
        );

        Ok(Self {
            driver,
            marker,
            data,
            readback,
            repeat,
            poll_interval: config.poll_interval,
            reader,
            clock,
            metrics: TransferMetrics::new(histogram_size),
            phase: Phase::Idle,
        })
    }

    /// Borrow the underlying driver (test observation).
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutably borrow the underlying driver (test fault injection).
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Borrow the accumulated transfer metrics.
    pub fn metrics(&self) -> &TransferMetrics {
        &self.metrics
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Funnel for per-transfer driver errors: log and continue.
    fn note_driver_error(op: &str, err: &LinkError) {
        warn!(op, error = %err, "digital I/O call failed; continuing");
    }

    /// Execute one full transfer cycle for `value`.
    ///
    /// Never fails: driver errors and verification mismatches are
    /// logged and reflected in the returned record.
    pub fn transfer(&mut self, value: u64) -> TransferRecord {
        // Immediate HIGH first: this edge is the recorder's timing
        // reference and must lead the clocked payload.
        self.enter(Phase::MarkerAsserted);
        if let Err(e) = self.driver.write_immediate(self.marker, true) {
            Self::note_driver_error("marker assert", &e);
        }

        self.enter(Phase::TransferInFlight);
        let code = bitcode::encode(value, self.repeat);
        if let Err(e) = self.driver.write_clocked(self.data, &code) {
            Self::note_driver_error("clocked write", &e);
        }
        let readback = match self
            .driver
            .read_clocked(self.readback, bitcode::readback_len(self.repeat))
        {
            Ok(samples) => Some(samples),
            Err(e) => {
                Self::note_driver_error("clocked read", &e);
                None
            }
        };

        // Both finite channels must stop before the next cycle can
        // re-trigger them.
        if let Err(e) = self.driver.stop(self.data) {
            Self::note_driver_error("stop data channel", &e);
        }
        if let Err(e) = self.driver.stop(self.readback) {
            Self::note_driver_error("stop readback channel", &e);
        }

        self.enter(Phase::MarkerDeasserted);
        if let Err(e) = self.driver.write_immediate(self.marker, false) {
            Self::note_driver_error("marker deassert", &e);
        }

        self.enter(Phase::Verified);
        let received = readback.as_deref().and_then(|samples| {
            match bitcode::decode(samples, self.repeat) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    Self::note_driver_error("decode", &e);
                    None
                }
            }
        });
        let matched = received == Some(value);
        let latency_us = self.clock.now_us().saturating_sub(value);
        let latency = Duration::from_micros(latency_us);
        self.metrics.record(latency, matched);

        if matched {
            debug!(sent = value, latency_us, "transfer verified");
        } else {
            warn!(sent = value, ?received, latency_us, "read-back mismatch");
        }

        self.enter(Phase::Idle);
        TransferRecord {
            sent: value,
            received,
            matched,
            latency_us,
        }
    }

    /// Poll-and-transfer loop until `shutdown` is set.
    ///
    /// The flag is checked once per idle iteration; a transfer in
    /// flight always completes before the loop can exit.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(
            poll_interval_us = self.poll_interval.as_micros(),
            "transmitter loop started"
        );

        while !shutdown.load(Ordering::Acquire) {
            if let Some(value) = self.reader.poll() {
                self.transfer(value);
            } else {
                thread::sleep(self.poll_interval);
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            transfers = snapshot.total_transfers,
            mismatches = snapshot.mismatch_count,
            "transmitter loop exited"
        );
    }

    /// Spawn the transmitter loop on a dedicated named thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> LinkResult<TransmitterHandle<D>>
    where
        D: 'static,
    {
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("tslink-transmitter".into())
            .spawn(move || {
                self.run(&flag);
                self
            })
            .map_err(|e| LinkError::ThreadSpawn(e.to_string()))?;

        Ok(TransmitterHandle { thread, shutdown })
    }
}

/// Handle to a running transmitter thread.
pub struct TransmitterHandle<D: DioDriver> {
    thread: JoinHandle<Transmitter<D>>,
    shutdown: Arc<AtomicBool>,
}

impl<D: DioDriver> TransmitterHandle<D> {
    /// Request shutdown and join, returning the transmitter.
    ///
    /// Bounded by one poll interval plus any transfer in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the transmitter thread panicked.
    pub fn stop(self) -> LinkResult<Transmitter<D>> {
        self.shutdown.store(true, Ordering::Release);
        self.thread
            .join()
            .map_err(|_| LinkError::ThreadSpawn("transmitter thread panicked".into()))
    }

    /// Check whether the transmitter thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
