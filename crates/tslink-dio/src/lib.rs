//! Digital-I/O capability layer for tslink.
//!
//! This crate provides:
//! - [`DioDriver`] trait abstracting clocked and immediate digital line
//!   operations
//! - [`loopback`] module with an in-memory driver that wires the clocked
//!   output line back to the clocked input line
//!
//! Hardware backends (vendor DAQ drivers) are external collaborators and
//! live outside this workspace; they implement [`DioDriver`] against the
//! same contract the loopback driver models.

#[cfg(feature = "loopback")]
pub mod loopback;

#[cfg(feature = "loopback")]
pub use loopback::*;

use tslink_common::{LineSpec, LinkResult};

/// Opaque handle to an opened digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub(crate) u32);

impl ChannelHandle {
    /// Raw handle value, for diagnostics only.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Direction of an opened line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    /// Digital input (read).
    Input,
    /// Digital output (write).
    Output,
}

/// Sample clock edge selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockEdge {
    /// Sample on the rising edge.
    #[default]
    Rising,
    /// Sample on the falling edge.
    Falling,
}

/// Start-trigger wiring for a clocked channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Start when the referenced clocked read channel starts.
    ///
    /// Used to pair a clocked write with its read-back: both begin on
    /// the same clock edge, with the read stream trailing the write
    /// stream by exactly one sample.
    ReadStart(ChannelHandle),
}

/// Clocked-transfer configuration for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockConfig {
    /// Physical sample clock rate in Hz.
    pub sample_rate_hz: f64,
    /// Active sample clock edge.
    pub edge: ClockEdge,
    /// Finite sample count per transfer.
    pub samples: usize,
    /// Optional start-trigger wiring.
    pub trigger: Option<TriggerSource>,
}

/// Digital-I/O driver abstraction.
///
/// Defines the capability surface consumed by the bitcode transmitter,
/// so the protocol is testable against a simulated channel with no
/// physical hardware. Methods take `&mut self`: a driver instance is
/// owned by a single consumer thread.
pub trait DioDriver: Send {
    /// Open a digital line for the given direction.
    fn open_line(&mut self, spec: &LineSpec, direction: LineDirection) -> LinkResult<ChannelHandle>;

    /// Configure a finite clocked transfer on an opened line.
    fn configure_clock(&mut self, handle: ChannelHandle, clock: &ClockConfig) -> LinkResult<()>;

    /// Write a single sample immediately, without a sample clock.
    ///
    /// Far lower latency than a clocked transfer; used for the marker
    /// bracket.
    fn write_immediate(&mut self, handle: ChannelHandle, level: bool) -> LinkResult<()>;

    /// Read a single sample immediately, without a sample clock.
    fn read_immediate(&mut self, handle: ChannelHandle) -> LinkResult<bool>;

    /// Latch a clocked write.
    ///
    /// The samples are not driven onto the line until the channel's
    /// configured start trigger fires.
    fn write_clocked(&mut self, handle: ChannelHandle, samples: &[u8]) -> LinkResult<()>;

    /// Run a clocked read of `samples` samples.
    ///
    /// Starting the read fires the start trigger of any channel
    /// configured with [`TriggerSource::ReadStart`] referencing this
    /// handle. Blocks until the transfer completes.
    fn read_clocked(&mut self, handle: ChannelHandle, samples: usize) -> LinkResult<Vec<u8>>;

    /// Stop a clocked channel after a finite transfer.
    ///
    /// Required before the channel can be re-triggered for the next
    /// transfer cycle.
    fn stop(&mut self, handle: ChannelHandle) -> LinkResult<()>;

    /// Release all channels and shut the driver down.
    fn shutdown(&mut self) -> LinkResult<()>;

    /// Check if the driver is operational.
    fn is_operational(&self) -> bool {
        true
    }
}
