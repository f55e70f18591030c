//! In-memory loopback driver.
//!
//! Models the physical wiring used by the timestamp link: the clocked
//! output line is looped back to the clocked input line, and the read
//! stream trails the write stream by exactly one sample (the read task
//! samples the line state from before the first written sample lands).
//!
//! Also provides test hooks for fault injection: forcing individual
//! read-back samples and failing the next clocked read.

use crate::{ChannelHandle, ClockConfig, DioDriver, LineDirection, TriggerSource};
use std::collections::HashMap;
use tracing::{debug, trace};
use tslink_common::{LineSpec, LinkError, LinkResult};

/// One opened loopback channel.
#[derive(Debug)]
struct Channel {
    spec: LineSpec,
    direction: LineDirection,
    clock: Option<ClockConfig>,
    /// Current line level.
    level: bool,
    /// True between trigger and `stop()`.
    running: bool,
    /// Every level ever driven via `write_immediate`.
    history: Vec<bool>,
}

/// A clocked write latched and waiting for its start trigger.
#[derive(Debug)]
struct PendingWrite {
    source: ChannelHandle,
    samples: Vec<u8>,
}

/// Loopback digital-I/O driver.
///
/// Single-threaded, deterministic stand-in for a hardware backend.
#[derive(Debug, Default)]
pub struct LoopbackDriver {
    channels: HashMap<u32, Channel>,
    next_handle: u32,
    pending_write: Option<PendingWrite>,
    /// Read-back sample index -> forced level (test fault injection).
    forced_samples: HashMap<usize, u8>,
    /// Error message to return from the next clocked read (test hook).
    fail_next_read: Option<String>,
    operational: bool,
}

impl LoopbackDriver {
    /// Create a new loopback driver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            operational: true,
            ..Self::default()
        }
    }

    /// Current level of a line (test observation).
    #[must_use]
    pub fn level(&self, handle: ChannelHandle) -> bool {
        self.channels.get(&handle.0).is_some_and(|c| c.level)
    }

    /// Every level driven on a line via immediate writes, in order
    /// (test observation).
    #[must_use]
    pub fn level_history(&self, handle: ChannelHandle) -> Vec<bool> {
        self.channels
            .get(&handle.0)
            .map(|c| c.history.clone())
            .unwrap_or_default()
    }

    /// Force a read-back sample to a fixed level on every subsequent
    /// clocked read (test fault injection).
    pub fn force_sample(&mut self, index: usize, level: bool) {
        self.forced_samples.insert(index, u8::from(level));
    }

    /// Clear all forced samples.
    pub fn clear_forced_samples(&mut self) {
        self.forced_samples.clear();
    }

    /// Make the next clocked read fail with the given message
    /// (test fault injection).
    pub fn fail_next_read(&mut self, message: impl Into<String>) {
        self.fail_next_read = Some(message.into());
    }

    fn channel(&self, handle: ChannelHandle) -> LinkResult<&Channel> {
        self.channels
            .get(&handle.0)
            .ok_or(LinkError::UnknownChannel(handle.0))
    }

    fn channel_mut(&mut self, handle: ChannelHandle) -> LinkResult<&mut Channel> {
        self.channels
            .get_mut(&handle.0)
            .ok_or(LinkError::UnknownChannel(handle.0))
    }
}

impl DioDriver for LoopbackDriver {
    fn open_line(&mut self, spec: &LineSpec, direction: LineDirection) -> LinkResult<ChannelHandle> {
        let handle = ChannelHandle(self.next_handle);
        self.next_handle += 1;
        self.channels.insert(
            handle.0,
            Channel {
                spec: spec.clone(),
                direction,
                clock: None,
                level: false,
                running: false,
                history: Vec::new(),
            },
        );
        debug!(line = %spec, ?direction, handle = handle.raw(), "opened loopback line");
        Ok(handle)
    }

    fn configure_clock(&mut self, handle: ChannelHandle, clock: &ClockConfig) -> LinkResult<()> {
        if clock.samples == 0 {
            return Err(LinkError::Dio("clocked transfer needs >= 1 sample".into()));
        }
        let channel = self.channel_mut(handle)?;
        channel.clock = Some(clock.clone());
        debug!(
            handle = handle.raw(),
            rate_hz = clock.sample_rate_hz,
            samples = clock.samples,
            "configured clocked transfer"
        );
        Ok(())
    }

    fn write_immediate(&mut self, handle: ChannelHandle, level: bool) -> LinkResult<()> {
        let channel = self.channel_mut(handle)?;
        if channel.direction != LineDirection::Output {
            return Err(LinkError::Dio(format!(
                "immediate write on input line {}",
                channel.spec
            )));
        }
        channel.level = level;
        channel.history.push(level);
        trace!(handle = handle.raw(), level, "immediate write");
        Ok(())
    }

    fn read_immediate(&mut self, handle: ChannelHandle) -> LinkResult<bool> {
        let channel = self.channel(handle)?;
        Ok(channel.level)
    }

    fn write_clocked(&mut self, handle: ChannelHandle, samples: &[u8]) -> LinkResult<()> {
        let channel = self.channel(handle)?;
        if channel.direction != LineDirection::Output {
            return Err(LinkError::Dio(format!(
                "clocked write on input line {}",
                channel.spec
            )));
        }
        let clock = channel.clock.as_ref().ok_or_else(|| {
            LinkError::Dio(format!("clocked write on unconfigured line {}", channel.spec))
        })?;
        if samples.len() != clock.samples {
            return Err(LinkError::Dio(format!(
                "clocked write of {} samples on channel configured for {}",
                samples.len(),
                clock.samples
            )));
        }
        if channel.running {
            return Err(LinkError::Dio(
                "channel still running; stop() required before re-trigger".into(),
            ));
        }
        self.pending_write = Some(PendingWrite {
            source: handle,
            samples: samples.to_vec(),
        });
        trace!(handle = handle.raw(), samples = samples.len(), "latched clocked write");
        Ok(())
    }

    fn read_clocked(&mut self, handle: ChannelHandle, samples: usize) -> LinkResult<Vec<u8>> {
        if let Some(message) = self.fail_next_read.take() {
            return Err(LinkError::Dio(message));
        }

        {
            let channel = self.channel(handle)?;
            if channel.direction != LineDirection::Input {
                return Err(LinkError::Dio(format!(
                    "clocked read on output line {}",
                    channel.spec
                )));
            }
            let clock = channel.clock.as_ref().ok_or_else(|| {
                LinkError::Dio(format!("clocked read on unconfigured line {}", channel.spec))
            })?;
            if samples != clock.samples {
                return Err(LinkError::Dio(format!(
                    "clocked read of {samples} samples on channel configured for {}",
                    clock.samples
                )));
            }
            if channel.running {
                return Err(LinkError::Dio(
                    "channel still running; stop() required before re-trigger".into(),
                ));
            }
        }

        // Starting the read fires the trigger of the paired write channel.
        let triggered = self.pending_write.take().filter(|pending| {
            self.channels
                .get(&pending.source.0)
                .and_then(|c| c.clock.as_ref())
                .and_then(|clock| clock.trigger)
                == Some(TriggerSource::ReadStart(handle))
        });

        let mut readback = Vec::with_capacity(samples);
        match triggered {
            Some(pending) => {
                let source = self.channel_mut(pending.source)?;
                // One-sample pipeline offset: the first read sample sees
                // the line state from before the write started.
                readback.push(u8::from(source.level));
                readback.extend_from_slice(&pending.samples);
                if let Some(&last) = pending.samples.last() {
                    source.level = last != 0;
                }
                source.running = true;
            }
            None => {
                let level = u8::from(self.channel(handle)?.level);
                readback.resize(samples, level);
            }
        }

        // Pad or truncate to the requested count; the line holds its
        // final level once the write data is exhausted.
        let hold = readback.last().copied().unwrap_or(0);
        readback.resize(samples, hold);

        for (&index, &level) in &self.forced_samples {
            if index < readback.len() {
                readback[index] = level;
            }
        }

        let channel = self.channel_mut(handle)?;
        channel.running = true;
        trace!(handle = handle.raw(), samples, "clocked read complete");
        Ok(readback)
    }

    fn stop(&mut self, handle: ChannelHandle) -> LinkResult<()> {
        let channel = self.channel_mut(handle)?;
        channel.running = false;
        Ok(())
    }

    fn shutdown(&mut self) -> LinkResult<()> {
        self.channels.clear();
        self.pending_write = None;
        self.operational = false;
        debug!("loopback driver shut down");
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.operational
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClockEdge;

    fn spec(line: u32) -> LineSpec {
        LineSpec {
            device: "Dev2".into(),
            port: 0,
            line,
        }
    }

    fn paired_driver(samples: usize) -> (LoopbackDriver, ChannelHandle, ChannelHandle) {
        let mut driver = LoopbackDriver::new();
        let read = driver.open_line(&spec(0), LineDirection::Input).unwrap();
        let write = driver.open_line(&spec(1), LineDirection::Output).unwrap();
        driver
            .configure_clock(
                read,
                &ClockConfig {
                    sample_rate_hz: 40_000.0,
                    edge: ClockEdge::Rising,
                    samples: samples + 1,
                    trigger: None,
                },
            )
            .unwrap();
        driver
            .configure_clock(
                write,
                &ClockConfig {
                    sample_rate_hz: 40_000.0,
                    edge: ClockEdge::Rising,
                    samples,
                    trigger: Some(TriggerSource::ReadStart(read)),
                },
            )
            .unwrap();
        (driver, write, read)
    }

    #[test]
    fn test_readback_trails_write_by_one_sample() {
        let (mut driver, write, read) = paired_driver(4);

        driver.write_clocked(write, &[1, 0, 1, 1]).unwrap();
        let readback = driver.read_clocked(read, 5).unwrap();

        assert_eq!(readback, vec![0, 1, 0, 1, 1]);
    }

    #[test]
    fn test_line_holds_last_level_between_transfers() {
        let (mut driver, write, read) = paired_driver(2);

        driver.write_clocked(write, &[1, 1]).unwrap();
        let first = driver.read_clocked(read, 3).unwrap();
        assert_eq!(first, vec![0, 1, 1]);

        driver.stop(write).unwrap();
        driver.stop(read).unwrap();

        // The next read-back's leading sample sees the held HIGH level.
        driver.write_clocked(write, &[0, 0]).unwrap();
        let second = driver.read_clocked(read, 3).unwrap();
        assert_eq!(second, vec![1, 0, 0]);
    }

    #[test]
    fn test_stop_required_before_retrigger() {
        let (mut driver, write, read) = paired_driver(2);

        driver.write_clocked(write, &[1, 0]).unwrap();
        driver.read_clocked(read, 3).unwrap();

        // Without stop(), both channels refuse another cycle.
        assert!(driver.write_clocked(write, &[1, 0]).is_err());
        assert!(driver.read_clocked(read, 3).is_err());

        driver.stop(write).unwrap();
        driver.stop(read).unwrap();
        driver.write_clocked(write, &[1, 0]).unwrap();
        assert!(driver.read_clocked(read, 3).is_ok());
    }

    #[test]
    fn test_immediate_write_history() {
        let mut driver = LoopbackDriver::new();
        let marker = driver.open_line(&spec(3), LineDirection::Output).unwrap();

        driver.write_immediate(marker, true).unwrap();
        driver.write_immediate(marker, false).unwrap();

        assert_eq!(driver.level_history(marker), vec![true, false]);
        assert!(!driver.level(marker));
    }

    #[test]
    fn test_forced_sample_overrides_readback() {
        let (mut driver, write, read) = paired_driver(4);
        driver.force_sample(2, true);

        driver.write_clocked(write, &[0, 0, 0, 0]).unwrap();
        let readback = driver.read_clocked(read, 5).unwrap();
        assert_eq!(readback, vec![0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_fail_next_read() {
        let (mut driver, write, read) = paired_driver(2);
        driver.fail_next_read("simulated driver fault");

        driver.write_clocked(write, &[1, 0]).unwrap();
        let err = driver.read_clocked(read, 3).unwrap_err();
        assert!(matches!(err, LinkError::Dio(_)));

        // The failure is one-shot; channels were never triggered.
        assert!(driver.read_clocked(read, 3).is_ok());
    }

    #[test]
    fn test_sample_count_validation() {
        let (mut driver, write, read) = paired_driver(4);

        assert!(driver.write_clocked(write, &[1, 0]).is_err());
        assert!(driver.read_clocked(read, 2).is_err());
    }

    #[test]
    fn test_unknown_handle() {
        let mut driver = LoopbackDriver::new();
        let bogus = ChannelHandle(99);
        assert_eq!(
            driver.write_immediate(bogus, true),
            Err(LinkError::UnknownChannel(99))
        );
    }

    #[test]
    fn test_shutdown() {
        let (mut driver, write, _read) = paired_driver(2);
        assert!(driver.is_operational());
        driver.shutdown().unwrap();
        assert!(!driver.is_operational());
        assert!(driver.write_immediate(write, true).is_err());
    }
}
