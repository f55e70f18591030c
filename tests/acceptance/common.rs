//! Common utilities for integration tests.

#![allow(dead_code)] // Not every helper is used by every test module

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tslink_common::{LinkConfig, MonotonicClock, TransferConfig};
use tslink_core::{timestamp_cell, TimestampWriter, Transmitter, TransmitterHandle};
use tslink_dio::LoopbackDriver;

/// A running link over the loopback driver.
pub struct TestLink {
    /// Producer end of the timestamp cell.
    pub writer: TimestampWriter,
    /// Handle to the transmitter thread.
    pub transmitter: TransmitterHandle<LoopbackDriver>,
    /// Shared shutdown flag.
    pub shutdown: Arc<AtomicBool>,
    /// Clock shared by producer and transmitter.
    pub clock: MonotonicClock,
}

/// Transfer configuration for tests: small repeat factor and a short
/// poll interval so cycles complete quickly.
pub fn test_transfer_config(repeat: usize) -> TransferConfig {
    TransferConfig {
        repeat,
        poll_interval: Duration::from_micros(10),
        ..TransferConfig::default()
    }
}

/// Spawn a complete link (cell + transmitter thread) over loopback.
pub fn start_link(repeat: usize) -> TestLink {
    let clock = MonotonicClock::new();
    let (writer, reader) = timestamp_cell();
    let config = test_transfer_config(repeat);
    let shutdown = Arc::new(AtomicBool::new(false));

    let transmitter = Transmitter::new(LoopbackDriver::new(), reader, clock, &config, 256)
        .expect("loopback channel setup cannot fail");
    let transmitter = transmitter
        .spawn(Arc::clone(&shutdown))
        .expect("transmitter thread spawn");

    TestLink {
        writer,
        transmitter,
        shutdown,
        clock,
    }
}

/// Default full configuration with overrides applied, for daemon-style
/// wiring in tests.
pub fn quick_link_config() -> LinkConfig {
    let mut config = LinkConfig::default();
    config.link = test_transfer_config(2);
    config.source.publish_interval = Duration::from_millis(5);
    config.source.publish_count = 5;
    config
}
