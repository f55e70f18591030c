//! End-to-end link tests: periodic source, transmitter thread, and
//! loopback driver wired together the way the daemon wires them.

use crate::acceptance::common::{quick_link_config, start_link};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tslink_core::{timestamp_cell, TimestampSource, Transmitter};
use tslink_dio::LoopbackDriver;

#[test]
fn test_end_to_end_transfer_verifies() {
    let link = start_link(2);

    // Let the clock tick away from the cell's zero sentinel.
    std::thread::sleep(Duration::from_millis(1));
    let source = TimestampSource::new(link.clock, link.writer);
    let sent = source.publish_now();
    assert!(sent > 0);

    std::thread::sleep(Duration::from_millis(100));
    let transmitter = link.transmitter.stop().unwrap();

    let metrics = transmitter.metrics();
    assert_eq!(metrics.total_transfers(), 1);
    assert_eq!(metrics.mismatch_count(), 0);
}

#[test]
fn test_finite_source_shuts_link_down() {
    let config = quick_link_config();
    let clock = tslink_common::MonotonicClock::new();
    let (writer, reader) = timestamp_cell();
    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let transmitter = Transmitter::new(
        LoopbackDriver::new(),
        reader,
        clock,
        &config.link,
        config.metrics.histogram_size,
    )
    .unwrap()
    .spawn(Arc::clone(&shutdown))
    .unwrap();

    std::thread::sleep(Duration::from_millis(1));
    let source = TimestampSource::new(clock, writer)
        .spawn_periodic(
            config.source.publish_interval,
            config.source.publish_count,
            Arc::clone(&shutdown),
        )
        .unwrap();

    // The source exhausts its count and raises the shutdown flag on
    // its own; nobody else touches it.
    source.join().unwrap();
    assert!(shutdown.load(Ordering::Acquire));

    let deadline = Instant::now() + Duration::from_secs(2);
    while !transmitter.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(transmitter.is_finished(), "transmitter did not observe shutdown");

    let transmitter = transmitter.stop().unwrap();
    let metrics = transmitter.metrics();
    assert!(metrics.total_transfers() >= 1);
    assert!(metrics.total_transfers() <= config.source.publish_count);
    assert_eq!(metrics.mismatch_count(), 0);
}

#[test]
fn test_latency_accounting_uses_shared_clock() {
    let link = start_link(1);

    std::thread::sleep(Duration::from_millis(1));
    let source = TimestampSource::new(link.clock, link.writer);
    source.publish_now();

    std::thread::sleep(Duration::from_millis(100));
    let transmitter = link.transmitter.stop().unwrap();

    // Publication-to-verification latency is measured on the one clock
    // both ends share, so it is bounded by the wall time of the test.
    let snapshot = transmitter.metrics().snapshot();
    let max_ns = snapshot.max_ns.expect("at least one transfer recorded");
    assert!(max_ns < Duration::from_secs(2).as_nanos() as u64);
}
