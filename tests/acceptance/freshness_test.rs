//! Freshness tests: the single-slot cell drops stale values, so a slow
//! consumer always sees the newest timestamp and never an old one.

use crate::acceptance::common::start_link;
use std::time::Duration;

#[test]
fn test_burst_publishing_keeps_only_latest() {
    let link = start_link(2);

    // Publish a burst far faster than the transmitter can drain.
    // Values are fake timestamps; only the last one is guaranteed to
    // survive the single-slot cell.
    const BURST: u64 = 50;
    for value in 1..=BURST {
        link.writer.publish(value);
    }

    std::thread::sleep(Duration::from_millis(200));
    let transmitter = link.transmitter.stop().unwrap();

    let metrics = transmitter.metrics();
    // Overwrites are losses, not errors: fewer transfers than
    // publications, and every transfer that did run verified.
    assert!(metrics.total_transfers() >= 1);
    assert!(metrics.total_transfers() <= BURST);
    assert_eq!(metrics.mismatch_count(), 0);
}

#[test]
fn test_idle_link_transfers_nothing() {
    let link = start_link(1);

    // No publication at all: the transmitter must stay in its idle
    // poll and exit cleanly with zero transfers.
    std::thread::sleep(Duration::from_millis(50));
    let transmitter = link.transmitter.stop().unwrap();

    assert_eq!(transmitter.metrics().total_transfers(), 0);
}

#[test]
fn test_republished_value_transfers_again() {
    let link = start_link(1);

    link.writer.publish(7);
    std::thread::sleep(Duration::from_millis(50));
    // A genuinely new value after the first was consumed.
    link.writer.publish(9);
    std::thread::sleep(Duration::from_millis(50));

    let transmitter = link.transmitter.stop().unwrap();
    assert_eq!(transmitter.metrics().total_transfers(), 2);
    assert_eq!(transmitter.metrics().mismatch_count(), 0);
}
