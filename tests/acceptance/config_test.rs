//! Configuration file loading tests.

use std::io::Write;
use std::time::Duration;
use tslink_common::config::{ConfigError, LinkConfig};

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [link]
        digit_rate_hz = 2000
        repeat = 10
        poll_interval = "25us"

        [link.marker_line]
        device = "Dev3"
        port = 1
        line = 4

        [source]
        publish_interval = "250ms"
        publish_count = 8

        [metrics]
        histogram_size = 512
        percentiles = [50.0, 99.9]
        "#
    )
    .unwrap();

    let config = LinkConfig::from_file(file.path()).unwrap();
    assert_eq!(config.link.digit_rate_hz, 2_000);
    assert_eq!(config.link.repeat, 10);
    assert!((config.link.sample_rate_hz() - 20_000.0).abs() < f64::EPSILON);
    assert_eq!(config.link.poll_interval, Duration::from_micros(25));
    assert_eq!(config.link.marker_line.to_string(), "Dev3/port1/line4");
    assert_eq!(config.source.publish_interval, Duration::from_millis(250));
    assert_eq!(config.source.publish_count, 8);
    assert_eq!(config.metrics.histogram_size, 512);
    assert_eq!(config.metrics.percentiles, vec![50.0, 99.9]);
}

#[test]
fn test_partial_config_falls_back_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [source]
        publish_count = 3
        "#
    )
    .unwrap();

    let config = LinkConfig::from_file(file.path()).unwrap();
    assert_eq!(config.source.publish_count, 3);
    // Everything unspecified keeps the reference deployment values.
    assert_eq!(config.link.digit_rate_hz, 1_000);
    assert_eq!(config.link.repeat, 40);
    assert_eq!(config.source.publish_interval, Duration::from_secs(1));
}

#[test]
fn test_invalid_config_rejected_on_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [link]
        repeat = 0
        "#
    )
    .unwrap();

    let result = LinkConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = LinkConfig::from_file(std::path::Path::new("/nonexistent/tslink.toml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
