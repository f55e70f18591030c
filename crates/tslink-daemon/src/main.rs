//! tslink daemon entry point.
//!
//! Wires the timestamp source, shared cell, and bitcode transmitter
//! into a complete runtime with signal handling and a shutdown metrics
//! summary.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tslink_common::config::{DioBackend, LinkConfig};
use tslink_common::MonotonicClock;
use tslink_core::{timestamp_cell, TimestampSource, Transmitter};
use tslink_dio::{DioDriver, LoopbackDriver};

use crate::signals::SignalHandler;

/// tslink daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "tslink-daemon",
    about = "Timestamp bitcode link daemon - cross-links a control loop and an external recorder",
    version,
    long_about = None
)]
struct Args {
    /// Path to a link configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Interval between timestamp publications (overrides config file).
    #[arg(long, short = 'i', value_name = "DURATION", value_parser = humantime::parse_duration)]
    publish_interval: Option<Duration>,

    /// Number of publications before shutdown, 0 = until signaled
    /// (overrides config file).
    #[arg(long, short = 'n', value_name = "COUNT")]
    publish_count: Option<u64>,

    /// Samples per logical digit (overrides config file).
    #[arg(long, short = 'r', value_name = "FACTOR")]
    repeat: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting tslink daemon");

    // Load configuration
    let mut config = load_config(&args)?;

    // Override with command-line arguments
    if let Some(interval) = args.publish_interval {
        config.source.publish_interval = interval;
    }
    if let Some(count) = args.publish_count {
        config.source.publish_count = count;
    }
    if let Some(repeat) = args.repeat {
        config.link.repeat = repeat;
        config
            .link
            .validate()
            .context("Invalid link configuration after overrides")?;
    }

    info!(
        digit_rate_hz = config.link.digit_rate_hz,
        repeat = config.link.repeat,
        backend = ?config.link.backend,
        "Configuration loaded"
    );

    // Set up signal handling
    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    // Run the daemon
    run_daemon(&config, &signal_handler)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "tslink_daemon={},tslink_core={},tslink_dio={},tslink_common={}",
        level, level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `TSLINK_CONFIG_PATH` environment variable
/// 3. `/etc/tslink/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<LinkConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return LinkConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("TSLINK_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from TSLINK_CONFIG_PATH");
            return LinkConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from TSLINK_CONFIG_PATH={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "TSLINK_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/tslink/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return LinkConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {:?}", system_path));
    }

    // 4. Local development path
    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return LinkConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(LinkConfig::default())
}

/// Main daemon run loop.
fn run_daemon(config: &LinkConfig, signal_handler: &SignalHandler) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let clock = MonotonicClock::new();
    let (writer, reader) = timestamp_cell();

    // One driver kind today; hardware backends are out-of-tree
    // implementors of the same DioDriver contract.
    let driver = match config.link.backend {
        DioBackend::Loopback => LoopbackDriver::new(),
    };

    let transmitter = Transmitter::new(
        driver,
        reader,
        clock,
        &config.link,
        config.metrics.histogram_size,
    )
    .context("Failed to set up transmitter channels")?;
    let transmitter = transmitter
        .spawn(Arc::clone(&shutdown))
        .context("Failed to spawn transmitter thread")?;

    let source = TimestampSource::new(clock, writer);
    let source = source
        .spawn_periodic(
            config.source.publish_interval,
            config.source.publish_count,
            Arc::clone(&shutdown),
        )
        .context("Failed to spawn timestamp source thread")?;

    info!("Link running");

    // Fold signals into the shared shutdown flag; the source also sets
    // it once a finite publication count is exhausted.
    while !shutdown.load(Ordering::Acquire) {
        if signal_handler.shutdown_requested() {
            info!("Shutdown signal received, stopping link");
            shutdown.store(true, Ordering::Release);
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    source
        .join()
        .map_err(|_| anyhow::anyhow!("timestamp source thread panicked"))?;
    let mut transmitter = transmitter
        .stop()
        .map_err(|e| anyhow::anyhow!("failed to stop transmitter: {e}"))?;

    // Shutdown summary
    if config.metrics.enabled {
        let snapshot = transmitter.metrics().snapshot();
        info!(
            transfers = snapshot.total_transfers,
            mismatches = snapshot.mismatch_count,
            min_us = snapshot.min_ns.map(|ns| ns / 1_000),
            mean_us = snapshot.mean_ns.map(|ns| ns / 1_000),
            max_us = snapshot.max_ns.map(|ns| ns / 1_000),
            "Transfer summary"
        );
        for (percentile, latency) in transmitter
            .metrics()
            .percentiles(&config.metrics.percentiles)
        {
            info!(percentile, latency_us = latency.as_micros() as u64, "Latency percentile");
        }
    }

    if let Err(e) = transmitter.driver_mut().shutdown() {
        warn!(error = %e, "Driver shutdown reported an error");
    }

    info!(
        signals_received = signal_handler.state().signal_count(),
        last_signal = ?signal_handler.state().last_signal(),
        "tslink daemon stopped"
    );
    Ok(())
}
