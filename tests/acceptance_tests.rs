//! Acceptance tests for the tslink timestamp bitcode link.
//!
//! These tests run the full producer/consumer pipeline over the
//! loopback digital-I/O driver:
//! - End-to-end transfer and read-back verification
//! - Latest-value-wins freshness under producer overwrite
//! - Graceful shutdown ordering
//! - Configuration file loading

mod acceptance;
