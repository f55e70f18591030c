//! Integration tests for tslink acceptance testing.

mod common;
mod config_test;
mod freshness_test;
mod link_test;
