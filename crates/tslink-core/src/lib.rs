//! Bitcode protocol core for tslink.
//!
//! This crate implements the timestamp cross-linking protocol:
//!
//! - [`bitcode`] - framing codec turning a 64-bit timestamp into a
//!   fixed-length, optionally oversampled bit sequence and back
//! - [`cell`] - single-slot, overwrite-on-write timestamp channel
//!   between the producer and the transmitter
//! - [`transmitter`] - the transfer state machine driving the marker
//!   bracket and the clocked write/read-back cycle
//! - [`source`] - the timestamp producer sampling the monotonic clock
//!
//! The digital lines themselves are reached through the
//! [`tslink_dio::DioDriver`] capability, so everything here runs
//! unmodified against the loopback driver in tests.

pub mod bitcode;
pub mod cell;
pub mod source;
pub mod transmitter;

pub use bitcode::*;
pub use cell::*;
pub use source::*;
pub use transmitter::*;
