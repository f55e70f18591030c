//! Timestamp bitcode framing codec.
//!
//! A bitcode is a fixed-length binary digit sequence: a 2-digit start
//! marker, the 64 payload bits of the timestamp in big-endian order,
//! and a 2-digit end marker. For clock-skew tolerance each logical
//! digit may be replicated `repeat` times contiguously, so the external
//! recorder can sample the line with loose alignment and still land
//! inside every digit's repeat block.
//!
//! The read-back stream produced by the paired clocked read trails the
//! written stream by exactly one sample, so decoding discards a single
//! leading sample before anything else.

use tslink_common::{LinkError, LinkResult};

/// Payload width: the full 64-bit timestamp, no truncation possible.
pub const PAYLOAD_BITS: usize = 64;

/// Framing digits: 2-digit start marker + 2-digit end marker.
pub const FRAME_BITS: usize = 4;

/// Logical digits per bitcode.
pub const CODE_DIGITS: usize = PAYLOAD_BITS + FRAME_BITS;

/// Start-of-bitcode marker, sent first: a LOW digit then a HIGH digit
/// (`0b01` read in transmission order).
pub const START_MARKER: [u8; 2] = [0, 1];

/// End-of-bitcode marker, sent last: a HIGH digit then a LOW digit
/// (`0b10` read in transmission order).
pub const END_MARKER: [u8; 2] = [1, 0];

/// Physical sample count of an encoded bitcode.
#[must_use]
pub fn physical_len(repeat: usize) -> usize {
    CODE_DIGITS * repeat
}

/// Physical sample count of a read-back sequence, including the
/// one-sample pipeline offset.
#[must_use]
pub fn readback_len(repeat: usize) -> usize {
    physical_len(repeat) + 1
}

/// Encode a timestamp into a bitcode sample sequence.
///
/// Pure and total: every `u64` is representable because the payload
/// width equals the value width. `repeat = 1` yields the unexpanded
/// 68-digit framing. Samples are `0`/`1` bytes ready for a clocked
/// digital write.
///
/// # Panics
///
/// Debug builds assert `repeat >= 1`; a zero repeat factor is rejected
/// earlier by configuration validation.
#[must_use]
pub fn encode(value: u64, repeat: usize) -> Vec<u8> {
    debug_assert!(repeat >= 1, "repeat factor must be >= 1");

    let mut samples = Vec::with_capacity(physical_len(repeat));
    let mut push_digit = |digit: u8| {
        for _ in 0..repeat {
            samples.push(digit);
        }
    };

    for digit in START_MARKER {
        push_digit(digit);
    }
    // Big-endian payload: most significant bit first.
    for bit in (0..PAYLOAD_BITS).rev() {
        push_digit(((value >> bit) & 1) as u8);
    }
    for digit in END_MARKER {
        push_digit(digit);
    }

    samples
}

/// Decode a read-back sample sequence into the transmitted timestamp.
///
/// The input must hold exactly `68 * repeat + 1` samples. The leading
/// sample is the read/write pipeline offset and is discarded. One
/// representative sample is then taken per repeat block - the FIRST
/// sample of the block, not a majority vote - and the framing digits
/// are stripped without being validated. The remaining 64 digits are
/// reassembled big-endian.
///
/// Decoding is total over well-formed-length inputs: corrupted framing
/// or payload still yields some value. Whether that value matches what
/// was sent is the transmitter's verify step, not the decoder's.
///
/// # Errors
///
/// Returns [`LinkError::ReadbackLength`] if the sample count does not
/// match the configured transfer; this indicates a caller bug, not a
/// line-level fault.
pub fn decode(readback: &[u8], repeat: usize) -> LinkResult<u64> {
    let expected = readback_len(repeat);
    if readback.len() != expected {
        return Err(LinkError::ReadbackLength {
            expected,
            actual: readback.len(),
        });
    }

    // Discard the pipeline sample, then index whole repeat blocks.
    let digits = &readback[1..];
    let payload_blocks = (START_MARKER.len())..(CODE_DIGITS - END_MARKER.len());

    let mut value = 0u64;
    for block in payload_blocks {
        let sample = digits[block * repeat];
        value = (value << 1) | u64::from(sample != 0);
    }
    Ok(value)
}
