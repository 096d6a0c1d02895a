//! Byte and bit slice selection applied to payloads before decoding.

use std::borrow::Cow;

use i3x_core::config::ExtractConfig;

/// Select the configured slice of a payload.
///
/// No spec, or a spec selecting nothing, returns the payload unchanged.
/// Slices reaching outside the payload are clamped; a start past the end
/// yields an empty buffer, never an error.
pub fn extract<'a>(payload: &'a [u8], spec: Option<&ExtractConfig>) -> Cow<'a, [u8]> {
    let Some(spec) = spec else {
        return Cow::Borrowed(payload);
    };
    if let (Some(bit_offset), Some(bit_length)) = (spec.bit_offset, spec.bit_length) {
        return Cow::Owned(extract_bits(payload, bit_offset, bit_length));
    }
    if spec.byte_offset.is_none() && spec.byte_length.is_none() {
        return Cow::Borrowed(payload);
    }
    let start = spec.byte_offset.unwrap_or(0).min(payload.len());
    let end = match spec.byte_length {
        Some(length) => start.saturating_add(length).min(payload.len()),
        None => payload.len(),
    };
    Cow::Borrowed(&payload[start..end])
}

/// Extract a contiguous bit run, right-aligned in a buffer of
/// `ceil(bit_length / 8)` bytes with zeroed high bits. Bits are numbered
/// MSB-first within each byte.
fn extract_bits(payload: &[u8], bit_offset: usize, bit_length: usize) -> Vec<u8> {
    let total_bits = payload.len() * 8;
    if bit_offset >= total_bits || bit_length == 0 {
        return Vec::new();
    }
    let available = bit_length.min(total_bits - bit_offset);
    let out_len = (bit_length + 7) / 8;
    let mut out = vec![0u8; out_len];
    let out_bits = out_len * 8;
    for i in 0..available {
        let src = bit_offset + i;
        let bit = (payload[src / 8] >> (7 - (src % 8))) & 1;
        if bit != 0 {
            // Right-align: the run occupies the lowest positions.
            let dst = out_bits - available + i;
            out[dst / 8] |= 0x80 >> (dst % 8);
        }
    }
    out
}
