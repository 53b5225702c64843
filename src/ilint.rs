//! ILInt and raw ILTag encoding
//!
//! ILInt is the variable-length unsigned integer used throughout the
//! InterlockLedger binary formats:
//!
//! ```text
//! value < 0xF8      -> [value]
//! value >= 0xF8     -> [0xF7 + n][(value - 0xF8) as n big-endian bytes], 1 <= n <= 8
//! ```
//!
//! A raw tag is `ILInt(tag_id) ++ ILInt(payload length) ++ payload`.

use crate::error::{Il2Error, Result};

/// Smallest value that needs a multi-byte encoding.
pub const ILINT_BASE: u64 = 0xF8;

/// Tag id of an ILTag byte array.
pub const BYTE_ARRAY_TAG: u64 = 16;

/// Tag id of the RSA public parameters frame (modulus, exponent).
pub const RSA_PARAMETERS_TAG: u64 = 40;

/// Number of bytes `encode` will emit for `value`.
pub fn encoded_size(value: u64) -> usize {
    if value < ILINT_BASE {
        1
    } else {
        1 + payload_size(value - ILINT_BASE)
    }
}

fn payload_size(offset: u64) -> usize {
    let significant = 8 - (offset.leading_zeros() as usize / 8);
    significant.max(1)
}

/// Append the ILInt encoding of `value` to `out`.
pub fn encode(value: u64, out: &mut Vec<u8>) {
    if value < ILINT_BASE {
        out.push(value as u8);
        return;
    }
    let offset = value - ILINT_BASE;
    let size = payload_size(offset);
    out.push(0xF7 + size as u8);
    out.extend_from_slice(&offset.to_be_bytes()[8 - size..]);
}

/// Decode an ILInt from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
    let header = *bytes
        .first()
        .ok_or_else(|| Il2Error::Framing("missing ILInt header".to_string()))?;
    if (header as u64) < ILINT_BASE {
        return Ok((header as u64, 1));
    }

    let size = (header - 0xF7) as usize;
    if bytes.len() < 1 + size {
        return Err(Il2Error::Framing(format!(
            "ILInt needs {} bytes but only {} are available",
            1 + size,
            bytes.len()
        )));
    }

    let offset = bytes[1..=size]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | *b as u64);
    let value = offset
        .checked_add(ILINT_BASE)
        .ok_or_else(|| Il2Error::Framing("ILInt overflows 64 bits".to_string()))?;
    Ok((value, 1 + size))
}

/// Serialize a raw ILTag frame.
pub fn encode_raw_tag(tag_id: u64, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(
        encoded_size(tag_id) + encoded_size(payload.len() as u64) + payload.len(),
    );
    encode(tag_id, &mut frame);
    encode(payload.len() as u64, &mut frame);
    frame.extend_from_slice(payload);
    frame
}
