//! Variable-length unsigned integers.
//!
//! The number of leading one bits in the first byte gives the number of
//! continuation bytes that follow (0 to 8). The remaining bits of the first
//! byte and the continuation bytes hold the value, most significant first.
//!
//! | Value range          | Bytes | First byte  |
//! |----------------------|-------|-------------|
//! | `0..2^7`             | 1     | `0xxxxxxx`  |
//! | `2^7..2^14`          | 2     | `10xxxxxx`  |
//! | `2^14..2^21`         | 3     | `110xxxxx`  |
//! | ...                  | ...   | ...         |
//! | `2^56..2^64`         | 9     | `11111111`  |

use crate::error::DecodeError;
use crate::limits::MAX_VAR_UINT_BYTES;

/// Returns the encoded length implied by the first byte of a VarUInt.
#[inline]
pub fn measure_from_first_byte(first: u8) -> usize {
    (!first).leading_zeros() as usize + 1
}

/// Returns the minimal encoded length of `value`.
#[inline]
pub fn measure(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    ((bits - 1) / 7 + 1).min(MAX_VAR_UINT_BYTES)
}

/// Encodes `value` into the front of `out` and returns the number of bytes
/// written. `out` must hold at least `measure(value)` bytes.
#[inline]
pub fn encode_into(value: u64, out: &mut [u8]) -> usize {
    let len = measure(value);
    let be = value.to_be_bytes();
    if len == MAX_VAR_UINT_BYTES {
        out[0] = 0xff;
        out[1..MAX_VAR_UINT_BYTES].copy_from_slice(&be);
    } else {
        out[..len].copy_from_slice(&be[8 - len..]);
        out[0] |= (0xffu32 << (9 - len)) as u8;
    }
    len
}

/// Encodes `value` into a stack buffer, returning the buffer and its used length.
#[inline]
pub fn encode(value: u64) -> ([u8; MAX_VAR_UINT_BYTES], usize) {
    let mut buf = [0u8; MAX_VAR_UINT_BYTES];
    let len = encode_into(value, &mut buf);
    (buf, len)
}

/// Decodes a VarUInt from the front of `data`, returning the value and the
/// number of bytes consumed.
#[inline]
pub fn decode(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    let first = *data
        .first()
        .ok_or(DecodeError::UnexpectedEof { context: "var uint" })?;
    let len = measure_from_first_byte(first);
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof { context: "var uint" });
    }
    let mut value = u64::from(first) & (0xffu64 >> len);
    for &byte in &data[1..len] {
        value = (value << 8) | u64::from(byte);
    }
    Ok((value, len))
}

/// Returns true if a VarUInt of `len` bytes holding `value` is minimal.
#[inline]
pub fn is_canonical(value: u64, len: usize) -> bool {
    measure(value) == len
}
