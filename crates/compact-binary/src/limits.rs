//! Fixed sizes and limits of the compact binary format.

/// Maximum number of bytes in an encoded VarUInt (one prefix byte plus eight).
pub const MAX_VAR_UINT_BYTES: usize = 9;

/// Payload size of Reference, BinaryReference and Hash fields.
pub const HASH_SIZE: usize = 32;

/// Payload size of Uuid fields.
pub const UUID_SIZE: usize = 16;

/// Payload size of DateTime and TimeSpan fields (big-endian i64 ticks).
pub const TICKS_SIZE: usize = 8;

/// Payload size of Float32 fields.
pub const FLOAT32_SIZE: usize = 4;

/// Payload size of Float64 fields.
pub const FLOAT64_SIZE: usize = 8;

/// Names the validator tracks inline before spilling to the heap.
pub const NAME_INLINE_CAPACITY: usize = 16;

/// Containers a field may be nested in when rendered as JSON.
#[cfg(feature = "json")]
pub const MAX_JSON_DEPTH: usize = 128;
