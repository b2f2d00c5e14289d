//! Primitive encoding/decoding for the compact binary format.
//!
//! Implements the bounds-checked byte cursor used by the validator and the
//! field view, and the byte accumulator used by the writer.

use crate::codec::var_uint;
use crate::error::DecodeError;
use crate::limits::MAX_VAR_UINT_BYTES;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and never reads past its end. Sub-readers created with
/// [`Reader::sub_reader`] remember their offset in the outermost view so
/// diagnostics can report absolute positions.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the current position relative to the outermost view.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Skips every remaining byte.
    pub fn drain(&mut self) {
        self.pos = self.data.len();
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads exactly `N` bytes into a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<&'a [u8; N], DecodeError> {
        let bytes = self.read_bytes(N, context)?;
        bytes
            .try_into()
            .map_err(|_| DecodeError::UnexpectedEof { context })
    }

    /// Splits off the next `n` bytes as an independent reader.
    #[inline]
    pub fn sub_reader(&mut self, n: usize, context: &'static str) -> Result<Reader<'a>, DecodeError> {
        let base = self.offset();
        let data = self.read_bytes(n, context)?;
        Ok(Reader { data, pos: 0, base })
    }

    /// Reads a VarUInt, returning the value and its encoded length.
    #[inline]
    pub fn read_var_uint_measured(
        &mut self,
        context: &'static str,
    ) -> Result<(u64, usize), DecodeError> {
        let (value, len) = var_uint::decode(self.remaining())
            .map_err(|_| DecodeError::UnexpectedEof { context })?;
        self.pos += len;
        Ok((value, len))
    }

    /// Reads a VarUInt.
    #[inline]
    pub fn read_var_uint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        self.read_var_uint_measured(context).map(|(value, _)| value)
    }

    /// Reads a VarUInt that describes a byte length or element count.
    #[inline]
    pub fn read_len(&mut self, context: &'static str) -> Result<usize, DecodeError> {
        let value = self.read_var_uint(context)?;
        usize::try_from(value).map_err(|_| DecodeError::LengthOverflow { context })
    }

    /// Reads a VarUInt length prefix followed by that many bytes.
    #[inline]
    pub fn read_bytes_prefixed(&mut self, context: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.read_len(context)?;
        self.read_bytes(len, context)
    }

    /// Reads a big-endian i64.
    #[inline]
    pub fn read_i64_be(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        self.read_array::<8>(context).map(|b| i64::from_be_bytes(*b))
    }

    /// Reads a big-endian f32.
    #[inline]
    pub fn read_f32_be(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        self.read_array::<4>(context).map(|b| f32::from_be_bytes(*b))
    }

    /// Reads a big-endian f64.
    #[inline]
    pub fn read_f64_be(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        self.read_array::<8>(context).map(|b| f64::from_be_bytes(*b))
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Growable byte accumulator for encoding.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards the written bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a minimal VarUInt.
    #[inline]
    pub fn write_var_uint(&mut self, value: u64) {
        let mut buf = [0u8; MAX_VAR_UINT_BYTES];
        let len = var_uint::encode_into(value, &mut buf);
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a VarUInt length prefix followed by the bytes.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_var_uint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a big-endian i64.
    pub fn write_i64_be(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a big-endian f32.
    pub fn write_f32_be(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a big-endian f64.
    pub fn write_f64_be(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }
}
