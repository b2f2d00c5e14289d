//! Error types for compact binary validation, decoding and encoding.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use thiserror::Error;

/// Bitmask of every problem category found by the validator.
///
/// The bit values are part of the wire contract and must not change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValidateError(u32);

impl ValidateError {
    /// No error.
    pub const NONE: ValidateError = ValidateError(0);

    // === Default mode ===
    /// A value, name or size extends past the end of the view.
    pub const OUT_OF_BOUNDS: ValidateError = ValidateError(1 << 0);
    /// A type byte is unknown, carries `HasFieldType`, or a field has zero size.
    pub const INVALID_TYPE: ValidateError = ValidateError(1 << 1);

    // === Names mode ===
    /// Two fields of one object share a name.
    pub const DUPLICATE_NAME: ValidateError = ValidateError(1 << 2);
    /// A field of an object has no name.
    pub const MISSING_NAME: ValidateError = ValidateError(1 << 3);
    /// A field of an array has a name.
    pub const ARRAY_NAME: ValidateError = ValidateError(1 << 4);

    // === Format mode ===
    /// A name or string payload is not valid UTF-8.
    pub const INVALID_STRING: ValidateError = ValidateError(1 << 5);
    /// A VarUInt uses more bytes than its value requires.
    pub const INVALID_INTEGER: ValidateError = ValidateError(1 << 6);
    /// A Float64 payload is exactly representable as a Float32.
    pub const INVALID_FLOAT: ValidateError = ValidateError(1 << 7);
    /// A plain Object whose fields all share one type.
    pub const NON_UNIFORM_OBJECT: ValidateError = ValidateError(1 << 8);
    /// A plain Array whose elements all share one type and carry payload.
    pub const NON_UNIFORM_ARRAY: ValidateError = ValidateError(1 << 9);

    // === Padding mode ===
    /// Bytes remain in the view after the top-level field.
    pub const PADDING: ValidateError = ValidateError(1 << 10);

    const NAMES: [(ValidateError, &'static str); 11] = [
        (Self::OUT_OF_BOUNDS, "OutOfBounds"),
        (Self::INVALID_TYPE, "InvalidType"),
        (Self::DUPLICATE_NAME, "DuplicateName"),
        (Self::MISSING_NAME, "MissingName"),
        (Self::ARRAY_NAME, "ArrayName"),
        (Self::INVALID_STRING, "InvalidString"),
        (Self::INVALID_INTEGER, "InvalidInteger"),
        (Self::INVALID_FLOAT, "InvalidFloat"),
        (Self::NON_UNIFORM_OBJECT, "NonUniformObject"),
        (Self::NON_UNIFORM_ARRAY, "NonUniformArray"),
        (Self::PADDING, "Padding"),
    ];

    /// Creates a mask from its raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        ValidateError(bits & 0x7ff)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no category is set.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every category in `other` is set.
    pub const fn contains(self, other: ValidateError) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any category in `other` is set.
    pub const fn intersects(self, other: ValidateError) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the mask holds an error that stops structural checks.
    pub const fn is_fatal(self) -> bool {
        self.intersects(ValidateError(Self::OUT_OF_BOUNDS.0 | Self::INVALID_TYPE.0))
    }

    /// Returns the mask without the categories in `other`.
    pub const fn without(self, other: ValidateError) -> Self {
        ValidateError(self.0 & !other.0)
    }

    /// Iterates the names of the set categories, lowest bit first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }

    /// Converts the mask into a `Result`, `Ok` when nothing is set.
    pub fn into_result(self) -> Result<(), ValidateError> {
        if self.is_none() { Ok(()) } else { Err(self) }
    }
}

impl BitOr for ValidateError {
    type Output = ValidateError;

    fn bitor(self, rhs: ValidateError) -> ValidateError {
        ValidateError(self.0 | rhs.0)
    }
}

impl BitOrAssign for ValidateError {
    fn bitor_assign(&mut self, rhs: ValidateError) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ValidateError {
    type Output = ValidateError;

    fn bitand(self, rhs: ValidateError) -> ValidateError {
        ValidateError(self.0 & rhs.0)
    }
}

impl fmt::Debug for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidateError({self})")
    }
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidateError {}

/// Error while reading a field from a byte view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid field type byte: {tag:#04x}")]
    InvalidType { tag: u8 },

    #[error("{context} does not fit in memory")]
    LengthOverflow { context: &'static str },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("expected a {expected} field, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl DecodeError {
    /// Returns the validator category this error corresponds to.
    pub fn category(&self) -> ValidateError {
        match self {
            DecodeError::UnexpectedEof { .. } | DecodeError::LengthOverflow { .. } => {
                ValidateError::OUT_OF_BOUNDS
            }
            DecodeError::InvalidType { .. } | DecodeError::TypeMismatch { .. } => {
                ValidateError::INVALID_TYPE
            }
            DecodeError::InvalidUtf8 { .. } => ValidateError::INVALID_STRING,
        }
    }
}

/// Error while saving a writer into caller-provided memory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("output buffer is {actual} bytes but the saved fields need exactly {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}
