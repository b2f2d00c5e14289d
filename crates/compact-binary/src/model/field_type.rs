//! Field types and the one-byte type tag.
//!
//! A type tag holds the type selector in its low six bits and two flags:
//! `HAS_FIELD_NAME` (0x80) says a name follows the tag, `HAS_FIELD_TYPE`
//! (0x40) is an external signal meaning "the type is embedded in the stream"
//! and is never valid inside a decoded type byte.

use std::fmt;

use crate::limits::{FLOAT32_SIZE, FLOAT64_SIZE, HASH_SIZE, TICKS_SIZE, UUID_SIZE};

/// Field type selectors (wire values are fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Reserved, always invalid on the wire.
    None = 0x00,
    Null = 0x01,
    Object = 0x02,
    UniformObject = 0x03,
    Array = 0x04,
    UniformArray = 0x05,
    Binary = 0x06,
    String = 0x07,
    IntegerPositive = 0x08,
    IntegerNegative = 0x09,
    Float32 = 0x0a,
    Float64 = 0x0b,
    BoolFalse = 0x0c,
    BoolTrue = 0x0d,
    Reference = 0x0e,
    BinaryReference = 0x0f,
    Hash = 0x10,
    Uuid = 0x11,
    DateTime = 0x12,
    TimeSpan = 0x13,
}

impl FieldType {
    /// Creates a FieldType from its selector value.
    pub fn from_u8(v: u8) -> Option<FieldType> {
        match v {
            0x00 => Some(FieldType::None),
            0x01 => Some(FieldType::Null),
            0x02 => Some(FieldType::Object),
            0x03 => Some(FieldType::UniformObject),
            0x04 => Some(FieldType::Array),
            0x05 => Some(FieldType::UniformArray),
            0x06 => Some(FieldType::Binary),
            0x07 => Some(FieldType::String),
            0x08 => Some(FieldType::IntegerPositive),
            0x09 => Some(FieldType::IntegerNegative),
            0x0a => Some(FieldType::Float32),
            0x0b => Some(FieldType::Float64),
            0x0c => Some(FieldType::BoolFalse),
            0x0d => Some(FieldType::BoolTrue),
            0x0e => Some(FieldType::Reference),
            0x0f => Some(FieldType::BinaryReference),
            0x10 => Some(FieldType::Hash),
            0x11 => Some(FieldType::Uuid),
            0x12 => Some(FieldType::DateTime),
            0x13 => Some(FieldType::TimeSpan),
            _ => None,
        }
    }

    /// Returns the display name of this type.
    pub fn name(self) -> &'static str {
        match self {
            FieldType::None => "None",
            FieldType::Null => "Null",
            FieldType::Object => "Object",
            FieldType::UniformObject => "UniformObject",
            FieldType::Array => "Array",
            FieldType::UniformArray => "UniformArray",
            FieldType::Binary => "Binary",
            FieldType::String => "String",
            FieldType::IntegerPositive => "IntegerPositive",
            FieldType::IntegerNegative => "IntegerNegative",
            FieldType::Float32 => "Float32",
            FieldType::Float64 => "Float64",
            FieldType::BoolFalse => "BoolFalse",
            FieldType::BoolTrue => "BoolTrue",
            FieldType::Reference => "Reference",
            FieldType::BinaryReference => "BinaryReference",
            FieldType::Hash => "Hash",
            FieldType::Uuid => "Uuid",
            FieldType::DateTime => "DateTime",
            FieldType::TimeSpan => "TimeSpan",
        }
    }

    pub fn is_object(self) -> bool {
        matches!(self, FieldType::Object | FieldType::UniformObject)
    }

    pub fn is_array(self) -> bool {
        matches!(self, FieldType::Array | FieldType::UniformArray)
    }

    pub fn is_container(self) -> bool {
        self.is_object() || self.is_array()
    }

    pub fn is_integer(self) -> bool {
        matches!(self, FieldType::IntegerPositive | FieldType::IntegerNegative)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, FieldType::BoolFalse | FieldType::BoolTrue)
    }

    /// Returns the payload size for fixed-size types.
    pub fn fixed_payload_size(self) -> Option<usize> {
        match self {
            FieldType::Null | FieldType::BoolFalse | FieldType::BoolTrue => Some(0),
            FieldType::Float32 => Some(FLOAT32_SIZE),
            FieldType::Float64 => Some(FLOAT64_SIZE),
            FieldType::Reference | FieldType::BinaryReference | FieldType::Hash => Some(HASH_SIZE),
            FieldType::Uuid => Some(UUID_SIZE),
            FieldType::DateTime | FieldType::TimeSpan => Some(TICKS_SIZE),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw type tag: selector plus flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeTag(u8);

impl TypeTag {
    /// Flag set when a name follows the tag.
    pub const HAS_FIELD_NAME: u8 = 0x80;
    /// External-only flag: the type byte is embedded in the stream.
    pub const HAS_FIELD_TYPE: u8 = 0x40;
    /// Mask of the type selector bits.
    pub const SELECTOR_MASK: u8 = 0x3f;

    /// Tag to pass as an external type when the stream carries its own type byte.
    pub const EMBEDDED: TypeTag = TypeTag(Self::HAS_FIELD_TYPE);

    /// Wraps a raw tag byte.
    pub const fn from_raw(raw: u8) -> Self {
        TypeTag(raw)
    }

    /// Creates an unnamed tag for a type.
    pub const fn new(field_type: FieldType) -> Self {
        TypeTag(field_type as u8)
    }

    /// Returns this tag with the `HAS_FIELD_NAME` flag set or cleared.
    pub const fn with_name(self, named: bool) -> Self {
        if named {
            TypeTag(self.0 | Self::HAS_FIELD_NAME)
        } else {
            TypeTag(self.0 & !Self::HAS_FIELD_NAME)
        }
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn has_field_name(self) -> bool {
        self.0 & Self::HAS_FIELD_NAME != 0
    }

    pub const fn has_field_type(self) -> bool {
        self.0 & Self::HAS_FIELD_TYPE != 0
    }

    pub const fn selector(self) -> u8 {
        self.0 & Self::SELECTOR_MASK
    }

    /// Returns the field type if this tag is valid as a decoded type byte.
    ///
    /// `None` for a tag carrying `HAS_FIELD_TYPE`, the reserved selector 0, or
    /// a selector above `TimeSpan`.
    pub fn field_type(self) -> Option<FieldType> {
        if self.has_field_type() {
            return None;
        }
        match FieldType::from_u8(self.selector())? {
            FieldType::None => None,
            field_type => Some(field_type),
        }
    }
}

impl From<FieldType> for TypeTag {
    fn from(field_type: FieldType) -> Self {
        TypeTag::new(field_type)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field_type() {
            Some(t) if self.has_field_name() => write!(f, "TypeTag({t}WithName)"),
            Some(t) => write!(f, "TypeTag({t})"),
            None => write!(f, "TypeTag({:#04x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_covers_selectors() {
        for v in 0x00..=0x13u8 {
            let field_type = FieldType::from_u8(v).unwrap();
            assert_eq!(field_type as u8, v);
        }
        assert_eq!(FieldType::from_u8(0x14), None);
        assert_eq!(FieldType::from_u8(0x3f), None);
    }

    #[test]
    fn test_tag_flags() {
        let tag = TypeTag::new(FieldType::Null).with_name(true);
        assert_eq!(tag.raw(), 0x81);
        assert!(tag.has_field_name());
        assert_eq!(tag.field_type(), Some(FieldType::Null));
        assert_eq!(tag.with_name(false).raw(), 0x01);
    }

    #[test]
    fn test_invalid_tags() {
        assert_eq!(TypeTag::from_raw(0x00).field_type(), None);
        assert_eq!(TypeTag::from_raw(0x80).field_type(), None);
        assert_eq!(TypeTag::from_raw(0x14).field_type(), None);
        assert_eq!(TypeTag::from_raw(0x41).field_type(), None);
        assert_eq!(TypeTag::EMBEDDED.field_type(), None);
    }

    #[test]
    fn test_fixed_payload_size() {
        assert_eq!(FieldType::Null.fixed_payload_size(), Some(0));
        assert_eq!(FieldType::Hash.fixed_payload_size(), Some(32));
        assert_eq!(FieldType::Uuid.fixed_payload_size(), Some(16));
        assert_eq!(FieldType::TimeSpan.fixed_payload_size(), Some(8));
        assert_eq!(FieldType::String.fixed_payload_size(), None);
        assert_eq!(FieldType::UniformArray.fixed_payload_size(), None);
    }
}
