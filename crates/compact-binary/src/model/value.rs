//! Decoded field values.

use uuid::Uuid;

use crate::codec::Reader;
use crate::error::DecodeError;
use crate::limits::HASH_SIZE;
use crate::model::{FieldIter, FieldType, FieldView};

/// The value of one field, borrowing from the encoded buffer.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Object(FieldIter<'a>),
    Array(FieldIter<'a>),
    Binary(&'a [u8]),
    String(&'a str),
    /// IntegerPositive and IntegerNegative, widened so every encodable value fits.
    Integer(i128),
    Float32(f32),
    Float64(f64),
    Reference(&'a [u8; HASH_SIZE]),
    BinaryReference(&'a [u8; HASH_SIZE]),
    Hash(&'a [u8; HASH_SIZE]),
    Uuid(Uuid),
    /// Ticks since the epoch of the producing system.
    DateTime(i64),
    /// Duration in ticks.
    TimeSpan(i64),
}

impl<'a> Value<'a> {
    /// Decodes the payload of `field`.
    pub fn decode(field: &FieldView<'a>) -> Result<Value<'a>, DecodeError> {
        let mut reader = Reader::new(field.payload());
        let value = match field.field_type() {
            FieldType::None => {
                return Err(DecodeError::InvalidType {
                    tag: field.tag().raw(),
                });
            }
            FieldType::Null => Value::Null,
            FieldType::BoolFalse => Value::Bool(false),
            FieldType::BoolTrue => Value::Bool(true),
            FieldType::Object | FieldType::UniformObject => Value::Object(field.children()),
            FieldType::Array | FieldType::UniformArray => Value::Array(field.children()),
            FieldType::Binary => Value::Binary(reader.read_bytes_prefixed("binary")?),
            FieldType::String => {
                let bytes = reader.read_bytes_prefixed("string")?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { field: "string" })?;
                Value::String(s)
            }
            FieldType::IntegerPositive => {
                Value::Integer(i128::from(reader.read_var_uint("integer")?))
            }
            FieldType::IntegerNegative => {
                Value::Integer(-i128::from(reader.read_var_uint("integer")?) - 1)
            }
            FieldType::Float32 => Value::Float32(reader.read_f32_be("float32")?),
            FieldType::Float64 => Value::Float64(reader.read_f64_be("float64")?),
            FieldType::Reference => Value::Reference(reader.read_array("reference")?),
            FieldType::BinaryReference => {
                Value::BinaryReference(reader.read_array("binary reference")?)
            }
            FieldType::Hash => Value::Hash(reader.read_array("hash")?),
            FieldType::Uuid => Value::Uuid(Uuid::from_bytes(*reader.read_array("uuid")?)),
            FieldType::DateTime => Value::DateTime(reader.read_i64_be("date time")?),
            FieldType::TimeSpan => Value::TimeSpan(reader.read_i64_be("time span")?),
        };
        Ok(value)
    }

    /// Name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Binary(_) => "binary",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Reference(_) => "reference",
            Value::BinaryReference(_) => "binary reference",
            Value::Hash(_) => "hash",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "date time",
            Value::TimeSpan(_) => "time span",
        }
    }

    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        match self {
            Value::Integer(v) => i64::try_from(*v).map_err(|_| DecodeError::TypeMismatch {
                expected: "i64",
                found: "integer out of range",
            }),
            other => Err(mismatch("integer", other)),
        }
    }

    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        match self {
            Value::Integer(v) => u64::try_from(*v).map_err(|_| DecodeError::TypeMismatch {
                expected: "u64",
                found: "integer out of range",
            }),
            other => Err(mismatch("integer", other)),
        }
    }

    /// Float32 and Float64 values as f64.
    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        match self {
            Value::Float32(v) => Ok(f64::from(*v)),
            Value::Float64(v) => Ok(*v),
            other => Err(mismatch("float", other)),
        }
    }

    pub fn as_str(&self) -> Result<&'a str, DecodeError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value<'_>) -> DecodeError {
    DecodeError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}
