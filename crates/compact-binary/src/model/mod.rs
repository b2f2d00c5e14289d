//! Data model types for compact binary.
//!
//! - Field types and the one-byte type tag
//! - Borrowed field views and iterators over encoded fields
//! - Decoded values
//! - JSON rendering (feature `json`)

pub mod field;
pub mod field_type;
#[cfg(feature = "json")]
pub mod json;
pub mod value;

pub use field::{fields, FieldIter, FieldView};
pub use field_type::{FieldType, TypeTag};
pub use value::Value;
