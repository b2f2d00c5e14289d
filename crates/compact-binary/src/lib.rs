//! Compact binary: a small, self-describing binary value format.
//!
//! Every value is a field made of a one-byte type tag, an optional name and a
//! type-dependent payload. Objects hold named fields, arrays hold unnamed
//! elements, and both switch to a "uniform" encoding that stores the shared
//! type tag once when every child has the same type.
//!
//! This crate provides:
//! - a [`validate`] pass that proves an untrusted buffer is safe to read and
//!   reports every problem it finds as a [`ValidateError`] bitmask
//! - a [`Writer`] that builds buffers in canonical form, so that
//!   `validate(&writer.save(), ValidateMode::ALL)` is always clean
//! - [`FieldView`] and [`Value`] for reading validated buffers
//! - JSON rendering of fields through `serde` (feature `json`, on by default)
//!
//! # Quick Start
//!
//! ```rust
//! use compact_binary::{validate, FieldView, ValidateError, ValidateMode, Value, Writer};
//!
//! let mut writer = Writer::new();
//! writer.begin_object();
//! writer.name("name").string("Alice");
//! writer.name("age").int64(36);
//! writer.end_object();
//! let bytes = writer.save();
//!
//! assert_eq!(validate(&bytes, ValidateMode::ALL), ValidateError::NONE);
//!
//! let (object, _) = FieldView::parse(&bytes).unwrap();
//! for field in object.children() {
//!     let field = field.unwrap();
//!     match field.value().unwrap() {
//!         Value::String(s) => assert_eq!((field.name(), s), (Some("name"), "Alice")),
//!         Value::Integer(n) => assert_eq!((field.name(), n), (Some("age"), 36)),
//!         other => panic!("unexpected {other:?}"),
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`model`]: field types, type tags, field views, values and JSON rendering
//! - [`codec`]: VarUInt codec and the byte reader/writer primitives
//! - [`validate`]: validation of untrusted buffers
//! - [`writer`]: the canonical writer
//! - [`uniform`]: uniform container detection shared by both
//! - [`error`]: error types
//! - [`limits`]: fixed sizes of the format
//!
//! # Wire Format
//!
//! `[type byte][name length + name][payload]`, where the type byte is absent
//! inside uniform containers, bit 7 of the type byte marks a name, and all
//! multi-byte numbers are big-endian. See [`model::FieldType`] for payloads.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod uniform;
pub mod validate;
pub mod writer;

// Re-export commonly used types at crate root
pub use error::{DecodeError, EncodeError, ValidateError};
pub use model::{fields, FieldIter, FieldType, FieldView, TypeTag, Value};
pub use uniform::UniformityTracker;
pub use validate::{validate, validate_range, validate_with_type, ValidateMode};
pub use writer::Writer;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
