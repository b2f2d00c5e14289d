//! Builder for canonical compact binary buffers.
//!
//! Scalars are encoded into one shared buffer as they are written. Each open
//! container records its children as pieces: byte ranges of that buffer or
//! containers that were already closed. Closing a container picks between the
//! plain and the uniform encoding and computes its header from the children's
//! sizes without copying them. Saving walks the finished pieces once, so the
//! cost stays linear in the output size however deep the nesting goes. Fields
//! written outside any container form a top-level field sequence.
//!
//! # Example
//!
//! ```rust
//! use compact_binary::{validate, ValidateError, ValidateMode, Writer};
//!
//! let mut writer = Writer::new();
//! writer.begin_object();
//! writer.name("target").string("Editor");
//! writer.name("warnings").int64(3);
//! writer.name("files").begin_array();
//! writer.string("a.cpp").string("b.cpp");
//! writer.end_array();
//! writer.end_object();
//!
//! let bytes = writer.save();
//! assert_eq!(validate(&bytes, ValidateMode::ALL), ValidateError::NONE);
//! ```
//!
//! Misuse (unbalanced begin/end, naming an array element, leaving an object
//! field unnamed, reusing a name, saving with open containers) is a
//! programming error and panics.

#[cfg(debug_assertions)]
use rustc_hash::FxHashSet;
use tracing::debug;
use uuid::Uuid;

use crate::codec::ByteWriter;
use crate::error::EncodeError;
use crate::limits::HASH_SIZE;
use crate::model::{FieldType, FieldView, TypeTag};
use crate::uniform::UniformityTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Object,
    Array,
}

/// One finished child of a container.
#[derive(Debug, Clone, Copy)]
enum Piece {
    /// A scalar or copied field in the shared buffer.
    Bytes { start: usize, end: usize },
    /// A closed container, by index into the node arena.
    Node(usize),
}

/// A closed container.
#[derive(Debug, Clone)]
struct Node {
    /// Type byte, name, size, array count and shared type.
    head: ByteWriter,
    children: Vec<Piece>,
    /// Children are written without their type byte.
    uniform: bool,
}

/// One open container (or the top-level sequence).
#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// The container's own name, written when it closes.
    name: Option<String>,
    children: Vec<Piece>,
    /// Encoded size of all children, type bytes included.
    len: usize,
    tracker: UniformityTracker,
    #[cfg(debug_assertions)]
    names: FxHashSet<String>,
}

impl Frame {
    fn new(kind: FrameKind, name: Option<String>) -> Self {
        Self {
            kind,
            name,
            children: Vec::new(),
            len: 0,
            tracker: UniformityTracker::new(),
            #[cfg(debug_assertions)]
            names: FxHashSet::default(),
        }
    }

    fn push(&mut self, piece: Piece, tag: TypeTag, len: usize) {
        self.children.push(piece);
        self.len += len;
        self.tracker.observe(tag, len - 1);
    }

    fn clear(&mut self) {
        self.children.clear();
        self.len = 0;
        self.tracker.reset();
        #[cfg(debug_assertions)]
        self.names.clear();
    }
}

/// Stack-based builder producing canonical compact binary.
#[derive(Debug, Clone)]
pub struct Writer {
    data: ByteWriter,
    nodes: Vec<Node>,
    frames: Vec<Frame>,
    pending_name: Option<String>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new writer whose scalar buffer starts with `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: ByteWriter::with_capacity(capacity),
            nodes: Vec::new(),
            frames: vec![Frame::new(FrameKind::Root, None)],
            pending_name: None,
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Names the next field. Required for object fields, forbidden for array
    /// elements, optional at the top level.
    pub fn name(&mut self, name: &str) -> &mut Self {
        debug_assert!(
            self.pending_name.is_none(),
            "name() called twice without writing a field"
        );
        debug_assert!(!name.is_empty(), "field names must not be empty");
        debug_assert!(
            self.current().kind != FrameKind::Array,
            "array elements cannot be named"
        );
        self.pending_name = Some(name.to_owned());
        self
    }

    /// Consumes the pending name (or `fallback`) for a field in the current
    /// container.
    fn take_name(&mut self, fallback: Option<&str>) -> Option<String> {
        let pending = self.pending_name.take();
        let frame = self.current_mut();
        match frame.kind {
            FrameKind::Array => None,
            FrameKind::Root => pending.or_else(|| fallback.map(str::to_owned)),
            FrameKind::Object => {
                let name = pending.or_else(|| fallback.map(str::to_owned));
                debug_assert!(name.is_some(), "object fields must be named");
                #[cfg(debug_assertions)]
                if let Some(name) = &name {
                    assert!(
                        frame.names.insert(name.clone()),
                        "duplicate field name {name:?} in object"
                    );
                }
                name
            }
        }
    }

    fn current(&self) -> &Frame {
        self.frames.last().expect("writer always has a root frame")
    }

    fn current_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("writer always has a root frame")
    }

    fn scalar(&mut self, field_type: FieldType, payload: impl FnOnce(&mut ByteWriter)) -> &mut Self {
        let name = self.take_name(None);
        self.write_field(field_type, name.as_deref(), payload);
        self
    }

    fn write_field(
        &mut self,
        field_type: FieldType,
        name: Option<&str>,
        payload: impl FnOnce(&mut ByteWriter),
    ) {
        let start = self.data.len();
        let tag = TypeTag::new(field_type).with_name(name.is_some());
        self.data.write_byte(tag.raw());
        if let Some(name) = name {
            self.data.write_bytes_prefixed(name.as_bytes());
        }
        payload(&mut self.data);
        let end = self.data.len();
        self.current_mut()
            .push(Piece::Bytes { start, end }, tag, end - start);
    }

    // =========================================================================
    // Values
    // =========================================================================

    pub fn null(&mut self) -> &mut Self {
        self.scalar(FieldType::Null, |_| {})
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        let field_type = if value {
            FieldType::BoolTrue
        } else {
            FieldType::BoolFalse
        };
        self.scalar(field_type, |_| {})
    }

    /// Writes an integer, negative values as the ones' complement of their
    /// magnitude.
    pub fn int64(&mut self, value: i64) -> &mut Self {
        if value >= 0 {
            self.uint64(value as u64)
        } else {
            self.scalar(FieldType::IntegerNegative, |buf| {
                buf.write_var_uint(!(value as u64))
            })
        }
    }

    pub fn uint64(&mut self, value: u64) -> &mut Self {
        self.scalar(FieldType::IntegerPositive, |buf| buf.write_var_uint(value))
    }

    pub fn float32(&mut self, value: f32) -> &mut Self {
        self.scalar(FieldType::Float32, |buf| buf.write_f32_be(value))
    }

    /// Writes a Float32 when `value` survives the round trip through f32,
    /// otherwise a Float64.
    pub fn float64(&mut self, value: f64) -> &mut Self {
        let narrow = value as f32;
        if f64::from(narrow) == value {
            self.float32(narrow)
        } else {
            self.scalar(FieldType::Float64, |buf| buf.write_f64_be(value))
        }
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.scalar(FieldType::String, |buf| {
            buf.write_bytes_prefixed(value.as_bytes())
        })
    }

    pub fn binary(&mut self, value: &[u8]) -> &mut Self {
        self.scalar(FieldType::Binary, |buf| buf.write_bytes_prefixed(value))
    }

    /// Writes the hash of a compact binary object stored elsewhere.
    pub fn reference(&mut self, hash: &[u8; HASH_SIZE]) -> &mut Self {
        self.scalar(FieldType::Reference, |buf| buf.write_bytes(hash))
    }

    /// Writes the hash of a binary blob stored elsewhere.
    pub fn binary_reference(&mut self, hash: &[u8; HASH_SIZE]) -> &mut Self {
        self.scalar(FieldType::BinaryReference, |buf| buf.write_bytes(hash))
    }

    pub fn hash(&mut self, hash: &[u8; HASH_SIZE]) -> &mut Self {
        self.scalar(FieldType::Hash, |buf| buf.write_bytes(hash))
    }

    pub fn uuid(&mut self, value: Uuid) -> &mut Self {
        self.scalar(FieldType::Uuid, |buf| buf.write_bytes(value.as_bytes()))
    }

    pub fn date_time(&mut self, ticks: i64) -> &mut Self {
        self.scalar(FieldType::DateTime, |buf| buf.write_i64_be(ticks))
    }

    pub fn time_span(&mut self, ticks: i64) -> &mut Self {
        self.scalar(FieldType::TimeSpan, |buf| buf.write_i64_be(ticks))
    }

    /// Copies an encoded field, including all of its children.
    ///
    /// A pending name replaces the field's own name. Inside an array the
    /// copy is unnamed.
    pub fn field(&mut self, field: &FieldView<'_>) -> &mut Self {
        let name = self.take_name(field.name());
        let payload = field.payload();
        self.write_field(field.field_type(), name.as_deref(), |buf| {
            buf.write_bytes(payload)
        });
        self
    }

    // =========================================================================
    // Containers
    // =========================================================================

    pub fn begin_object(&mut self) -> &mut Self {
        self.begin(FrameKind::Object)
    }

    pub fn end_object(&mut self) -> &mut Self {
        self.end(FrameKind::Object)
    }

    pub fn begin_array(&mut self) -> &mut Self {
        self.begin(FrameKind::Array)
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.end(FrameKind::Array)
    }

    fn begin(&mut self, kind: FrameKind) -> &mut Self {
        let name = self.take_name(None);
        self.frames.push(Frame::new(kind, name));
        self
    }

    fn end(&mut self, kind: FrameKind) -> &mut Self {
        debug_assert!(
            self.pending_name.is_none(),
            "name() must be followed by a field before closing a container"
        );
        assert!(
            self.frames.len() > 1 && self.current().kind == kind,
            "end_{} without a matching begin",
            if kind == FrameKind::Object { "object" } else { "array" }
        );
        let frame = self.frames.pop().expect("checked above");
        let (uniform, field_type) = match kind {
            FrameKind::Array if frame.tracker.is_uniform_array() => (true, FieldType::UniformArray),
            FrameKind::Array => (false, FieldType::Array),
            _ if frame.tracker.is_uniform_object() => (true, FieldType::UniformObject),
            _ => (false, FieldType::Object),
        };
        let count = frame.children.len();
        let children_len = if uniform { frame.len - count } else { frame.len };

        let mut prefix = ByteWriter::new();
        if kind == FrameKind::Array {
            prefix.write_var_uint(count as u64);
        }
        if let Some(shared) = frame.tracker.uniform_tag().filter(|_| uniform) {
            prefix.write_byte(shared.raw());
        }

        let tag = TypeTag::new(field_type).with_name(frame.name.is_some());
        let mut head = ByteWriter::new();
        head.write_byte(tag.raw());
        if let Some(name) = &frame.name {
            head.write_bytes_prefixed(name.as_bytes());
        }
        head.write_var_uint((prefix.len() + children_len) as u64);
        head.write_bytes(prefix.as_bytes());

        let len = head.len() + children_len;
        let index = self.nodes.len();
        self.nodes.push(Node {
            head,
            children: frame.children,
            uniform,
        });
        self.current_mut().push(Piece::Node(index), tag, len);
        self
    }

    // =========================================================================
    // Saving
    // =========================================================================

    fn root(&self) -> &Frame {
        assert!(
            self.frames.len() == 1,
            "cannot save while {} container(s) are open",
            self.frames.len() - 1
        );
        debug_assert!(self.pending_name.is_none(), "name() without a field");
        &self.frames[0]
    }

    /// Hands the encoded top-level fields to `sink` in order.
    fn emit(&self, mut sink: impl FnMut(&[u8])) {
        let root = self.root();
        let data = self.data.as_bytes();
        let mut stack = vec![(root.children.iter(), false)];
        while let Some((pieces, uniform)) = stack.last_mut() {
            // Children of a uniform container drop their type byte.
            let skip = usize::from(*uniform);
            let Some(&piece) = pieces.next() else {
                stack.pop();
                continue;
            };
            match piece {
                Piece::Bytes { start, end } => sink(&data[start + skip..end]),
                Piece::Node(index) => {
                    let node = &self.nodes[index];
                    sink(&node.head.as_bytes()[skip..]);
                    stack.push((node.children.iter(), node.uniform));
                }
            }
        }
    }

    /// Number of bytes `save` will produce.
    pub fn save_size(&self) -> usize {
        self.root().len
    }

    /// Returns the encoded top-level fields.
    pub fn save(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.save_size());
        self.emit(|bytes| out.extend_from_slice(bytes));
        debug!(
            bytes = out.len(),
            fields = self.frames[0].children.len(),
            containers = self.nodes.len(),
            "saved compact binary"
        );
        out
    }

    /// Copies the encoded fields into `out`, which must be exactly
    /// `save_size()` bytes long.
    pub fn save_to_slice(&self, out: &mut [u8]) -> Result<(), EncodeError> {
        let expected = self.save_size();
        if out.len() != expected {
            return Err(EncodeError::BufferSizeMismatch {
                expected,
                actual: out.len(),
            });
        }
        let mut at = 0;
        self.emit(|bytes| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        });
        debug!(bytes = expected, "saved compact binary into slice");
        Ok(())
    }

    /// Consumes the writer and returns the encoded fields.
    pub fn into_bytes(self) -> Vec<u8> {
        self.save()
    }

    /// Discards everything written, keeping the scalar buffer's allocation.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        self.frames[0].clear();
        self.nodes.clear();
        self.data.clear();
        self.pending_name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate, validate_range, ValidateMode};
    use crate::error::ValidateError;

    fn saved(build: impl FnOnce(&mut Writer)) -> Vec<u8> {
        let mut writer = Writer::new();
        build(&mut writer);
        let bytes = writer.save();
        assert_eq!(
            validate_range(&bytes, ValidateMode::ALL),
            ValidateError::NONE,
            "{bytes:02x?}"
        );
        bytes
    }

    #[test]
    fn test_scalar_encodings() {
        assert_eq!(saved(|w| { w.null(); }), [0x01]);
        assert_eq!(saved(|w| { w.bool(true); }), [0x0d]);
        assert_eq!(saved(|w| { w.name("b").bool(false); }), [0x8c, 1, b'b']);
        assert_eq!(saved(|w| { w.int64(0); }), [0x08, 0x00]);
        assert_eq!(saved(|w| { w.int64(-1); }), [0x09, 0x00]);
        assert_eq!(saved(|w| { w.int64(-129); }), [0x09, 0x80, 0x80]);
        assert_eq!(saved(|w| { w.uint64(128); }), [0x08, 0x80, 0x80]);
        assert_eq!(saved(|w| { w.string("hi"); }), [0x07, 2, b'h', b'i']);
        assert_eq!(saved(|w| { w.binary(&[]); }), [0x06, 0]);
        assert_eq!(
            saved(|w| { w.date_time(1); }),
            [0x12, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_int64_extremes() {
        let min = saved(|w| {
            w.int64(i64::MIN);
        });
        assert_eq!(min[0], 0x09);
        assert_eq!(&min[1..], &[0xff, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        let max = saved(|w| {
            w.uint64(u64::MAX);
        });
        assert_eq!(max.len(), 10);
    }

    #[test]
    fn test_float_downgrade() {
        assert_eq!(saved(|w| { w.float64(1.5); }), [0x0a, 0x3f, 0xc0, 0, 0]);
        let precise = saved(|w| {
            w.float64(0.1);
        });
        assert_eq!(precise[0], 0x0b);
        assert_eq!(precise.len(), 9);
        assert_eq!(saved(|w| { w.float64(f64::INFINITY); })[0], 0x0a);
        assert_eq!(saved(|w| { w.float64(1e300); })[0], 0x0b);
        assert_eq!(saved(|w| { w.float64(f64::NAN); })[0], 0x0b);
    }

    #[test]
    fn test_empty_containers() {
        let object = saved(|w| {
            w.begin_object().end_object();
        });
        assert_eq!(object, [0x02, 0x00]);
        let array = saved(|w| {
            w.begin_array().end_array();
        });
        assert_eq!(array, [0x04, 0x01, 0x00]);
    }

    #[test]
    fn test_uniform_object() {
        let bytes = saved(|w| {
            w.begin_object();
            w.name("a").int64(1);
            w.name("b").int64(2);
            w.end_object();
        });
        assert_eq!(bytes, [0x03, 7, 0x88, 1, b'a', 1, 1, b'b', 2]);
    }

    #[test]
    fn test_mixed_object_stays_plain() {
        let bytes = saved(|w| {
            w.begin_object();
            w.name("a").int64(1);
            w.name("b").null();
            w.end_object();
        });
        assert_eq!(bytes, [0x02, 7, 0x88, 1, b'a', 1, 0x81, 1, b'b']);
    }

    #[test]
    fn test_uniform_array() {
        let bytes = saved(|w| {
            w.begin_array().int64(1).int64(2).end_array();
        });
        assert_eq!(bytes, [0x05, 4, 2, 0x08, 1, 2]);
    }

    #[test]
    fn test_array_of_nulls_stays_plain() {
        let bytes = saved(|w| {
            w.begin_array().null().null().end_array();
        });
        assert_eq!(bytes, [0x04, 3, 2, 0x01, 0x01]);
    }

    #[test]
    fn test_nested_containers() {
        let bytes = saved(|w| {
            w.begin_object();
            w.name("items").begin_array();
            for i in 0..3 {
                w.begin_object();
                w.name("id").uint64(i);
                w.end_object();
            }
            w.end_array();
            w.end_object();
        });
        assert_eq!(bytes[0], 0x03);
        // Each element is a uniform object, so the array is uniform too.
        assert_eq!(
            &bytes[1..12],
            &[28, 0x85, 5, b'i', b't', b'e', b'm', b's', 20, 3, 0x03]
        );
    }

    #[test]
    fn test_top_level_sequence() {
        let bytes = saved(|w| {
            w.name("a").null();
            w.uint64(7);
        });
        assert_eq!(bytes, [0x81, 1, b'a', 0x08, 7]);
    }

    #[test]
    fn test_field_copy() {
        let source = saved(|w| {
            w.name("n").uint64(300);
        });
        let (field, _) = FieldView::parse(&source).unwrap();

        let copied = saved(|w| {
            w.field(&field);
        });
        assert_eq!(copied, source);

        let renamed = saved(|w| {
            w.begin_object();
            w.name("m").field(&field);
            w.end_object();
        });
        assert_eq!(renamed, [0x03, 5, 0x88, 1, b'm', 0x81, 0x2c]);

        let in_array = saved(|w| {
            w.begin_array().field(&field).end_array();
        });
        assert_eq!(in_array, [0x05, 4, 1, 0x08, 0x81, 0x2c]);
    }

    #[test]
    fn test_save_to_slice() {
        let mut writer = Writer::new();
        writer.string("abc");
        assert_eq!(writer.save_size(), 5);

        let mut out = [0u8; 5];
        writer.save_to_slice(&mut out).unwrap();
        assert_eq!(out, [0x07, 3, b'a', b'b', b'c']);

        let mut short = [0u8; 4];
        assert_eq!(
            writer.save_to_slice(&mut short),
            Err(EncodeError::BufferSizeMismatch {
                expected: 5,
                actual: 4
            })
        );
    }

    #[test]
    fn test_reset_and_into_bytes() {
        let mut writer = Writer::with_capacity(64);
        writer.begin_object();
        writer.name("x").null();
        writer.reset();
        writer.bool(true);
        assert_eq!(writer.into_bytes(), vec![0x0d]);
    }

    #[test]
    fn test_nested_uniform_arrays() {
        let bytes = saved(|w| {
            w.begin_array().begin_array().null().end_array().end_array();
        });
        assert_eq!(bytes, [0x05, 5, 1, 0x04, 2, 1, 0x01]);
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 100_000;
        let mut writer = Writer::new();
        for _ in 0..depth {
            writer.begin_array();
        }
        writer.null();
        for _ in 0..depth {
            writer.end_array();
        }
        let bytes = writer.save();
        assert_eq!(bytes.len(), writer.save_size());
        assert_eq!(validate(&bytes, ValidateMode::ALL), ValidateError::NONE);

        let mut out = vec![0u8; bytes.len()];
        writer.save_to_slice(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_deep_objects_and_arrays() {
        let depth = 20_000;
        let bytes = saved(|w| {
            for level in 0..depth {
                if level % 2 == 0 {
                    w.begin_object();
                    w.name("next");
                } else {
                    w.begin_array();
                }
            }
            w.uint64(depth);
            for level in (0..depth).rev() {
                if level % 2 == 0 {
                    w.end_object();
                } else {
                    w.end_array();
                }
            }
        });
        let (mut field, rest) = FieldView::parse(&bytes).unwrap();
        assert!(rest.is_empty());
        for _ in 0..depth {
            field = field.children().next().unwrap().unwrap();
        }
        assert_eq!(field.value().unwrap().as_u64().unwrap(), depth);
    }

    #[test]
    fn test_validates_with_every_mode() {
        let bytes = saved(|w| {
            w.begin_object();
            w.name("hash").hash(&[7; 32]);
            w.name("ref").reference(&[8; 32]);
            w.name("blob").binary_reference(&[9; 32]);
            w.name("id").uuid(Uuid::nil());
            w.name("took").time_span(-5);
            w.name("ratio").float32(0.25);
            w.end_object();
        });
        assert_eq!(validate(&bytes, ValidateMode::ALL), ValidateError::NONE);
    }

    #[test]
    #[should_panic(expected = "end_object without a matching begin")]
    fn test_unbalanced_end_panics() {
        Writer::new().end_object();
    }

    #[test]
    #[should_panic(expected = "end_array without a matching begin")]
    fn test_mismatched_end_panics() {
        Writer::new().begin_object().end_array();
    }

    #[test]
    #[should_panic(expected = "cannot save while 1 container(s) are open")]
    fn test_save_with_open_frame_panics() {
        let mut writer = Writer::new();
        writer.begin_array();
        writer.save();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "duplicate field name")]
    fn test_duplicate_name_panics() {
        let mut writer = Writer::new();
        writer.begin_object();
        writer.name("a").null();
        writer.name("a").null();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "array elements cannot be named")]
    fn test_named_array_element_panics() {
        Writer::new().begin_array().name("x");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "object fields must be named")]
    fn test_unnamed_object_field_panics() {
        Writer::new().begin_object().null();
    }
}
