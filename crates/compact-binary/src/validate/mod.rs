//! Validation of untrusted compact binary buffers.
//!
//! The validator walks one field (or a sequence of fields) and reports every
//! problem category it finds as a [`ValidateError`] mask. It never reads past
//! the supplied view and never panics on malformed input.
//!
//! Bounds and type checks always run. [`ValidateMode`] selects the additional
//! checks:
//! - `NAMES`: object fields are named and unique, array elements are unnamed
//! - `FORMAT`: canonical VarUInts, Float64 only when needed, UTF-8 strings,
//!   uniform encoding used exactly when legal
//! - `PADDING`: no bytes after the field
//!
//! Once a field is out of bounds or has an invalid type, the rest of the
//! enclosing container is skipped. Checks on siblings outside that container
//! and on ancestors still run, with one exception: `NON_UNIFORM_OBJECT`,
//! `NON_UNIFORM_ARRAY` and array `PADDING` are not reported for any container
//! with a fatally broken descendant, since its children's sizes and types are
//! no longer known.
//!
//! The walk keeps open containers on an explicit stack, so arbitrarily deep
//! nesting cannot exhaust the call stack.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use smallvec::SmallVec;
use tracing::trace;

use crate::codec::{var_uint, Reader};
use crate::error::{DecodeError, ValidateError};
use crate::limits::{HASH_SIZE, NAME_INLINE_CAPACITY, TICKS_SIZE, UUID_SIZE};
use crate::model::{FieldType, TypeTag};
use crate::uniform::UniformityTracker;

/// Set of optional checks performed by the validator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValidateMode(u8);

impl ValidateMode {
    /// Bounds and type checks only.
    pub const DEFAULT: ValidateMode = ValidateMode(0);
    /// Object field names present and unique, array elements unnamed.
    pub const NAMES: ValidateMode = ValidateMode(1 << 0);
    /// Canonical encoding of integers, floats, strings and uniform containers.
    pub const FORMAT: ValidateMode = ValidateMode(1 << 1);
    /// No trailing bytes after the top-level field.
    pub const PADDING: ValidateMode = ValidateMode(1 << 2);
    /// Every check.
    pub const ALL: ValidateMode = ValidateMode(0b111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every check in `other` is enabled.
    pub const fn contains(self, other: ValidateMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ValidateMode {
    type Output = ValidateMode;

    fn bitor(self, rhs: ValidateMode) -> ValidateMode {
        ValidateMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for ValidateMode {
    fn bitor_assign(&mut self, rhs: ValidateMode) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ValidateMode {
    type Output = ValidateMode;

    fn bitand(self, rhs: ValidateMode) -> ValidateMode {
        ValidateMode(self.0 & rhs.0)
    }
}

impl Not for ValidateMode {
    type Output = ValidateMode;

    fn not(self) -> ValidateMode {
        ValidateMode(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for ValidateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(Self::NAMES) {
            flags.push("Names");
        }
        if self.contains(Self::FORMAT) {
            flags.push("Format");
        }
        if self.contains(Self::PADDING) {
            flags.push("Padding");
        }
        if flags.is_empty() {
            flags.push("Default");
        }
        write!(f, "ValidateMode({})", flags.join(" | "))
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Validates exactly one field whose type byte is embedded in `view`.
pub fn validate(view: &[u8], mode: ValidateMode) -> ValidateError {
    validate_with_type(view, mode, TypeTag::EMBEDDED)
}

/// Validates exactly one field.
///
/// When `external` carries `HAS_FIELD_TYPE` the type byte is read from the
/// view, otherwise `external` is the field's type and the view starts at the
/// name or payload.
pub fn validate_with_type(view: &[u8], mode: ValidateMode, external: TypeTag) -> ValidateError {
    let mut reader = Reader::new(view);
    let mut error = Validator { mode }.field(&mut reader, external);
    if mode.contains(ValidateMode::PADDING) && !reader.is_empty() {
        error |= ValidateError::PADDING;
    }
    error
}

/// Validates a sequence of fields that fills `view` exactly.
///
/// There is no padding check between fields: a malformed trailing byte shows
/// up as `OUT_OF_BOUNDS` or `INVALID_TYPE`. An empty view is valid.
pub fn validate_range(view: &[u8], mode: ValidateMode) -> ValidateError {
    let validator = Validator { mode };
    let mut reader = Reader::new(view);
    let mut error = ValidateError::NONE;
    while !reader.is_empty() {
        error |= validator.field(&mut reader, TypeTag::EMBEDDED);
    }
    error
}

// =============================================================================
// FIELD WALK
// =============================================================================

/// What a parent needs to know about one validated child.
struct FieldReport<'a> {
    error: ValidateError,
    tag: TypeTag,
    name: Option<&'a [u8]>,
    /// Bytes after the type byte (name and payload).
    len_without_type: usize,
}

impl FieldReport<'_> {
    fn abandoned(tag: TypeTag, error: ValidateError) -> Self {
        Self {
            error,
            tag,
            name: None,
            len_without_type: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Object,
    Array,
}

/// The body of a container field, split off from the enclosing reader.
struct Container<'a> {
    kind: ContainerKind,
    uniform: bool,
    body: Reader<'a>,
}

/// An open container whose children are still being walked.
struct Frame<'a> {
    /// The container field itself, completed when the frame closes.
    report: FieldReport<'a>,
    kind: ContainerKind,
    uniform: bool,
    body: Reader<'a>,
    child_type: TypeTag,
    /// Elements still to read (arrays only).
    remaining: u64,
    tracker: UniformityTracker,
    names: SmallVec<[&'a [u8]; NAME_INLINE_CAPACITY]>,
    missing_name: bool,
    named: bool,
    /// No child has failed with a fatal error.
    intact: bool,
    /// A fatal child consumed the rest of the body.
    stopped: bool,
}

/// Outcome of reading a field header.
enum Step<'a> {
    Done(FieldReport<'a>),
    Open(Frame<'a>),
}

impl<'a> Frame<'a> {
    fn has_next(&self) -> bool {
        match self.kind {
            ContainerKind::Object => !self.body.is_empty(),
            ContainerKind::Array => self.remaining > 0 && !self.stopped,
        }
    }

    fn accept(&mut self, child: FieldReport<'a>, mode: ValidateMode) {
        self.report.error |= child.error;
        if child.error.is_fatal() {
            self.intact = false;
            if self.body.is_empty() {
                self.stopped = true;
            }
            return;
        }
        self.tracker.observe(child.tag, child.len_without_type);
        match self.kind {
            ContainerKind::Object => match child.name {
                Some(name) if !name.is_empty() => {
                    if mode.contains(ValidateMode::NAMES) {
                        self.names.push(name);
                    }
                }
                _ => self.missing_name = true,
            },
            ContainerKind::Array => self.named |= child.name.is_some(),
        }
    }

    /// Runs the checks that need every child and returns the finished report.
    fn close(mut self, mode: ValidateMode) -> FieldReport<'a> {
        let format = mode.contains(ValidateMode::FORMAT) && self.intact && !self.uniform;
        let error = &mut self.report.error;
        match self.kind {
            ContainerKind::Object => {
                if mode.contains(ValidateMode::NAMES) {
                    if self.missing_name {
                        *error |= ValidateError::MISSING_NAME;
                    }
                    self.names.sort_unstable();
                    if self.names.windows(2).any(|pair| pair[0] == pair[1]) {
                        *error |= ValidateError::DUPLICATE_NAME;
                    }
                }
                if format && self.tracker.is_uniform_object() {
                    *error |= ValidateError::NON_UNIFORM_OBJECT;
                }
            }
            ContainerKind::Array => {
                if mode.contains(ValidateMode::NAMES) && self.named {
                    *error |= ValidateError::ARRAY_NAME;
                }
                if format && self.tracker.is_uniform_array() {
                    *error |= ValidateError::NON_UNIFORM_ARRAY;
                }
                if mode.contains(ValidateMode::PADDING) && self.intact && !self.body.is_empty() {
                    *error |= ValidateError::PADDING;
                }
            }
        }
        self.report
    }
}

struct Validator {
    mode: ValidateMode,
}

impl Validator {
    fn checks(&self, mode: ValidateMode) -> bool {
        self.mode.contains(mode)
    }

    /// Validates one field and everything nested in it.
    ///
    /// Open containers live on an explicit stack, so nesting depth is bounded
    /// by the buffer size rather than the call stack.
    fn field<'a>(&self, reader: &mut Reader<'a>, external: TypeTag) -> ValidateError {
        let mut stack: Vec<Frame<'a>> = Vec::new();
        let mut step = self.start(reader, external);
        loop {
            match step {
                Step::Open(frame) => stack.push(frame),
                Step::Done(report) => match stack.last_mut() {
                    Some(parent) => parent.accept(report, self.mode),
                    None => return report.error,
                },
            }

            while stack.last().is_some_and(|frame| !frame.has_next()) {
                if let Some(frame) = stack.pop() {
                    let report = frame.close(self.mode);
                    match stack.last_mut() {
                        Some(parent) => parent.accept(report, self.mode),
                        None => return report.error,
                    }
                }
            }

            let Some(frame) = stack.last_mut() else {
                unreachable!("the outermost field returns before the stack empties");
            };
            if frame.kind == ContainerKind::Array {
                frame.remaining -= 1;
            }
            let child_type = frame.child_type;
            step = self.start(&mut frame.body, child_type);
        }
    }

    /// Reads a field up to its container body, if it has one.
    fn start<'a>(&self, reader: &mut Reader<'a>, external: TypeTag) -> Step<'a> {
        let start = reader.position();
        let tag = if external.has_field_type() {
            match reader.read_byte("type byte") {
                Ok(raw) => TypeTag::from_raw(raw),
                Err(e) => {
                    let error = abandon(reader, e.category());
                    return Step::Done(FieldReport::abandoned(external, error));
                }
            }
        } else {
            external
        };
        let after_type = reader.position();

        let mut error = ValidateError::NONE;
        let mut name = None;
        let container = match self.field_body(reader, tag, &mut error, &mut name) {
            Ok(Some(container)) => Some(container),
            Ok(None) => {
                if reader.position() == start {
                    error |= abandon(reader, ValidateError::INVALID_TYPE);
                }
                None
            }
            Err(e) => {
                error |= abandon(reader, e.category());
                None
            }
        };

        let report = FieldReport {
            error,
            tag,
            name,
            len_without_type: reader.position() - after_type,
        };
        match container {
            Some(container) => self.open(report, container),
            None => Step::Done(report),
        }
    }

    /// Reads the array count and the shared uniform type, then opens a frame.
    fn open<'a>(&self, mut report: FieldReport<'a>, container: Container<'a>) -> Step<'a> {
        let Container {
            kind,
            uniform,
            mut body,
        } = container;

        let remaining = match kind {
            ContainerKind::Array => {
                match self.read_var_uint(&mut body, &mut report.error, "array count") {
                    Ok(count) => count,
                    Err(e) => {
                        report.error |= abandon(&mut body, e.category());
                        return Step::Done(report);
                    }
                }
            }
            ContainerKind::Object => 0,
        };

        // Uniform arrays always carry the shared type, empty uniform objects do not.
        let child_type = if uniform && (kind == ContainerKind::Array || !body.is_empty()) {
            match shared_type(&mut body) {
                Ok(tag) => tag,
                Err(e) => {
                    report.error |= abandon(&mut body, e.category());
                    return Step::Done(report);
                }
            }
        } else {
            TypeTag::EMBEDDED
        };

        Step::Open(Frame {
            report,
            kind,
            uniform,
            body,
            child_type,
            remaining,
            tracker: UniformityTracker::new(),
            names: SmallVec::new(),
            missing_name: false,
            named: false,
            intact: true,
            stopped: false,
        })
    }

    fn field_body<'a>(
        &self,
        reader: &mut Reader<'a>,
        tag: TypeTag,
        error: &mut ValidateError,
        name: &mut Option<&'a [u8]>,
    ) -> Result<Option<Container<'a>>, DecodeError> {
        let field_type = tag
            .field_type()
            .ok_or(DecodeError::InvalidType { tag: tag.raw() })?;

        if tag.has_field_name() {
            let len = self.read_len(reader, error, "field name length")?;
            let bytes = reader.read_bytes(len, "field name")?;
            self.check_utf8(bytes, error);
            *name = Some(bytes);
        }

        match field_type {
            FieldType::None => return Err(DecodeError::InvalidType { tag: tag.raw() }),
            FieldType::Null | FieldType::BoolFalse | FieldType::BoolTrue => {}
            FieldType::Object | FieldType::UniformObject => {
                let size = self.read_len(reader, error, "object size")?;
                return Ok(Some(Container {
                    kind: ContainerKind::Object,
                    uniform: field_type == FieldType::UniformObject,
                    body: reader.sub_reader(size, "object fields")?,
                }));
            }
            FieldType::Array | FieldType::UniformArray => {
                let size = self.read_len(reader, error, "array size")?;
                return Ok(Some(Container {
                    kind: ContainerKind::Array,
                    uniform: field_type == FieldType::UniformArray,
                    body: reader.sub_reader(size, "array fields")?,
                }));
            }
            FieldType::Binary => {
                let len = self.read_len(reader, error, "binary length")?;
                reader.read_bytes(len, "binary")?;
            }
            FieldType::String => {
                let len = self.read_len(reader, error, "string length")?;
                let bytes = reader.read_bytes(len, "string")?;
                self.check_utf8(bytes, error);
            }
            FieldType::IntegerPositive | FieldType::IntegerNegative => {
                self.read_var_uint(reader, error, "integer")?;
            }
            FieldType::Float32 => {
                reader.read_f32_be("float32")?;
            }
            FieldType::Float64 => {
                let value = reader.read_f64_be("float64")?;
                if self.checks(ValidateMode::FORMAT) && f64::from(value as f32) == value {
                    *error |= ValidateError::INVALID_FLOAT;
                }
            }
            FieldType::Reference | FieldType::BinaryReference | FieldType::Hash => {
                reader.read_bytes(HASH_SIZE, "hash")?;
            }
            FieldType::Uuid => {
                reader.read_bytes(UUID_SIZE, "uuid")?;
            }
            FieldType::DateTime | FieldType::TimeSpan => {
                reader.read_bytes(TICKS_SIZE, "ticks")?;
            }
        }
        Ok(None)
    }

    fn read_var_uint(
        &self,
        reader: &mut Reader<'_>,
        error: &mut ValidateError,
        context: &'static str,
    ) -> Result<u64, DecodeError> {
        let (value, len) = reader.read_var_uint_measured(context)?;
        if self.checks(ValidateMode::FORMAT) && !var_uint::is_canonical(value, len) {
            *error |= ValidateError::INVALID_INTEGER;
        }
        Ok(value)
    }

    fn read_len(
        &self,
        reader: &mut Reader<'_>,
        error: &mut ValidateError,
        context: &'static str,
    ) -> Result<usize, DecodeError> {
        let value = self.read_var_uint(reader, error, context)?;
        usize::try_from(value).map_err(|_| DecodeError::LengthOverflow { context })
    }

    fn check_utf8(&self, bytes: &[u8], error: &mut ValidateError) {
        if self.checks(ValidateMode::FORMAT) && std::str::from_utf8(bytes).is_err() {
            *error |= ValidateError::INVALID_STRING;
        }
    }
}

/// Reads the type byte shared by the children of a uniform container.
fn shared_type(body: &mut Reader<'_>) -> Result<TypeTag, DecodeError> {
    let tag = TypeTag::from_raw(body.read_byte("uniform field type")?);
    match tag.field_type() {
        Some(_) => Ok(tag),
        None => Err(DecodeError::InvalidType { tag: tag.raw() }),
    }
}

/// Skips the rest of `reader` after a fatal error.
fn abandon(reader: &mut Reader<'_>, error: ValidateError) -> ValidateError {
    trace!(offset = reader.offset(), %error, "abandoning malformed field");
    reader.drain();
    error
}
