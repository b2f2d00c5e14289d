//! Borrowed views of encoded fields.
//!
//! A [`FieldView`] points into a buffer without copying it. Parsing is
//! bounds-checked but shallow: container children are parsed lazily by
//! [`FieldIter`]. Run the validator first when the buffer is untrusted.

use crate::codec::{var_uint, Reader};
use crate::error::DecodeError;
use crate::model::{FieldType, TypeTag, Value};

/// One encoded field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldView<'a> {
    bytes: &'a [u8],
    tag: TypeTag,
    field_type: FieldType,
    name: Option<&'a str>,
    payload: &'a [u8],
}

impl<'a> FieldView<'a> {
    /// Parses one field whose type byte is embedded in `bytes`.
    ///
    /// Returns the field and the bytes that follow it.
    pub fn parse(bytes: &'a [u8]) -> Result<(FieldView<'a>, &'a [u8]), DecodeError> {
        Self::parse_with_type(bytes, TypeTag::EMBEDDED)
    }

    /// Parses one field, taking its type from `external` unless `external`
    /// carries `HAS_FIELD_TYPE`.
    pub fn parse_with_type(
        bytes: &'a [u8],
        external: TypeTag,
    ) -> Result<(FieldView<'a>, &'a [u8]), DecodeError> {
        let mut reader = Reader::new(bytes);
        let view = Self::read(&mut reader, external)?;
        Ok((view, reader.remaining()))
    }

    fn read(reader: &mut Reader<'a>, external: TypeTag) -> Result<FieldView<'a>, DecodeError> {
        let all = reader.remaining();
        let start = reader.position();
        let tag = if external.has_field_type() {
            TypeTag::from_raw(reader.read_byte("type byte")?)
        } else {
            external
        };
        let field_type = tag
            .field_type()
            .ok_or(DecodeError::InvalidType { tag: tag.raw() })?;

        let name = if tag.has_field_name() {
            let bytes = reader.read_bytes_prefixed("field name")?;
            let name = std::str::from_utf8(bytes)
                .map_err(|_| DecodeError::InvalidUtf8 { field: "field name" })?;
            Some(name)
        } else {
            None
        };

        let payload_len = payload_len(field_type, reader.remaining())?;
        let payload = reader.read_bytes(payload_len, field_type.name())?;
        if reader.position() == start {
            return Err(DecodeError::InvalidType { tag: tag.raw() });
        }

        Ok(FieldView {
            bytes: &all[..reader.position() - start],
            tag,
            field_type,
            name,
            payload,
        })
    }

    /// The serialized tag, including `HAS_FIELD_NAME` when named.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name
    }

    /// The bytes after the name: length prefixes and value.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// The whole encoded field, including the type byte when it was embedded.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Size of the whole encoded field.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Iterates the fields of an object or the elements of an array.
    ///
    /// Other field types have no children.
    pub fn children(&self) -> FieldIter<'a> {
        match self.container_body() {
            Ok(Some((reader, child_type, count))) => FieldIter {
                reader,
                child_type,
                remaining: count,
                error: None,
                done: false,
            },
            Ok(None) => FieldIter::empty(),
            Err(e) => FieldIter::failed(e),
        }
    }

    /// Decodes the payload.
    pub fn value(&self) -> Result<Value<'a>, DecodeError> {
        Value::decode(self)
    }

    /// Splits a container payload into its body reader, the child tag and the
    /// element count (arrays only).
    fn container_body(&self) -> Result<Option<(Reader<'a>, TypeTag, Option<u64>)>, DecodeError> {
        if !self.field_type.is_container() {
            return Ok(None);
        }
        let mut reader = Reader::new(self.payload);
        let size = reader.read_len("container size")?;
        let mut body = reader.sub_reader(size, "container body")?;
        let count = if self.field_type.is_array() {
            Some(body.read_var_uint("array count")?)
        } else {
            None
        };
        let uniform = matches!(
            self.field_type,
            FieldType::UniformObject | FieldType::UniformArray
        );
        let child_type = if uniform && !body.is_empty() {
            TypeTag::from_raw(body.read_byte("uniform field type")?)
        } else {
            TypeTag::EMBEDDED
        };
        Ok(Some((body, child_type, count)))
    }
}

/// Returns the payload length of a field of `field_type` starting at `rest`.
fn payload_len(field_type: FieldType, rest: &[u8]) -> Result<usize, DecodeError> {
    if let Some(size) = field_type.fixed_payload_size() {
        return Ok(size);
    }
    match field_type {
        FieldType::IntegerPositive | FieldType::IntegerNegative => {
            let first = *rest
                .first()
                .ok_or(DecodeError::UnexpectedEof { context: "integer" })?;
            Ok(var_uint::measure_from_first_byte(first))
        }
        _ => {
            let (len, prefix) = var_uint::decode(rest)?;
            let len = usize::try_from(len)
                .map_err(|_| DecodeError::LengthOverflow { context: field_type.name() })?;
            len.checked_add(prefix)
                .ok_or(DecodeError::LengthOverflow { context: field_type.name() })
        }
    }
}

/// Iterator over a sequence of fields.
///
/// Yields an error at most once, then stops.
#[derive(Debug, Clone)]
pub struct FieldIter<'a> {
    reader: Reader<'a>,
    child_type: TypeTag,
    remaining: Option<u64>,
    error: Option<DecodeError>,
    done: bool,
}

impl<'a> FieldIter<'a> {
    fn empty() -> Self {
        FieldIter {
            reader: Reader::new(&[]),
            child_type: TypeTag::EMBEDDED,
            remaining: None,
            error: None,
            done: false,
        }
    }

    fn failed(error: DecodeError) -> Self {
        FieldIter {
            error: Some(error),
            ..FieldIter::empty()
        }
    }

    /// The type shared by every field, if the sequence is uniform.
    pub fn uniform_type(&self) -> Option<TypeTag> {
        if self.child_type.has_field_type() {
            None
        } else {
            Some(self.child_type)
        }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = Result<FieldView<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(error) = self.error.take() {
            self.done = true;
            return Some(Err(error));
        }
        match self.remaining {
            Some(0) => return None,
            Some(ref mut n) => *n -= 1,
            None if self.reader.is_empty() => return None,
            None => {}
        }
        let result = FieldView::read(&mut self.reader, self.child_type);
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Iterates a top-level sequence of fields filling `bytes`.
pub fn fields(bytes: &[u8]) -> FieldIter<'_> {
    FieldIter {
        reader: Reader::new(bytes),
        child_type: TypeTag::EMBEDDED,
        remaining: None,
        error: None,
        done: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_integer() {
        let data = [0x88, 1, b'x', 0x80, 0x80, 0xff];
        let (field, rest) = FieldView::parse(&data).unwrap();
        assert_eq!(field.field_type(), FieldType::IntegerPositive);
        assert_eq!(field.name(), Some("x"));
        assert_eq!(field.payload(), &[0x80, 0x80]);
        assert_eq!(field.size(), 5);
        assert_eq!(field.as_bytes(), &data[..5]);
        assert_eq!(rest, &[0xff]);
    }

    #[test]
    fn test_parse_with_external_type() {
        let (field, rest) =
            FieldView::parse_with_type(&[3, b'a', b'b', b'c'], TypeTag::new(FieldType::String))
                .unwrap();
        assert_eq!(field.field_type(), FieldType::String);
        assert!(!field.has_name());
        assert_eq!(field.payload(), &[3, b'a', b'b', b'c']);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            FieldView::parse(&[]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            FieldView::parse(&[0x14]),
            Err(DecodeError::InvalidType { tag: 0x14 })
        ));
        assert!(matches!(
            FieldView::parse(&[0x0a, 0, 0]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            FieldView::parse(&[0x81, 1, 0xff]),
            Err(DecodeError::InvalidUtf8 { .. })
        ));
        assert!(matches!(
            FieldView::parse_with_type(&[], TypeTag::new(FieldType::Null)),
            Err(DecodeError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_object_children() {
        let data = [0x02, 7, 0x81, 1, b'N', 0x88, 1, b'I', 5];
        let (object, _) = FieldView::parse(&data).unwrap();
        let children: Vec<_> = object.children().collect::<Result<_, _>>().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), Some("N"));
        assert_eq!(children[0].field_type(), FieldType::Null);
        assert_eq!(children[1].name(), Some("I"));
        assert_eq!(children[1].payload(), &[5]);
    }

    #[test]
    fn test_uniform_array_children() {
        let data = [0x05, 4, 2, 0x08, 1, 2];
        let (array, _) = FieldView::parse(&data).unwrap();
        let iter = array.children();
        assert_eq!(iter.uniform_type(), Some(TypeTag::new(FieldType::IntegerPositive)));
        let payloads: Vec<_> = iter.map(|f| f.unwrap().payload()).collect();
        assert_eq!(payloads, vec![&[1u8][..], &[2u8][..]]);
    }

    #[test]
    fn test_empty_uniform_object_has_no_children() {
        let (object, _) = FieldView::parse(&[0x03, 0]).unwrap();
        assert_eq!(object.children().count(), 0);
    }

    #[test]
    fn test_scalar_has_no_children() {
        let (field, _) = FieldView::parse(&[0x0d]).unwrap();
        assert_eq!(field.children().count(), 0);
    }

    #[test]
    fn test_truncated_container_yields_error() {
        let (object, _) = FieldView::parse_with_type(&[0], TypeTag::new(FieldType::Array)).unwrap();
        let mut iter = object.children();
        assert!(matches!(
            iter.next(),
            Some(Err(DecodeError::UnexpectedEof { context: "array count" }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut iter = fields(&[0x01, 0x0a, 0]);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_top_level_fields() {
        let data = [0x01, 0x0c, 0x07, 2, b'h', b'i'];
        let types: Vec<_> = fields(&data).map(|f| f.unwrap().field_type()).collect();
        assert_eq!(
            types,
            vec![FieldType::Null, FieldType::BoolFalse, FieldType::String]
        );
    }
}
