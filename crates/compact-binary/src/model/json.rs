//! JSON rendering of encoded fields.
//!
//! [`FieldView`] implements [`serde::Serialize`], so any serde data format can
//! render a field. JSON is the common case:
//!
//! | Field type | JSON |
//! |------------|------|
//! | Null | `null` |
//! | BoolFalse, BoolTrue | boolean |
//! | Object, UniformObject | object keyed by field name |
//! | Array, UniformArray | array |
//! | Binary | base64 string (standard alphabet, padded) |
//! | String | string |
//! | IntegerPositive, IntegerNegative | number |
//! | Float32, Float64 | number (`null` when not finite) |
//! | Reference, BinaryReference, Hash | lowercase hex string |
//! | Uuid | hyphenated string |
//! | DateTime, TimeSpan | number of ticks |
//!
//! Fields nested deeper than [`MAX_JSON_DEPTH`] fail to serialize.

use base64::Engine;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::limits::MAX_JSON_DEPTH;
use crate::model::{FieldView, Value};

impl Serialize for FieldView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Nested {
            field: *self,
            depth: 0,
        }
        .serialize(serializer)
    }
}

impl FieldView<'_> {
    /// Renders the field as compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Renders the field as indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A field together with the number of containers around it.
struct Nested<'a> {
    field: FieldView<'a>,
    depth: usize,
}

impl Nested<'_> {
    fn child_depth<E: serde::ser::Error>(&self) -> Result<usize, E> {
        if self.depth >= MAX_JSON_DEPTH {
            return Err(E::custom(format!(
                "fields nested deeper than {MAX_JSON_DEPTH} levels"
            )));
        }
        Ok(self.depth + 1)
    }
}

impl Serialize for Nested<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.field.value().map_err(S::Error::custom)? {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(value),
            Value::Object(children) => {
                let depth = self.child_depth::<S::Error>()?;
                let mut map = serializer.serialize_map(None)?;
                for child in children {
                    let field = child.map_err(S::Error::custom)?;
                    let name = field.name().unwrap_or_default();
                    map.serialize_entry(name, &Nested { field, depth })?;
                }
                map.end()
            }
            Value::Array(children) => {
                let depth = self.child_depth::<S::Error>()?;
                let mut seq = serializer.serialize_seq(None)?;
                for child in children {
                    let field = child.map_err(S::Error::custom)?;
                    seq.serialize_element(&Nested { field, depth })?;
                }
                seq.end()
            }
            Value::Binary(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(value) => {
                if let Ok(value) = i64::try_from(value) {
                    serializer.serialize_i64(value)
                } else if let Ok(value) = u64::try_from(value) {
                    serializer.serialize_u64(value)
                } else {
                    serializer.serialize_i128(value)
                }
            }
            Value::Float32(value) => serializer.serialize_f32(value),
            Value::Float64(value) => serializer.serialize_f64(value),
            Value::Reference(hash) | Value::BinaryReference(hash) | Value::Hash(hash) => {
                serializer.serialize_str(&hex::encode(hash))
            }
            Value::Uuid(uuid) => serializer.collect_str(&uuid.hyphenated()),
            Value::DateTime(ticks) | Value::TimeSpan(ticks) => serializer.serialize_i64(ticks),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use crate::limits::MAX_JSON_DEPTH;
    use crate::model::FieldView;
    use crate::writer::Writer;

    fn render(build: impl FnOnce(&mut Writer)) -> serde_json::Value {
        let mut writer = Writer::new();
        build(&mut writer);
        let bytes = writer.save();
        let (field, _) = FieldView::parse(&bytes).unwrap();
        serde_json::to_value(field).unwrap()
    }

    #[test]
    fn test_mixed_document() {
        let value = render(|w| {
            w.begin_object();
            w.name("name").string("core");
            w.name("id").uuid(Uuid::from_bytes([0x11; 16]));
            w.name("blob").binary(&[1, 2, 3]);
            w.name("digest").hash(&[0xab; 32]);
            w.name("ratio").float64(0.5);
            w.name("count").int64(-3);
            w.name("big").uint64(u64::MAX);
            w.name("empty").null();
            w.name("flags").begin_array().bool(true).bool(false).end_array();
            w.name("sizes").begin_array().uint64(1).uint64(2).uint64(3).end_array();
            w.name("ticks").begin_array().date_time(10).time_span(-2).end_array();
            w.name("nested").begin_object();
            w.name("x").uint64(1);
            w.end_object();
            w.end_object();
        });
        assert_eq!(
            value,
            json!({
                "name": "core",
                "id": "11111111-1111-1111-1111-111111111111",
                "blob": "AQID",
                "digest": "ab".repeat(32),
                "ratio": 0.5,
                "count": -3,
                "big": u64::MAX,
                "empty": null,
                "flags": [true, false],
                "sizes": [1, 2, 3],
                "ticks": [10, -2],
                "nested": { "x": 1 },
            })
        );
    }

    #[test]
    fn test_to_json_text() {
        let mut writer = Writer::new();
        writer.begin_object();
        writer.name("ok").bool(true);
        writer.name("refs").begin_array().reference(&[0; 32]).end_array();
        writer.end_object();
        let bytes = writer.save();
        let (field, _) = FieldView::parse(&bytes).unwrap();
        assert_eq!(
            field.to_json().unwrap(),
            format!(r#"{{"ok":true,"refs":["{}"]}}"#, "0".repeat(64))
        );
        assert!(field.to_json_pretty().unwrap().contains("\n  \"ok\": true"));
    }

    #[test]
    fn test_lowest_negative_integer() {
        // -2^64 does not fit any 64-bit integer.
        let data = [0x09, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let (field, _) = FieldView::parse(&data).unwrap();
        assert_eq!(field.to_json().unwrap(), "-18446744073709551616");
    }

    #[test]
    fn test_invalid_payload_fails() {
        let (field, _) = FieldView::parse(&[0x07, 1, 0xff]).unwrap();
        assert!(field.to_json().is_err());
    }

    #[test]
    fn test_depth_limit() {
        let nested = |depth: usize| {
            let mut writer = Writer::new();
            for _ in 0..depth {
                writer.begin_array();
            }
            writer.uint64(7);
            for _ in 0..depth {
                writer.end_array();
            }
            writer.save()
        };

        let shallow = nested(MAX_JSON_DEPTH);
        let (field, _) = FieldView::parse(&shallow).unwrap();
        let text = field.to_json().unwrap();
        assert!(text.starts_with("[[") && text.contains('7'));

        let deep = nested(MAX_JSON_DEPTH + 1);
        let (field, _) = FieldView::parse(&deep).unwrap();
        let error = field.to_json().unwrap_err();
        assert!(error.to_string().contains("nested deeper"));
    }
}
