use super::extended::{
    BINARY, DATE, MAX_KEY, MIN_KEY, NUMBER_DECIMAL, NUMBER_DOUBLE, NUMBER_LONG, OID,
    REGULAR_EXPRESSION, TIMESTAMP,
};
use crate::collection::Document;
use crate::common::Value;
use crate::errors::ShellResult;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// How type information is written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Every non-JSON type is wrapped, so that parsing the text gives back
    /// exactly the same [Value].
    Canonical,
    /// Numbers are written as plain JSON numbers and dates as ISO-8601
    /// strings; meant for decoding into caller types.
    Relaxed,
}

pub(crate) struct ExtendedJson<'a> {
    value: &'a Value,
    mode: Mode,
}

impl<'a> ExtendedJson<'a> {
    pub(crate) fn new(value: &'a Value, mode: Mode) -> Self {
        ExtendedJson { value, mode }
    }

    fn nested(&self, value: &'a Value) -> ExtendedJson<'a> {
        ExtendedJson::new(value, self.mode)
    }
}

struct DocumentJson<'a> {
    doc: &'a Document,
    mode: Mode,
}

impl Serialize for DocumentJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.doc.len()))?;
        for (key, value) in self.doc.iter() {
            map.serialize_entry(key, &ExtendedJson::new(value, self.mode))?;
        }
        map.end()
    }
}

fn single<S, V>(serializer: S, key: &str, value: &V) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

fn non_finite(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl Serialize for ExtendedJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let relaxed = self.mode == Mode::Relaxed;
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) if relaxed => serializer.serialize_i64(*v),
            Value::Int64(v) => single(serializer, NUMBER_LONG, &v.to_string()),
            Value::Double(v) if !v.is_finite() => single(serializer, NUMBER_DOUBLE, non_finite(*v)),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::ObjectId(id) => single(serializer, OID, &id.to_hex()),
            Value::DateTime(date) if relaxed => {
                single(serializer, DATE, &date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::DateTime(date) => {
                let millis = Value::Int64(date.timestamp_millis());
                single(serializer, DATE, &self.nested(&millis))
            }
            Value::Decimal128(v) => single(serializer, NUMBER_DECIMAL, v),
            Value::Binary { subtype, bytes } => {
                let body = BinaryBody {
                    base64: STANDARD.encode(bytes),
                    sub_type: format!("{:02x}", subtype),
                };
                single(serializer, BINARY, &body)
            }
            Value::Regex { pattern, options } => {
                single(serializer, REGULAR_EXPRESSION, &RegexBody { pattern, options })
            }
            Value::Timestamp { time, increment } => single(
                serializer,
                TIMESTAMP,
                &TimestampBody {
                    t: *time,
                    i: *increment,
                },
            ),
            Value::MinKey => single(serializer, MIN_KEY, &1),
            Value::MaxKey => single(serializer, MAX_KEY, &1),
            Value::Document(doc) => DocumentJson {
                doc,
                mode: self.mode,
            }
            .serialize(serializer),
            Value::Map(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    state.serialize_entry(key, &self.nested(value))?;
                }
                state.end()
            }
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(&self.nested(value))?;
                }
                seq.end()
            }
        }
    }
}

#[derive(Serialize)]
struct BinaryBody {
    base64: String,
    #[serde(rename = "subType")]
    sub_type: String,
}

#[derive(Serialize)]
struct RegexBody<'a> {
    pattern: &'a str,
    options: &'a str,
}

#[derive(Serialize)]
struct TimestampBody {
    t: u32,
    i: u32,
}

fn render(value: &Value, mode: Mode) -> String {
    match serde_json::to_string(&ExtendedJson::new(value, mode)) {
        Ok(text) => text,
        Err(err) => {
            log::error!("Failed to render {:?} as extended JSON: {}", value, err);
            String::new()
        }
    }
}

/// Renders a value as canonical extended JSON.
///
/// Parsing the output with [super::parse] yields a value equal to the
/// input, including the numeric width, duplicate document keys and
/// non-finite doubles.
pub fn to_extended_json(value: &Value) -> String {
    render(value, Mode::Canonical)
}

/// Indented form of [to_extended_json].
pub fn to_extended_json_pretty(value: &Value) -> String {
    match serde_json::to_string_pretty(&ExtendedJson::new(value, Mode::Canonical)) {
        Ok(text) => text,
        Err(err) => {
            log::error!("Failed to render {:?} as extended JSON: {}", value, err);
            String::new()
        }
    }
}

pub fn document_to_extended_json(doc: &Document) -> String {
    let doc = DocumentJson {
        doc,
        mode: Mode::Canonical,
    };
    match serde_json::to_string(&doc) {
        Ok(text) => text,
        Err(err) => {
            log::error!("Failed to render document as extended JSON: {}", err);
            String::new()
        }
    }
}

/// Converts a document into relaxed JSON, the form handed to serde when a
/// caller asks for its own types.
pub fn to_relaxed_json(doc: &Document) -> ShellResult<serde_json::Value> {
    let value = serde_json::to_value(DocumentJson {
        doc,
        mode: Mode::Relaxed,
    })?;
    Ok(value)
}

/// Shell-style rendering of a document: one `key : value` line per entry.
///
/// ```text
/// {
///     city : "LA"
///     pop : 3000
/// }
/// ```
pub fn to_pretty_string(doc: &Document) -> String {
    let mut out = String::from("{ \n");
    for (key, value) in doc.iter() {
        out.push_str("    ");
        out.push_str(key);
        out.push_str(" : ");
        out.push_str(&to_extended_json(value));
        out.push_str(" \n");
    }
    out.push_str("} \n");
    out
}
