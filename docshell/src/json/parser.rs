use super::extended;
use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, ShellError, ShellResult};
use serde::de::{self, DeserializeSeed, Deserializer as _, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Deserializer;
use std::fmt::Formatter;

/// Parses extended JSON text into a [Value].
///
/// The top-level value must be an object or an array. Objects become
/// [Value::Document]s with keys in arrival order; a repeated key is
/// appended rather than merged. Single-key type wrappers such as
/// `{"$oid": "..."}` or `{"$numberLong": "..."}` are resolved into the
/// matching scalar.
///
/// Nothing is returned on failure except the error: malformed input, a
/// premature end or trailing data yield [ErrorKind::SyntaxError] carrying
/// the byte offset, and a scalar at the top level yields
/// [ErrorKind::UnsupportedTopLevelType].
///
/// # Examples
///
/// ```rust
/// use docshell::json;
/// use docshell::common::Value;
///
/// let value = json::parse(r#"{"state": "CA", "pop": {"$numberLong": "1500"}}"#)?;
/// let doc = value.as_document().unwrap();
/// assert_eq!(doc.get("pop"), Some(&Value::Int64(1500)));
///
/// assert!(json::parse("42").is_err());
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
pub fn parse(text: &str) -> ShellResult<Value> {
    match text.bytes().find(|b| !is_json_whitespace(*b)) {
        Some(b'{') | Some(b'[') => parse_container(text),
        Some(_) => Err(classify_scalar(text)),
        None => {
            log::error!("Empty extended JSON input");
            Err(ShellError::syntax("EOF while parsing a value", text.len()))
        }
    }
}

fn parse_container(text: &str) -> ShellResult<Value> {
    let mut deserializer = Deserializer::from_str(text);
    let value = ValueSeed
        .deserialize(&mut deserializer)
        .and_then(|value| deserializer.end().map(|_| value));

    value.map_err(|err| {
        let offset = byte_offset(text, &err);
        log::error!("Invalid extended JSON at offset {}: {}", offset, err);
        ShellError::syntax(&err.to_string(), offset)
    })
}

// a top level scalar is only reported as such when it is a well-formed
// JSON value; anything else is a plain syntax error
fn classify_scalar(text: &str) -> ShellError {
    let mut stream = Deserializer::from_str(text).into_iter::<IgnoredAny>();
    match stream.next() {
        Some(Ok(_)) => {
            log::error!("Extended JSON top level must be an object or an array");
            ShellError::new(
                "top-level value must be an object or an array",
                ErrorKind::UnsupportedTopLevelType,
            )
        }
        Some(Err(err)) => {
            let offset = byte_offset(text, &err);
            log::error!("Invalid extended JSON at offset {}: {}", offset, err);
            ShellError::syntax(&err.to_string(), offset)
        }
        None => ShellError::syntax("EOF while parsing a value", text.len()),
    }
}

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Converts the 1-based line/column reported by serde_json into a byte
/// offset into `text`, clamped to the input length.
fn byte_offset(text: &str, err: &serde_json::Error) -> usize {
    let line = err.line();
    if line == 0 {
        return text.len();
    }

    let line_start: usize = text
        .split('\n')
        .take(line - 1)
        .map(|l| l.len() + 1)
        .sum();
    (line_start + err.column().saturating_sub(1)).min(text.len())
}

struct ValueSeed;

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("an extended JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(match i32::try_from(v) {
            Ok(v) => Value::Int32(v),
            Err(_) => Value::Int64(v),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        if let Ok(v) = i32::try_from(v) {
            Ok(Value::Int32(v))
        } else if let Ok(v) = i64::try_from(v) {
            Ok(Value::Int64(v))
        } else {
            Ok(Value::Double(v as f64))
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element_seed(ValueSeed)? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut doc = Document::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(ValueSeed)?;
            doc.push(key, value);
        }
        extended::resolve(doc).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ObjectId;
    use crate::doc;

    fn offset_of(text: &str) -> usize {
        match parse(text).unwrap_err().kind() {
            ErrorKind::SyntaxError { offset } => *offset,
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(parse("{}").unwrap(), Value::Document(Document::new()));
        assert_eq!(parse("[]").unwrap(), Value::Array(vec![]));
        assert_eq!(parse("  \n {} \n").unwrap(), Value::Document(Document::new()));
    }

    #[test]
    fn test_keys_keep_arrival_order() {
        let value = parse(r#"{"b": 1, "a": 2, "c": 3}"#).unwrap();
        let keys: Vec<&str> = value.as_document().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_keys_are_appended() {
        let value = parse(r#"{"a": 1, "a": 2}"#).unwrap();
        let doc = value.as_document().unwrap();
        assert_eq!(doc.len(), 2);
        let all: Vec<&Value> = doc.get_all("a").collect();
        assert_eq!(all, vec![&Value::Int32(1), &Value::Int32(2)]);
    }

    #[test]
    fn test_scalars() {
        let value = parse(r#"[1, 3000000000, 1.5, -2, true, null, "x", 1e3]"#).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Int32(1),
                Value::Int64(3_000_000_000),
                Value::Double(1.5),
                Value::Int32(-2),
                Value::Bool(true),
                Value::Null,
                Value::from("x"),
                Value::Double(1000.0),
            ])
        );
    }

    #[test]
    fn test_huge_integer_becomes_double() {
        let value = parse("[18446744073709551616]").unwrap();
        assert!(matches!(value.as_array().unwrap()[0], Value::Double(_)));
    }

    #[test]
    fn test_nested_structures() {
        let value = parse(r#"{"loc": {"city": "LA", "tags": [{"t": 1}]}}"#).unwrap();
        let expected = doc! { "loc": { "city": "LA", "tags": [{ "t": 1 }] } };
        assert_eq!(value, Value::Document(expected));
    }

    #[test]
    fn test_wrappers_resolve_inside_documents() {
        let value = parse(
            r#"{"_id": {"$oid": "5f1d7f3e9d3b2a1c0b0a0908"}, "pop": {"$gt": {"$numberLong": "10"}}}"#,
        )
        .unwrap();
        let doc = value.as_document().unwrap();
        assert_eq!(
            doc.get("_id"),
            Some(&Value::ObjectId(ObjectId::from_hex("5f1d7f3e9d3b2a1c0b0a0908").unwrap()))
        );
        assert_eq!(doc.get_path("pop.$gt"), Some(&Value::Int64(10)));
    }

    #[test]
    fn test_malformed_wrapper_is_syntax_error() {
        let err = parse(r#"{"a": {"$oid": "nothex"}}"#).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SyntaxError { .. }));
    }

    #[test]
    fn test_top_level_scalar_is_unsupported() {
        for text in ["42", "\"abc\"", "true", "null", "  3.5 "] {
            let err = parse(text).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedTopLevelType, "{}", text);
        }
    }

    #[test]
    fn test_garbage_is_syntax_error() {
        assert_eq!(offset_of("xyz"), 0);
        assert_eq!(offset_of(""), 0);
        assert_eq!(offset_of("   "), 3);
    }

    #[test]
    fn test_unexpected_token_offset() {
        assert_eq!(offset_of(r#"{"a" 1}"#), 5);
        assert_eq!(offset_of("{\n\"a\": ]}"), 7);
    }

    #[test]
    fn test_premature_end_is_syntax_error() {
        let offset = offset_of(r#"{"a": [1, 2"#);
        assert!(offset <= r#"{"a": [1, 2"#.len());
    }

    #[test]
    fn test_trailing_data_is_syntax_error() {
        let err = parse(r#"{"a": 1} {"b": 2}"#).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SyntaxError { offset } if *offset >= 9));
        assert!(parse("[] x").is_err());
    }

    #[test]
    fn test_trailing_whitespace_is_accepted() {
        assert!(parse("[1]\n\t ").is_ok());
    }
}
