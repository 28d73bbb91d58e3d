//! Resolution of Extended JSON type wrappers (`{"$oid": ...}`,
//! `{"$date": ...}`, ...) into scalar [Value]s.

use crate::collection::{Document, ObjectId};
use crate::common::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};

pub(crate) const OID: &str = "$oid";
pub(crate) const DATE: &str = "$date";
pub(crate) const NUMBER_INT: &str = "$numberInt";
pub(crate) const NUMBER_LONG: &str = "$numberLong";
pub(crate) const NUMBER_DOUBLE: &str = "$numberDouble";
pub(crate) const NUMBER_DECIMAL: &str = "$numberDecimal";
pub(crate) const BINARY: &str = "$binary";
pub(crate) const REGULAR_EXPRESSION: &str = "$regularExpression";
pub(crate) const TIMESTAMP: &str = "$timestamp";
pub(crate) const MIN_KEY: &str = "$minKey";
pub(crate) const MAX_KEY: &str = "$maxKey";

/// Turns a freshly parsed object into the scalar it wraps, or hands the
/// document back unchanged when it is not a type wrapper.
///
/// Only single-key objects whose key is a known wrapper name are resolved;
/// query operators such as `{"$gt": 5}` stay documents. A wrapper with a
/// malformed payload is an error.
pub(crate) fn resolve(doc: Document) -> Result<Value, String> {
    if doc.len() != 1 {
        return Ok(Value::Document(doc));
    }

    let (key, payload) = match doc.iter().next() {
        Some((key, payload)) => (key.as_str(), payload),
        None => return Ok(Value::Document(doc)),
    };

    let resolved = match key {
        OID => object_id(payload)?,
        DATE => date(payload)?,
        NUMBER_INT => Value::Int32(number_string(key, payload)?.parse().map_err(|e| bad(key, e))?),
        NUMBER_LONG => Value::Int64(number_string(key, payload)?.parse().map_err(|e| bad(key, e))?),
        NUMBER_DOUBLE => Value::Double(double(number_string(key, payload)?)?),
        NUMBER_DECIMAL => Value::Decimal128(number_string(key, payload)?.to_string()),
        BINARY => binary(payload)?,
        REGULAR_EXPRESSION => regular_expression(payload)?,
        TIMESTAMP => timestamp(payload)?,
        MIN_KEY => marker(key, payload, Value::MinKey)?,
        MAX_KEY => marker(key, payload, Value::MaxKey)?,
        _ => return Ok(Value::Document(doc)),
    };
    Ok(resolved)
}

fn bad<E: std::fmt::Display>(key: &str, err: E) -> String {
    format!("invalid {} value: {}", key, err)
}

fn number_string<'a>(key: &str, payload: &'a Value) -> Result<&'a str, String> {
    payload
        .as_str()
        .ok_or_else(|| format!("{} expects a string, found {}", key, payload.type_name()))
}

fn double(text: &str) -> Result<f64, String> {
    match text {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => text.parse().map_err(|e| bad(NUMBER_DOUBLE, e)),
    }
}

fn object_id(payload: &Value) -> Result<Value, String> {
    let hex = payload
        .as_str()
        .ok_or_else(|| format!("$oid expects a string, found {}", payload.type_name()))?;
    ObjectId::from_hex(hex)
        .map(Value::ObjectId)
        .map_err(|e| bad(OID, e))
}

pub(crate) fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| format!("$date out of range: {}", millis))
}

fn date(payload: &Value) -> Result<Value, String> {
    let millis = match payload {
        Value::String(text) => {
            let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| bad(DATE, e))?;
            parsed.with_timezone(&Utc).timestamp_millis()
        }
        Value::Int64(millis) => *millis,
        Value::Int32(millis) => *millis as i64,
        Value::Double(millis) if millis.is_finite() => *millis as i64,
        other => {
            return Err(format!(
                "$date expects a string, a number or $numberLong, found {}",
                other.type_name()
            ))
        }
    };
    datetime_from_millis(millis).map(Value::DateTime)
}

fn nested<'a>(key: &str, payload: &'a Value) -> Result<&'a Document, String> {
    payload
        .as_document()
        .ok_or_else(|| format!("{} expects an object, found {}", key, payload.type_name()))
}

fn field<'a>(key: &str, doc: &'a Document, name: &str) -> Result<&'a Value, String> {
    doc.get(name)
        .ok_or_else(|| format!("{} is missing the {:?} field", key, name))
}

fn binary(payload: &Value) -> Result<Value, String> {
    let doc = nested(BINARY, payload)?;
    let encoded = field(BINARY, doc, "base64")?
        .as_str()
        .ok_or_else(|| "$binary.base64 must be a string".to_string())?;
    let subtype = field(BINARY, doc, "subType")?
        .as_str()
        .ok_or_else(|| "$binary.subType must be a string".to_string())?;

    let bytes = STANDARD.decode(encoded).map_err(|e| bad(BINARY, e))?;
    let subtype = u8::from_str_radix(subtype, 16).map_err(|e| bad(BINARY, e))?;
    Ok(Value::Binary { subtype, bytes })
}

fn regular_expression(payload: &Value) -> Result<Value, String> {
    let doc = nested(REGULAR_EXPRESSION, payload)?;
    let pattern = field(REGULAR_EXPRESSION, doc, "pattern")?
        .as_str()
        .ok_or_else(|| "$regularExpression.pattern must be a string".to_string())?;
    let options = field(REGULAR_EXPRESSION, doc, "options")?
        .as_str()
        .ok_or_else(|| "$regularExpression.options must be a string".to_string())?;

    // options are stored sorted, as the canonical form requires
    let mut options: Vec<char> = options.chars().collect();
    options.sort_unstable();
    Ok(Value::Regex {
        pattern: pattern.to_string(),
        options: options.into_iter().collect(),
    })
}

fn timestamp(payload: &Value) -> Result<Value, String> {
    let doc = nested(TIMESTAMP, payload)?;
    let component = |name: &str| -> Result<u32, String> {
        let value = field(TIMESTAMP, doc, name)?;
        value
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("$timestamp.{} must be an unsigned 32-bit integer", name))
    };
    Ok(Value::Timestamp {
        time: component("t")?,
        increment: component("i")?,
    })
}

fn marker(key: &str, payload: &Value, value: Value) -> Result<Value, String> {
    match payload.as_i64() {
        Some(1) => Ok(value),
        _ => Err(format!("{} expects the number 1", key)),
    }
}
