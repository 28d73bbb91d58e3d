use crate::collection::{Document, ObjectId};
use crate::common::Shape;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};

/// Compare two floats for equality, treating two NaNs as equal so that a
/// parsed `{"$numberDouble": "NaN"}` equals itself.
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// A value held by a [Document], produced by the extended JSON parser or
/// built directly by the caller.
///
/// # Variants
/// - Scalars: `Null`, `Bool`, `Int32`, `Int64`, `Double`, `String`
/// - Extended literals: `ObjectId`, `DateTime`, `Decimal128`, `Binary`,
///   `Regex`, `Timestamp`, `MinKey`, `MaxKey`
/// - `Document`: ordered document, duplicate keys kept in place
/// - `Map`: unordered document with unique keys
/// - `Array`: ordered, heterogeneous sequence
///
/// The variant is the only source of truth for a value's [Shape]; converting
/// between shapes happens only in [crate::verify::verify].
///
/// # Usage
/// ```rust
/// use docshell::common::Value;
/// use docshell::doc;
///
/// let v: Value = 42.into();
/// assert_eq!(v.as_i32(), Some(42));
///
/// let d = Value::from(doc! { "name": "Alice" });
/// assert!(d.is_document());
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    ObjectId(ObjectId),
    /// UTC date with millisecond precision.
    DateTime(DateTime<Utc>),
    /// 128-bit decimal, kept in its canonical string form.
    Decimal128(String),
    Binary { subtype: u8, bytes: Vec<u8> },
    Regex { pattern: String, options: String },
    Timestamp { time: u32, increment: u32 },
    MinKey,
    MaxKey,
    Document(Document),
    Map(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

impl Value {
    /// The structural shape used by the parameter verifier.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Document(_) => Shape::OrderedDocument,
            Value::Map(_) => Shape::UnorderedDocument,
            Value::Array(_) => Shape::Array,
            _ => Shape::Scalar,
        }
    }

    /// A short name of the variant for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "date",
            Value::Decimal128(_) => "decimal128",
            Value::Binary { .. } => "binary",
            Value::Regex { .. } => "regex",
            Value::Timestamp { .. } => "timestamp",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
            Value::Document(_) => "ordered document",
            Value::Map(_) => "unordered document",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Double(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `i64` for either integer width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any numeric variant widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Replaces the value with [Value::Null] and returns the original.
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::Null)
    }

    /// Looks up `key` in either document form.
    pub fn get_field(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Document(doc) => doc.get(key),
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub(crate) fn to_debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => format!("bool({})", v),
            Value::Int32(v) => format!("int32({})", v),
            Value::Int64(v) => format!("int64({})", v),
            Value::Double(v) => format!("double({})", v),
            Value::String(v) => format!("string({:?})", v),
            Value::ObjectId(v) => format!("{:?}", v),
            Value::DateTime(v) => format!("date({})", v.to_rfc3339()),
            Value::Decimal128(v) => format!("decimal128({})", v),
            Value::Binary { subtype, bytes } => format!("binary({}, {} bytes)", subtype, bytes.len()),
            Value::Regex { pattern, options } => format!("regex(/{}/{})", pattern, options),
            Value::Timestamp { time, increment } => format!("timestamp({}, {})", time, increment),
            Value::MinKey => "minKey".to_string(),
            Value::MaxKey => "maxKey".to_string(),
            Value::Document(doc) => format!("object({})", doc.to_debug_string()),
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.to_debug_string()))
                    .collect();
                format!("map({{{}}})", entries.join(", "))
            }
            Value::Array(values) => {
                let entries: Vec<String> = values.iter().map(|v| v.to_debug_string()).collect();
                format!("array([{}])", entries.join(", "))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => num_eq_float(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Decimal128(a), Value::Decimal128(b)) => a == b,
            (
                Value::Binary { subtype: sa, bytes: ba },
                Value::Binary { subtype: sb, bytes: bb },
            ) => sa == sb && ba == bb,
            (
                Value::Regex { pattern: pa, options: oa },
                Value::Regex { pattern: pb, options: ob },
            ) => pa == pb && oa == ob,
            (
                Value::Timestamp { time: ta, increment: ia },
                Value::Timestamp { time: tb, increment: ib },
            ) => ta == tb && ia == ib,
            (Value::MinKey, Value::MinKey) => true,
            (Value::MaxKey, Value::MaxKey) => true,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::json::to_extended_json(self))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::Int32(value as i32)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Int32(value as i32)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int32(value as i32)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int32(value as i32)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int64(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Double(value as f64),
        }
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::from(value as u64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Double(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(value: HashMap<String, V>) -> Self {
        Value::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// A macro to create a `Value` from a given expression.
///
/// ```rust
/// use docshell::common::Value;
/// use docshell::val;
///
/// assert_eq!(val!(42), Value::Int32(42));
/// assert_eq!(val!("hello"), Value::String("hello".to_string()));
/// ```
#[macro_export]
macro_rules! val {
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
