//! The parameter gate every filter, projection, sort spec, pipeline and
//! insert payload passes through before an operation runs.

use crate::collection::Document;
use crate::common::{AllowedShapes, Shape, Value};
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::json;
use std::collections::{BTreeMap, HashMap};

/// A caller-supplied operation parameter before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Param {
    /// No value given.
    #[default]
    Absent,
    /// Extended JSON text, parsed during verification.
    Json(String),
    /// A value built in code.
    Value(Value),
}

impl From<&str> for Param {
    fn from(text: &str) -> Self {
        Param::Json(text.to_string())
    }
}

impl From<String> for Param {
    fn from(text: String) -> Self {
        Param::Json(text)
    }
}

impl From<&String> for Param {
    fn from(text: &String) -> Self {
        Param::Json(text.clone())
    }
}

impl From<()> for Param {
    fn from(_: ()) -> Self {
        Param::Absent
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Param::Absent,
        }
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}

impl From<Document> for Param {
    fn from(doc: Document) -> Self {
        Param::Value(Value::Document(doc))
    }
}

impl From<&Document> for Param {
    fn from(doc: &Document) -> Self {
        Param::Value(Value::Document(doc.clone()))
    }
}

impl From<Vec<Document>> for Param {
    fn from(docs: Vec<Document>) -> Self {
        Param::Value(Value::Array(docs.into_iter().map(Value::Document).collect()))
    }
}

impl From<Vec<Value>> for Param {
    fn from(values: Vec<Value>) -> Self {
        Param::Value(Value::Array(values))
    }
}

impl From<BTreeMap<String, Value>> for Param {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Param::Value(Value::Map(map))
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Param {
    fn from(map: HashMap<String, V>) -> Self {
        Param::Value(Value::from(map))
    }
}

/// Normalizes `param` against the shapes an operation accepts.
///
/// * Text is parsed first; a parse error is returned as is.
/// * An absent value (or `null`) becomes the empty instance of the first
///   allowed shape among ordered document, array and unordered document.
/// * A value whose shape is allowed passes through untouched.
/// * An ordered document is wrapped in a one-element array when a plain
///   array is allowed.
/// * An absent value with no ordered document, array or unordered document
///   allowed fails with [ErrorKind::NoSuitableDefault]; an array of ordered
///   documents has no default.
/// * An array is accepted as an array of ordered documents only when every
///   element is an ordered document.
///
/// # Examples
///
/// ```rust
/// use docshell::common::{AllowedShapes, Value};
/// use docshell::verify::{verify, Param};
///
/// let empty = verify(Param::Absent, AllowedShapes::ORDERED_DOCUMENT)?;
/// assert_eq!(empty, Value::Document(Default::default()));
///
/// let wrapped = verify(r#"{"$match": {}}"#, AllowedShapes::ARRAY)?;
/// assert_eq!(wrapped.as_array().map(|a| a.len()), Some(1));
///
/// assert!(verify("[1, 2]", AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT).is_err());
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
pub fn verify<P: Into<Param>>(param: P, allowed: AllowedShapes) -> ShellResult<Value> {
    match resolve(param.into())? {
        Some(value) => coerce(value, allowed),
        None => default_for(allowed),
    }
}

/// Verifies `param` and returns it as a list of documents.
///
/// A lone ordered document is taken as a one-element list when `allowed`
/// contains [AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT]. Absence still goes
/// through the defaults of [verify], so it fails unless `allowed` has one.
pub fn verify_documents<P: Into<Param>>(
    param: P,
    allowed: AllowedShapes,
) -> ShellResult<Vec<Document>> {
    let value = match resolve(param.into())? {
        Some(Value::Document(doc)) if allowed.contains(AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT) => {
            return Ok(vec![doc])
        }
        Some(value) => coerce(value, allowed)?,
        None => default_for(allowed)?,
    };

    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|value| match value {
                Value::Document(doc) => Ok(doc),
                other => Err(mismatch(other.shape(), allowed)),
            })
            .collect(),
        Value::Document(doc) => Ok(vec![doc]),
        other => Err(mismatch(other.shape(), allowed)),
    }
}

/// Verifies `param` and returns it as one document. An unordered document
/// is laid out in key order.
pub fn verify_document<P: Into<Param>>(param: P, allowed: AllowedShapes) -> ShellResult<Document> {
    match verify(param, allowed)? {
        Value::Document(doc) => Ok(doc),
        Value::Map(map) => Ok(map.into_iter().collect()),
        other => Err(mismatch(other.shape(), allowed)),
    }
}

/// Parses text; `None` for an absent or `null` parameter.
fn resolve(param: Param) -> ShellResult<Option<Value>> {
    let value = match param {
        Param::Absent => return Ok(None),
        Param::Json(text) => json::parse(&text)?,
        Param::Value(value) => value,
    };
    Ok(if value.is_null() { None } else { Some(value) })
}

fn default_for(allowed: AllowedShapes) -> ShellResult<Value> {
    if allowed.contains(AllowedShapes::ORDERED_DOCUMENT) {
        Ok(Value::Document(Document::new()))
    } else if allowed.contains(AllowedShapes::ARRAY) {
        Ok(Value::Array(Vec::new()))
    } else if allowed.contains(AllowedShapes::UNORDERED_DOCUMENT) {
        Ok(Value::Map(BTreeMap::new()))
    } else {
        log::error!("No default value for allowed shapes {}", allowed);
        Err(ShellError::new(
            &format!("no default value exists for {}", allowed),
            ErrorKind::NoSuitableDefault,
        ))
    }
}

fn coerce(value: Value, allowed: AllowedShapes) -> ShellResult<Value> {
    if allowed.accepts(value.shape()) {
        return Ok(value);
    }

    match value {
        Value::Document(doc) if allowed.contains(AllowedShapes::ARRAY) => {
            Ok(Value::Array(vec![Value::Document(doc)]))
        }
        Value::Array(values) if allowed.contains(AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT) => {
            if let Some(offending) = values.iter().find(|v| !v.is_document()) {
                return Err(mismatch(offending.shape(), allowed));
            }
            Ok(Value::Array(values))
        }
        other => Err(mismatch(other.shape(), allowed)),
    }
}

fn mismatch(actual: Shape, allowed: AllowedShapes) -> ShellError {
    log::error!("Parameter of shape {} does not match {}", actual, allowed);
    ShellError::new(
        &format!("expected {}, found {}", allowed, actual),
        ErrorKind::TypeMismatch {
            actual: actual.to_string(),
            allowed: allowed.to_string(),
        },
    )
}
