use crate::common::Value;
use std::fmt::{Debug, Display};

/// An ordered document: a sequence of `(key, value)` pairs.
///
/// Insertion order is significant and duplicate keys are kept in place,
/// the same way a wire-format document holds them. Lookups by key return
/// the first occurrence. Use [Value::Map] when unique-key map semantics
/// are wanted instead.
///
/// Nested values are reached through [Document::get_path] with a dotted
/// path (`"location.address.zip"`, `"tags.0"`).
///
/// # Examples
///
/// ```rust
/// use docshell::collection::Document;
/// use docshell::common::Value;
///
/// let mut doc = Document::new();
/// doc.push("state", "CA");
/// doc.push("state", "NV");
/// assert_eq!(doc.len(), 2);
/// assert_eq!(doc.get("state"), Some(&Value::from("CA")));
/// assert_eq!(doc.get_all("state").count(), 2);
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a pair at the end. An existing entry with the same key is
    /// left untouched.
    pub fn push<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.entries.push((key.into(), value.into()));
    }

    /// Replaces the value of the first entry named `key`, or appends a new
    /// entry when there is none.
    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns every value stored under `key`, in document order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Resolves a dotted path through nested documents, maps and arrays.
    /// A path segment that is a number indexes into an array.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = match current {
                Value::Document(doc) => doc.get(segment)?,
                Value::Map(map) => map.get(segment)?,
                Value::Array(values) => {
                    let index: usize = segment.parse().ok()?;
                    values.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Removes every entry named `key` and returns the first removed value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let mut removed = None;
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].0 == key {
                let (_, value) = self.entries.remove(index);
                if removed.is_none() {
                    removed = Some(value);
                }
            } else {
                index += 1;
            }
        }
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, Value)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, (String, Value)> {
        self.entries.iter_mut()
    }

    pub(crate) fn to_debug_string(&self) -> String {
        let entries: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{:?}: {}", k, v.to_debug_string()))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_debug_string())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::json::document_to_extended_json(self))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a (String, Value);
    type IntoIter = std::slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Turns a `doc!` key token into the key it denotes. Identifiers are kept
/// as written; string literals (plain or raw) are unquoted and their
/// escapes resolved.
pub fn normalize(value: &str) -> String {
    if let Some(raw) = value.strip_prefix('r') {
        let hashes = raw.len() - raw.trim_start_matches('#').len();
        let body = &raw[hashes..];
        if hashes <= body.len() && body.starts_with('"') {
            let end = body.len() - hashes;
            if end >= 2 && body[..end].ends_with('"') {
                return body[1..end - 1].to_string();
            }
        }
        return value.to_string();
    }

    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => unescape(inner),
        None => value.to_string(),
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => out.push(char::from(byte)),
                    Err(_) => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some('u') if chars.peek() == Some(&'{') => {
                chars.next();
                let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u{");
                        out.push_str(&hex);
                        out.push('}');
                    }
                }
            }
            // line continuation: skip the newline and leading whitespace
            Some('\n') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Creates a [Document] with JSON-like syntax. Keys keep the order in
/// which they are written.
///
/// Negative numbers and other multi-token expressions go in parentheses.
///
/// # Examples
///
/// ```rust
/// use docshell::doc;
///
/// let empty = doc! {};
/// assert!(empty.is_empty());
///
/// let query = doc! {
///     "state": "CA",
///     "pop": { "$gt": 1000 },
///     "tags": ["west", "coast"]
/// };
/// assert_eq!(query.len(), 3);
///
/// let sort = doc! { "pop": (-1) };
/// assert_eq!(sort.get("pop").and_then(|v| v.as_i32()), Some(-1));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.push($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro converting values for the [doc!] macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
