//! Filter evaluation and value ordering for the in-memory driver.

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, ShellError, ShellResult};
use regex::RegexBuilder;
use std::cmp::Ordering;

fn executor_error(message: &str) -> ShellError {
    log::error!("{}", message);
    ShellError::new(message, ErrorKind::ExecutorError)
}

/// Cross-type ordering rank, lowest first.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::MinKey => 0,
        Value::Null => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => 2,
        Value::String(_) => 3,
        Value::Document(_) | Value::Map(_) => 4,
        Value::Array(_) => 5,
        Value::Binary { .. } => 6,
        Value::ObjectId(_) => 7,
        Value::Bool(_) => 8,
        Value::DateTime(_) => 9,
        Value::Timestamp { .. } => 10,
        Value::Regex { .. } => 11,
        Value::MaxKey => 12,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Decimal128(text) => text.parse().ok(),
        other => other.as_f64(),
    }
}

fn entries(value: &Value) -> Vec<(&str, &Value)> {
    match value {
        Value::Document(doc) => doc.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        Value::Map(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        _ => Vec::new(),
    }
}

/// NaN equals NaN and sorts below every other number.
fn number_order(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Orders two values of the same type class; `None` across classes.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if type_rank(a) != type_rank(b) {
        return None;
    }

    match (a, b) {
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        _ if a.is_number() || b.is_number() || matches!(a, Value::Decimal128(_)) => {
            Some(number_order(as_number(a)?, as_number(b)?))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::ObjectId(x), Value::ObjectId(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (
            Value::Timestamp { time: ta, increment: ia },
            Value::Timestamp { time: tb, increment: ib },
        ) => Some((ta, ia).cmp(&(tb, ib))),
        (
            Value::Binary { subtype: sa, bytes: ba },
            Value::Binary { subtype: sb, bytes: bb },
        ) => Some((ba.len(), sa, ba).cmp(&(bb.len(), sb, bb))),
        (
            Value::Regex { pattern: pa, options: oa },
            Value::Regex { pattern: pb, options: ob },
        ) => Some((pa, oa).cmp(&(pb, ob))),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                match sort_order(Some(left), Some(right)) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        (Value::Document(_) | Value::Map(_), Value::Document(_) | Value::Map(_)) => {
            let (x, y) = (entries(a), entries(b));
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                match sort_order(Some(va), Some(vb)).then_with(|| ka.cmp(kb)) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => Some(Ordering::Equal),
    }
}

/// Total order used for sorting; a missing field sorts as `null`.
pub(crate) fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| compare(a, b).unwrap_or(Ordering::Equal))
}

pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Collects every value reachable through a dotted path. Arrays of
/// documents are traversed element-wise; a numeric segment indexes an
/// array.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(first) = doc.get(segments[0]) {
        descend(first, &segments[1..], &mut out);
    }
    out
}

fn descend<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Value::Document(_) | Value::Map(_) => {
            if let Some(next) = value.get_field(segment) {
                descend(next, rest, out);
            }
        }
        Value::Array(values) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = values.get(index) {
                    descend(next, rest, out);
                }
            }
            Err(_) => {
                for element in values.iter().filter(|v| v.is_document() || v.is_map()) {
                    descend(element, segments, out);
                }
            }
        },
        _ => {}
    }
}

/// Whether `doc` satisfies `filter`.
pub(crate) fn matches(doc: &Document, filter: &Document) -> ShellResult<bool> {
    for (key, condition) in filter.iter() {
        let matched = match key.as_str() {
            "$and" => {
                let clauses = clauses(key, condition)?;
                let mut all = true;
                for clause in clauses {
                    if !matches(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" | "$nor" => {
                let clauses = clauses(key, condition)?;
                let mut any = false;
                for clause in clauses {
                    if matches(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                if key == "$or" {
                    any
                } else {
                    !any
                }
            }
            other if other.starts_with('$') => {
                return Err(executor_error(&format!("unknown top level operator: {}", other)))
            }
            path => field_matches(&lookup(doc, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(key: &str, condition: &'a Value) -> ShellResult<Vec<&'a Document>> {
    let values = match condition.as_array() {
        Some(values) if !values.is_empty() => values,
        _ => {
            return Err(executor_error(&format!(
                "{} must be a nonempty array",
                key
            )))
        }
    };
    values
        .iter()
        .map(|v| {
            v.as_document()
                .ok_or_else(|| executor_error(&format!("{} entries must be documents", key)))
        })
        .collect()
}

fn is_operator_document(condition: &Value) -> bool {
    condition
        .as_document()
        .and_then(|doc| doc.keys().next())
        .map(|key| key.starts_with('$'))
        .unwrap_or(false)
}

// tests each candidate and, for arrays, each of their elements
fn any_value(candidates: &[&Value], predicate: impl Fn(&Value) -> bool) -> bool {
    candidates.iter().any(|candidate| {
        predicate(*candidate)
            || candidate
                .as_array()
                .map(|values| values.iter().any(&predicate))
                .unwrap_or(false)
    })
}

fn field_matches(candidates: &[&Value], condition: &Value) -> ShellResult<bool> {
    if !is_operator_document(condition) {
        return equals(candidates, condition);
    }

    let operators = match condition.as_document() {
        Some(doc) => doc,
        None => return equals(candidates, condition),
    };
    for (operator, operand) in operators.iter() {
        let matched = match operator.as_str() {
            "$eq" => equals(candidates, operand)?,
            "$ne" => !equals(candidates, operand)?,
            "$gt" => ordered(candidates, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(candidates, operand, |o| o != Ordering::Less),
            "$lt" => ordered(candidates, operand, |o| o == Ordering::Less),
            "$lte" => ordered(candidates, operand, |o| o != Ordering::Greater),
            "$in" => within(candidates, operand)?,
            "$nin" => !within(candidates, operand)?,
            "$exists" => {
                let wanted = match operand {
                    Value::Bool(flag) => *flag,
                    other => other.as_f64().map(|n| n != 0.0).unwrap_or(true),
                };
                candidates.is_empty() != wanted
            }
            "$regex" => {
                let options = operators
                    .get("$options")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let pattern = match operand {
                    Value::String(pattern) => pattern.as_str(),
                    Value::Regex { pattern, .. } => pattern.as_str(),
                    other => {
                        return Err(executor_error(&format!(
                            "$regex needs a string, found {}",
                            other.type_name()
                        )))
                    }
                };
                let options = match operand {
                    Value::Regex { options: own, .. } if options.is_empty() => own.as_str(),
                    _ => options,
                };
                let regex = build_regex(pattern, options)?;
                any_value(candidates, |v| v.as_str().map(|s| regex.is_match(s)).unwrap_or(false))
            }
            "$options" => true,
            other => {
                return Err(executor_error(&format!("unknown operator: {}", other)));
            }
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn build_regex(pattern: &str, options: &str) -> ShellResult<regex::Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for option in options.chars() {
        match option {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(executor_error(&format!("invalid regex option: {}", other)));
            }
        };
    }
    Ok(builder.build()?)
}

fn equals(candidates: &[&Value], operand: &Value) -> ShellResult<bool> {
    if candidates.is_empty() {
        return Ok(operand.is_null());
    }

    if let Value::Regex { pattern, options } = operand {
        let regex = build_regex(pattern, options)?;
        return Ok(any_value(candidates, |v| match v {
            Value::String(s) => regex.is_match(s),
            other => values_equal(other, operand),
        }));
    }
    Ok(any_value(candidates, |v| values_equal(v, operand)))
}

fn ordered(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    any_value(candidates, |v| compare(v, operand).map(&accept).unwrap_or(false))
}

fn within(candidates: &[&Value], operand: &Value) -> ShellResult<bool> {
    let options = operand
        .as_array()
        .ok_or_else(|| executor_error("$in/$nin needs an array"))?;
    for option in options {
        if equals(candidates, option)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn zip() -> Document {
        doc! {
            "city": "LOS ANGELES",
            "state": "CA",
            "pop": 3000,
            "loc": [(-118.2), 34.0],
            "tags": [{ "k": "a" }, { "k": "b" }],
            "meta": { "rank": 2 }
        }
    }

    fn check(filter: Document) -> bool {
        matches(&zip(), &filter).unwrap()
    }

    #[test]
    fn test_empty_filter_matches() {
        assert!(check(doc! {}));
    }

    #[test]
    fn test_equality() {
        assert!(check(doc! { "state": "CA" }));
        assert!(!check(doc! { "state": "NY" }));
        assert!(check(doc! { "pop": 3000.0 }));
        assert!(check(doc! { "pop": 3000i64 }));
        assert!(check(doc! { "missing": () }));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(check(doc! { "pop": { "$gt": 2999 } }));
        assert!(!check(doc! { "pop": { "$gt": 3000 } }));
        assert!(check(doc! { "pop": { "$gte": 3000, "$lte": 3000 } }));
        assert!(check(doc! { "pop": { "$lt": 3000.5 } }));
        assert!(!check(doc! { "pop": { "$lt": "zzz" } }));
        assert!(check(doc! { "state": { "$ne": "NY" } }));
        assert!(check(doc! { "missing": { "$ne": 1 } }));
    }

    #[test]
    fn test_in_and_nin() {
        assert!(check(doc! { "state": { "$in": ["NY", "CA"] } }));
        assert!(!check(doc! { "state": { "$nin": ["NY", "CA"] } }));
        assert!(matches(&zip(), &doc! { "state": { "$in": "CA" } }).is_err());
    }

    #[test]
    fn test_exists() {
        assert!(check(doc! { "city": { "$exists": true } }));
        assert!(check(doc! { "nope": { "$exists": false } }));
        assert!(!check(doc! { "nope": { "$exists": true } }));
    }

    #[test]
    fn test_regex() {
        assert!(check(doc! { "city": { "$regex": "^los", "$options": "i" } }));
        assert!(!check(doc! { "city": { "$regex": "^los" } }));
        let regex = Value::Regex { pattern: "ANGELES$".into(), options: "".into() };
        assert!(check(doc! { "city": regex }));
        assert!(matches(&zip(), &doc! { "city": { "$regex": "(" } }).is_err());
    }

    #[test]
    fn test_dotted_paths_and_arrays() {
        assert!(check(doc! { "meta.rank": 2 }));
        assert!(check(doc! { "tags.k": "b" }));
        assert!(check(doc! { "loc.1": 34.0 }));
        assert!(check(doc! { "loc": 34.0 }));
        assert!(check(doc! { "loc": { "$lt": 0 } }));
    }

    #[test]
    fn test_logical_operators() {
        assert!(check(doc! { "$or": [{ "state": "NY" }, { "pop": 3000 }] }));
        assert!(!check(doc! { "$and": [{ "state": "CA" }, { "pop": 1 }] }));
        assert!(check(doc! { "$nor": [{ "state": "NY" }] }));
        assert!(matches(&zip(), &doc! { "$or": [] }).is_err());
    }

    #[test]
    fn test_unknown_operators_fail() {
        assert!(matches(&zip(), &doc! { "$where": "1" }).is_err());
        assert!(matches(&zip(), &doc! { "pop": { "$near": 1 } }).is_err());
    }

    #[test]
    fn test_sort_order_across_types() {
        assert_eq!(sort_order(None, Some(&Value::Int32(1))), Ordering::Less);
        assert_eq!(sort_order(Some(&Value::Int32(2)), Some(&Value::Double(1.5))), Ordering::Greater);
        assert_eq!(sort_order(Some(&Value::from("a")), Some(&Value::Int32(9))), Ordering::Greater);
        assert_eq!(sort_order(Some(&Value::MaxKey), Some(&Value::from("z"))), Ordering::Greater);
        assert_eq!(
            sort_order(Some(&Value::Int64(i64::MAX)), Some(&Value::Int64(i64::MAX - 1))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_nan_orders_below_numbers() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(compare(&nan, &Value::Int32(i32::MIN)), Some(Ordering::Less));
        assert_eq!(compare(&Value::Double(f64::NEG_INFINITY), &nan), Some(Ordering::Greater));
        assert!(values_equal(&nan, &Value::Double(f64::NAN)));
        assert_eq!(sort_order(Some(&nan), None), Ordering::Greater);
    }

    #[test]
    fn test_compare_is_none_across_classes() {
        assert_eq!(compare(&Value::from("1"), &Value::Int32(1)), None);
        assert!(values_equal(&Value::Decimal128("2.5".into()), &Value::Double(2.5)));
    }
}
