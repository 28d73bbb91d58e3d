use super::matcher::{lookup, matches, sort_order};
use crate::collection::{Document, FindQuery};
use crate::common::Value;
use crate::errors::{ErrorKind, ShellError, ShellResult};
use std::cmp::Ordering;

fn executor_error(message: String) -> ShellError {
    log::error!("{}", message);
    ShellError::new(&message, ErrorKind::ExecutorError)
}

/// Runs a find query over a snapshot of a collection.
pub(crate) fn run_find(documents: Vec<Document>, query: &FindQuery) -> ShellResult<Vec<Document>> {
    let mut selected = filter(documents, query.filter_value())?;
    if let Some(sort) = query.sort_value() {
        sort_documents(&mut selected, sort)?;
    }

    let skip = query.skip_value().unwrap_or(0) as usize;
    let limit = match query.limit_value() {
        Some(0) | None => usize::MAX,
        Some(limit) => limit as usize,
    };
    let paged = selected.into_iter().skip(skip).take(limit);

    match query.projection_value() {
        Some(projection) => {
            let projection = Projection::parse(projection)?;
            Ok(paged.map(|doc| projection.apply(&doc)).collect())
        }
        None => Ok(paged.collect()),
    }
}

pub(crate) fn filter(documents: Vec<Document>, filter: &Document) -> ShellResult<Vec<Document>> {
    let mut selected = Vec::new();
    for doc in documents {
        if matches(&doc, filter)? {
            selected.push(doc);
        }
    }
    Ok(selected)
}

fn direction(field: &str, value: &Value) -> ShellResult<Ordering> {
    match value.as_f64() {
        Some(n) if n > 0.0 => Ok(Ordering::Less),
        Some(n) if n < 0.0 => Ok(Ordering::Greater),
        _ => Err(executor_error(format!(
            "invalid sort direction for {}: {}",
            field, value
        ))),
    }
}

/// Stable multi-key sort. Each key of `spec` is a dotted path mapped to
/// `1` (ascending) or `-1` (descending).
pub(crate) fn sort_documents(documents: &mut [Document], spec: &Document) -> ShellResult<()> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, value) in spec.iter() {
        // `Less` means ascending here
        keys.push((field.as_str(), direction(field, value)?));
    }

    documents.sort_by(|a, b| {
        for (field, order) in &keys {
            let left = lookup(a, field).first().copied();
            let right = lookup(b, field).first().copied();
            let ordering = sort_order(left, right);
            let ordering = if *order == Ordering::Less {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// A parsed inclusion or exclusion projection.
pub(crate) struct Projection {
    include: bool,
    with_id: bool,
    paths: Vec<Vec<String>>,
}

impl Projection {
    pub(crate) fn parse(spec: &Document) -> ShellResult<Projection> {
        let mut with_id = true;
        let mut include = None;
        let mut paths = Vec::new();

        for (field, value) in spec.iter() {
            let flag = match value {
                Value::Bool(flag) => *flag,
                other => match other.as_f64() {
                    Some(n) => n != 0.0,
                    None => {
                        return Err(executor_error(format!(
                            "unsupported projection value for {}: {}",
                            field, other
                        )))
                    }
                },
            };

            if field == "_id" {
                with_id = flag;
                continue;
            }
            match include {
                Some(mode) if mode != flag => {
                    return Err(executor_error(
                        "cannot mix inclusion and exclusion in a projection".to_string(),
                    ))
                }
                _ => include = Some(flag),
            }
            paths.push(field.split('.').map(str::to_string).collect());
        }

        Ok(Projection {
            // `{_id: 0}` alone is an exclusion
            include: include.unwrap_or(false),
            with_id,
            paths,
        })
    }

    pub(crate) fn apply(&self, doc: &Document) -> Document {
        let paths: Vec<&[String]> = self.paths.iter().map(|p| p.as_slice()).collect();
        let mut projected = if self.include {
            include(doc, &paths)
        } else {
            exclude(doc, &paths)
        };

        match (self.with_id, doc.get("_id")) {
            (true, Some(id)) if self.include => {
                let mut with_id = Document::with_capacity(projected.len() + 1);
                with_id.push("_id", id.clone());
                for (key, value) in projected {
                    with_id.push(key, value);
                }
                with_id
            }
            (false, _) => {
                projected.remove("_id");
                projected
            }
            _ => projected,
        }
    }
}

fn children<'a>(paths: &[&'a [String]], key: &str) -> (bool, Vec<&'a [String]>) {
    let mut whole = false;
    let mut nested = Vec::new();
    for path in paths {
        if let Some((first, rest)) = path.split_first() {
            if first == key {
                if rest.is_empty() {
                    whole = true;
                } else {
                    nested.push(rest);
                }
            }
        }
    }
    (whole, nested)
}

fn include(doc: &Document, paths: &[&[String]]) -> Document {
    let mut out = Document::new();
    for (key, value) in doc.iter() {
        if key == "_id" {
            continue;
        }
        let (whole, nested) = children(paths, key);
        if whole {
            out.push(key.clone(), value.clone());
        } else if !nested.is_empty() {
            if let Value::Document(inner) = value {
                out.push(key.clone(), Value::Document(include(inner, &nested)));
            }
        }
    }
    out
}

fn exclude(doc: &Document, paths: &[&[String]]) -> Document {
    let mut out = Document::new();
    for (key, value) in doc.iter() {
        let (whole, nested) = children(paths, key);
        if whole {
            continue;
        }
        match value {
            Value::Document(inner) if !nested.is_empty() => {
                out.push(key.clone(), Value::Document(exclude(inner, &nested)));
            }
            _ => out.push(key.clone(), value.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn zips() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "city": "A", "state": "CA", "pop": 10 },
            doc! { "_id": 2, "city": "B", "state": "NY", "pop": 30 },
            doc! { "_id": 3, "city": "C", "state": "CA", "pop": 30 },
            doc! { "_id": 4, "city": "D", "state": "CA", "pop": 20 },
        ]
    }

    fn ids(docs: &[Document]) -> Vec<i32> {
        docs.iter().filter_map(|d| d.get("_id").and_then(|v| v.as_i32())).collect()
    }

    #[test]
    fn test_find_filters_sorts_and_pages() {
        let query = FindQuery::new(doc! { "state": "CA" })
            .sort(doc! { "pop": (-1) })
            .skip(1)
            .limit(1);
        let result = run_find(zips(), &query).unwrap();
        assert_eq!(ids(&result), vec![4]);
    }

    #[test]
    fn test_zero_limit_means_no_limit() {
        let result = run_find(zips(), &FindQuery::default().limit(0)).unwrap();
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_multi_key_sort_is_stable() {
        let mut docs = zips();
        sort_documents(&mut docs, &doc! { "pop": (-1), "city": 1 }).unwrap();
        assert_eq!(ids(&docs), vec![2, 3, 4, 1]);

        let mut docs = zips();
        sort_documents(&mut docs, &doc! { "state": 1 }).unwrap();
        assert_eq!(ids(&docs), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_sort_with_nan_values() {
        let mut docs: Vec<Document> = (0..200)
            .map(|i| {
                if i % 3 == 0 {
                    doc! { "v": (f64::NAN) }
                } else {
                    doc! { "v": ((i * 7919 % 200) as f64) }
                }
            })
            .collect();
        sort_documents(&mut docs, &doc! { "v": 1 }).unwrap();

        let values: Vec<f64> = docs.iter().filter_map(|d| d.get("v").and_then(Value::as_f64)).collect();
        let nans = values.iter().take_while(|v| v.is_nan()).count();
        assert_eq!(nans, 67);
        assert!(values[nans..].windows(2).all(|pair| pair[0] <= pair[1]));

        sort_documents(&mut docs, &doc! { "v": (-1) }).unwrap();
        let values: Vec<f64> = docs.iter().filter_map(|d| d.get("v").and_then(Value::as_f64)).collect();
        assert!(values[..133].windows(2).all(|pair| pair[0] >= pair[1]));
        assert!(values[133..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_bad_sort_direction() {
        let mut docs = zips();
        let err = sort_documents(&mut docs, &doc! { "pop": "down" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExecutorError);
    }

    #[test]
    fn test_inclusion_projection_keeps_id_first() {
        let projection = Projection::parse(&doc! { "pop": 1, "city": true }).unwrap();
        let doc = projection.apply(&zips()[0]);
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["_id", "city", "pop"]);
    }

    #[test]
    fn test_inclusion_without_id() {
        let projection = Projection::parse(&doc! { "city": 1, "_id": 0 }).unwrap();
        assert_eq!(projection.apply(&zips()[0]), doc! { "city": "A" });
    }

    #[test]
    fn test_exclusion_projection() {
        let projection = Projection::parse(&doc! { "pop": 0, "_id": 0 }).unwrap();
        assert_eq!(projection.apply(&zips()[0]), doc! { "city": "A", "state": "CA" });
    }

    #[test]
    fn test_nested_projection() {
        let doc = doc! { "_id": 1, "loc": { "city": "A", "zip": 1 }, "x": 1 };
        let included = Projection::parse(&doc! { "loc.city": 1 }).unwrap().apply(&doc);
        assert_eq!(included, doc! { "_id": 1, "loc": { "city": "A" } });

        let excluded = Projection::parse(&doc! { "loc.zip": 0 }).unwrap().apply(&doc);
        assert_eq!(excluded, doc! { "_id": 1, "loc": { "city": "A" }, "x": 1 });
    }

    #[test]
    fn test_mixed_projection_fails() {
        assert!(Projection::parse(&doc! { "a": 1, "b": 0 }).is_err());
        assert!(Projection::parse(&doc! { "a": "$b" }).is_err());
    }
}
