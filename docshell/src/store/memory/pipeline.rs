use super::query::{filter, sort_documents, Projection};
use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, ShellError, ShellResult};

fn executor_error(message: String) -> ShellError {
    log::error!("{}", message);
    ShellError::new(&message, ErrorKind::ExecutorError)
}

/// A pipeline stage the in-memory driver can run.
enum Stage<'a> {
    Match(&'a Document),
    Sort(&'a Document),
    Skip(usize),
    Limit(usize),
    Project(Projection),
}

fn count(stage: &str, value: &Value, positive: bool) -> ShellResult<usize> {
    let n = match value {
        Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
        other => other.as_i64(),
    };
    match n {
        Some(n) if n > 0 || (n == 0 && !positive) => Ok(n as usize),
        _ => Err(executor_error(format!(
            "{} needs a {} integer, found {}",
            stage,
            if positive { "positive" } else { "non-negative" },
            value
        ))),
    }
}

fn document<'a>(stage: &str, value: &'a Value) -> ShellResult<&'a Document> {
    value
        .as_document()
        .ok_or_else(|| executor_error(format!("{} needs a document, found {}", stage, value.type_name())))
}

fn parse_stage(stage: &Document) -> ShellResult<Stage<'_>> {
    let mut entries = stage.iter();
    let (name, spec) = match (entries.next(), entries.next()) {
        (Some((name, spec)), None) => (name.as_str(), spec),
        _ => {
            return Err(executor_error(format!(
                "a pipeline stage must have exactly one field, found {}",
                stage.len()
            )))
        }
    };

    match name {
        "$match" => Ok(Stage::Match(document(name, spec)?)),
        "$sort" => {
            let spec = document(name, spec)?;
            if spec.is_empty() {
                return Err(executor_error("$sort needs at least one key".to_string()));
            }
            Ok(Stage::Sort(spec))
        }
        "$skip" => Ok(Stage::Skip(count(name, spec, false)?)),
        "$limit" => Ok(Stage::Limit(count(name, spec, true)?)),
        "$project" => Ok(Stage::Project(Projection::parse(document(name, spec)?)?)),
        other => Err(executor_error(format!("unsupported pipeline stage: {}", other))),
    }
}

/// Runs `stages` over a snapshot of a collection. Every stage is checked
/// before any runs.
pub(crate) fn run_pipeline(documents: Vec<Document>, stages: &[Document]) -> ShellResult<Vec<Document>> {
    let stages = stages
        .iter()
        .map(parse_stage)
        .collect::<ShellResult<Vec<Stage<'_>>>>()?;

    let mut current = documents;
    for stage in stages {
        current = match stage {
            Stage::Match(spec) => filter(current, spec)?,
            Stage::Sort(spec) => {
                sort_documents(&mut current, spec)?;
                current
            }
            Stage::Skip(n) => current.into_iter().skip(n).collect(),
            Stage::Limit(n) => current.into_iter().take(n).collect(),
            Stage::Project(projection) => current.iter().map(|doc| projection.apply(doc)).collect(),
        };
    }
    Ok(current)
}
