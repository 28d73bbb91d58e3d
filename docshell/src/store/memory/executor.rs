use super::catalog::MemoryCatalog;
use super::faults::{FaultPoint, Faults};
use super::matcher::{matches, values_equal};
use super::pipeline::run_pipeline;
use super::query::run_find;
use crate::collection::{Document, FindQuery, ObjectId};
use crate::common::{Value, WriteExecutor};
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::store::{QueryExecutorProvider, ResultStream, VecResultStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) fn ensure_connected(connected: &AtomicBool) -> ShellResult<()> {
    if connected.load(Ordering::Acquire) {
        Ok(())
    } else {
        log::error!("In-memory client is disconnected");
        Err(ShellError::new("client is disconnected", ErrorKind::ExecutorError))
    }
}

/// Returns `doc` with an `_id` field, generating an [ObjectId] in front of
/// the other fields when the document has none, together with the id.
pub(crate) fn with_id(doc: Document) -> (Document, Value) {
    if let Some(id) = doc.get("_id") {
        let id = id.clone();
        return (doc, id);
    }

    let id = Value::ObjectId(ObjectId::new());
    let mut stored = Document::with_capacity(doc.len() + 1);
    stored.push("_id", id.clone());
    for (key, value) in doc {
        stored.push(key, value);
    }
    (stored, id)
}

/// Serves one collection of an [super::InMemoryDriver].
pub(crate) struct InMemoryExecutor {
    pub(crate) catalog: MemoryCatalog,
    pub(crate) faults: Faults,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) database: String,
    pub(crate) collection: String,
}

impl InMemoryExecutor {
    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    fn stream(&self, documents: Vec<Document>) -> Box<dyn ResultStream> {
        Box::new(InMemoryResultStream {
            documents: VecResultStream::new(documents),
            faults: self.faults.clone(),
        })
    }

    fn store(&self, docs: Vec<Document>) -> ShellResult<Vec<Value>> {
        let prepared: Vec<(Document, Value)> = docs.into_iter().map(with_id).collect();
        let namespace = self.namespace();

        self.catalog
            .collection(&self.database, &self.collection)
            .write_with(|stored| {
                for (position, (_, id)) in prepared.iter().enumerate() {
                    let clash = stored
                        .iter()
                        .chain(prepared[..position].iter().map(|(doc, _)| doc))
                        .any(|doc| doc.get("_id").map(|v| values_equal(v, id)).unwrap_or(false));
                    if clash {
                        log::error!("Duplicate _id {} in {}", id, namespace);
                        return Err(ShellError::new(
                            &format!(
                                "E11000 duplicate key error collection: {} index: _id_ dup key: {}",
                                namespace, id
                            ),
                            ErrorKind::ExecutorError,
                        ));
                    }
                }

                let mut ids = Vec::with_capacity(prepared.len());
                for (doc, id) in prepared {
                    stored.push(doc);
                    ids.push(id);
                }
                Ok(ids)
            })
    }
}

impl QueryExecutorProvider for InMemoryExecutor {
    fn execute_find(&self, query: &FindQuery) -> ShellResult<Box<dyn ResultStream>> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Find)?;

        let snapshot = self.catalog.snapshot(&self.database, &self.collection);
        let documents = run_find(snapshot, query)?;
        log::debug!("find on {} selected {} documents", self.namespace(), documents.len());
        Ok(self.stream(documents))
    }

    fn execute_aggregate(&self, stages: &[Document]) -> ShellResult<Box<dyn ResultStream>> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Aggregate)?;

        let snapshot = self.catalog.snapshot(&self.database, &self.collection);
        let documents = run_pipeline(snapshot, stages)?;
        log::debug!(
            "aggregate on {} with {} stages produced {} documents",
            self.namespace(),
            stages.len(),
            documents.len()
        );
        Ok(self.stream(documents))
    }

    fn insert_one(&self, doc: Document) -> ShellResult<Value> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Insert)?;

        let mut ids = self.store(vec![doc])?;
        ids.pop().ok_or_else(|| {
            ShellError::new("insert returned no id", ErrorKind::InternalError)
        })
    }

    fn insert_many(&self, docs: Vec<Document>) -> ShellResult<Vec<Value>> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Insert)?;
        self.store(docs)
    }

    fn delete_one(&self, filter: &Document) -> ShellResult<u64> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Delete)?;

        let Some(data) = self.catalog.existing(&self.database, &self.collection) else {
            return Ok(0);
        };
        data.write_with(|stored| {
            for index in 0..stored.len() {
                if matches(&stored[index], filter)? {
                    stored.remove(index);
                    return Ok(1);
                }
            }
            Ok(0)
        })
    }

    fn delete_many(&self, filter: &Document) -> ShellResult<u64> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::Delete)?;

        let Some(data) = self.catalog.existing(&self.database, &self.collection) else {
            return Ok(0);
        };
        data.write_with(|stored| {
            let mut keep = Vec::with_capacity(stored.len());
            for doc in stored.iter() {
                keep.push(!matches(doc, filter)?);
            }

            let before = stored.len();
            let mut flags = keep.into_iter();
            stored.retain(|_| flags.next().unwrap_or(true));
            Ok((before - stored.len()) as u64)
        })
    }
}

/// Result stream of the in-memory driver.
struct InMemoryResultStream {
    documents: VecResultStream,
    faults: Faults,
}

impl ResultStream for InMemoryResultStream {
    fn next_document(&mut self) -> ShellResult<Option<Document>> {
        self.faults.check(FaultPoint::Fetch)?;
        self.documents.next_document()
    }

    fn close(&mut self) -> ShellResult<()> {
        self.faults.check(FaultPoint::CloseStream)?;
        self.documents.close()
    }
}
