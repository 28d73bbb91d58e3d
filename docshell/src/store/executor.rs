use crate::collection::{Document, FindQuery};
use crate::common::Value;
use crate::errors::ShellResult;
use std::ops::Deref;
use std::sync::Arc;

/// A stream of result documents owned by an open cursor.
pub trait ResultStream: Send {
    /// Fetches the next document; `Ok(None)` marks the end of results.
    fn next_document(&mut self) -> ShellResult<Option<Document>>;

    /// Releases the server-side resource behind the stream.
    fn close(&mut self) -> ShellResult<()>;
}

/// Runs queries and writes against one collection.
pub trait QueryExecutorProvider: Send + Sync {
    fn execute_find(&self, query: &FindQuery) -> ShellResult<Box<dyn ResultStream>>;

    fn execute_aggregate(&self, stages: &[Document]) -> ShellResult<Box<dyn ResultStream>>;

    /// Stores `doc` and returns its `_id`, generating one when missing.
    fn insert_one(&self, doc: Document) -> ShellResult<Value>;

    fn insert_many(&self, docs: Vec<Document>) -> ShellResult<Vec<Value>>;

    /// Removes the first document matching `filter`; returns how many were
    /// removed.
    fn delete_one(&self, filter: &Document) -> ShellResult<u64>;

    fn delete_many(&self, filter: &Document) -> ShellResult<u64>;
}

/// Cloneable handle to a [QueryExecutorProvider].
#[derive(Clone)]
pub struct QueryExecutor {
    inner: Arc<dyn QueryExecutorProvider>,
}

impl QueryExecutor {
    pub fn new<T: QueryExecutorProvider + 'static>(inner: T) -> Self {
        QueryExecutor {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for QueryExecutor {
    type Target = Arc<dyn QueryExecutorProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A [ResultStream] over documents already held in memory.
pub struct VecResultStream {
    documents: std::vec::IntoIter<Document>,
}

impl VecResultStream {
    pub fn new(documents: Vec<Document>) -> Self {
        VecResultStream {
            documents: documents.into_iter(),
        }
    }
}

impl ResultStream for VecResultStream {
    fn next_document(&mut self) -> ShellResult<Option<Document>> {
        Ok(self.documents.next())
    }

    fn close(&mut self) -> ShellResult<()> {
        self.documents = Vec::new().into_iter();
        Ok(())
    }
}
