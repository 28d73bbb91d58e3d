use crate::errors::ShellResult;
use crate::store::QueryExecutor;
use std::ops::Deref;
use std::sync::Arc;

/// A database selected on a [crate::store::Client].
pub trait DatabaseBackendProvider: Send + Sync {
    fn name(&self) -> String;

    fn list_collection_names(&self) -> ShellResult<Vec<String>>;

    /// Returns the executor serving collection `name`. Selecting a
    /// collection that does not exist yet is not an error.
    fn select_collection(&self, name: &str) -> ShellResult<QueryExecutor>;
}

/// Cloneable handle to a [DatabaseBackendProvider].
#[derive(Clone)]
pub struct DatabaseBackend {
    inner: Arc<dyn DatabaseBackendProvider>,
}

impl DatabaseBackend {
    pub fn new<T: DatabaseBackendProvider + 'static>(inner: T) -> Self {
        DatabaseBackend {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for DatabaseBackend {
    type Target = Arc<dyn DatabaseBackendProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
