use super::catalog::MemoryCatalog;
use super::executor::{ensure_connected, InMemoryExecutor};
use super::faults::{FaultPoint, Faults};
use crate::collection::Document;
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::store::{
    Client, ClientProvider, DatabaseBackend, DatabaseBackendProvider, DriverProvider,
    QueryExecutor,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connection string scheme served by [InMemoryDriver].
pub const MEMORY_SCHEME: &str = "memory://";

/// A driver keeping every database in process memory.
///
/// Clones share the same data, so a test can seed documents through one
/// handle and query them through the shell. Failures can be injected with
/// [InMemoryDriver::fail_next].
///
/// # Examples
///
/// ```rust
/// use docshell::doc;
/// use docshell::store::memory::InMemoryDriver;
/// use docshell::store::DriverProvider;
/// use std::time::Duration;
///
/// let driver = InMemoryDriver::new();
/// driver.seed("test", "zips", vec![doc! { "city": "LA" }]);
///
/// let client = driver.connect("memory://local", Duration::from_secs(1))?;
/// assert_eq!(client.list_database_names()?, vec!["test"]);
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDriver {
    inner: Arc<InMemoryDriverInner>,
}

#[derive(Default)]
struct InMemoryDriverInner {
    catalog: MemoryCatalog,
    faults: Faults,
    connect_latency: Atomic<Duration>,
}

impl InMemoryDriver {
    pub fn new() -> InMemoryDriver {
        InMemoryDriver {
            inner: Arc::new(InMemoryDriverInner {
                catalog: MemoryCatalog::default(),
                faults: Faults::default(),
                connect_latency: atomic(Duration::ZERO),
            }),
        }
    }

    /// Appends `documents` to a collection as they are, generating `_id`s
    /// where missing. Creates the database and collection if needed.
    pub fn seed(&self, database: &str, collection: &str, documents: Vec<Document>) {
        let documents: Vec<Document> = documents
            .into_iter()
            .map(|doc| super::executor::with_id(doc).0)
            .collect();
        self.inner
            .catalog
            .collection(database, collection)
            .write_with(|stored| stored.extend(documents));
    }

    /// Current content of a collection, in storage order.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.inner.catalog.snapshot(database, collection)
    }

    /// Makes the next call at `point` fail with `message`.
    pub fn fail_next(&self, point: FaultPoint, message: &str) {
        self.inner.faults.arm(point, message);
    }

    /// Simulated time a connection takes to establish. A connect whose
    /// timeout is shorter fails.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.inner.connect_latency.write_with(|l| *l = latency);
    }
}

impl DriverProvider for InMemoryDriver {
    fn connect(&self, uri: &str, timeout: Duration) -> ShellResult<Client> {
        self.inner.faults.check(FaultPoint::Connect)?;

        if !uri.starts_with(MEMORY_SCHEME) {
            log::error!("Unsupported connection string {}", uri);
            return Err(ShellError::new(
                &format!("unsupported connection string, expected {}...: {}", MEMORY_SCHEME, uri),
                ErrorKind::ExecutorError,
            ));
        }

        let latency = self.inner.connect_latency.read_with(|l| *l);
        if latency > timeout {
            log::error!("Connecting to {} timed out after {:?}", uri, timeout);
            return Err(ShellError::new(
                &format!("server selection timed out after {:?}", timeout),
                ErrorKind::ExecutorError,
            ));
        }

        log::debug!("Connected to {}", uri);
        Ok(Client::new(InMemoryClient {
            catalog: self.inner.catalog.clone(),
            faults: self.inner.faults.clone(),
            connected: Arc::new(AtomicBool::new(true)),
        }))
    }
}

fn validate_name(kind: &str, name: &str, forbidden: &[char]) -> ShellResult<()> {
    if name.is_empty() || name.contains(forbidden) {
        log::error!("Invalid {} name {:?}", kind, name);
        return Err(ShellError::new(
            &format!("invalid {} name: {:?}", kind, name),
            ErrorKind::ExecutorError,
        ));
    }
    Ok(())
}

struct InMemoryClient {
    catalog: MemoryCatalog,
    faults: Faults,
    connected: Arc<AtomicBool>,
}

impl ClientProvider for InMemoryClient {
    fn disconnect(&self) -> ShellResult<()> {
        self.faults.check(FaultPoint::Disconnect)?;
        ensure_connected(&self.connected)?;
        self.connected.store(false, Ordering::Release);
        log::debug!("Disconnected in-memory client");
        Ok(())
    }

    fn list_database_names(&self) -> ShellResult<Vec<String>> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::ListDatabases)?;
        Ok(self.catalog.database_names())
    }

    fn select_database(&self, name: &str) -> ShellResult<DatabaseBackend> {
        ensure_connected(&self.connected)?;
        validate_name("database", name, &['/', '\\', '.', ' ', '"', '$'])?;
        Ok(DatabaseBackend::new(InMemoryDatabase {
            name: name.to_string(),
            catalog: self.catalog.clone(),
            faults: self.faults.clone(),
            connected: self.connected.clone(),
        }))
    }
}

struct InMemoryDatabase {
    name: String,
    catalog: MemoryCatalog,
    faults: Faults,
    connected: Arc<AtomicBool>,
}

impl DatabaseBackendProvider for InMemoryDatabase {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn list_collection_names(&self) -> ShellResult<Vec<String>> {
        ensure_connected(&self.connected)?;
        self.faults.check(FaultPoint::ListCollections)?;
        Ok(self.catalog.collection_names(&self.name))
    }

    fn select_collection(&self, name: &str) -> ShellResult<QueryExecutor> {
        ensure_connected(&self.connected)?;
        validate_name("collection", name, &['$'])?;
        Ok(QueryExecutor::new(InMemoryExecutor {
            catalog: self.catalog.clone(),
            faults: self.faults.clone(),
            connected: self.connected.clone(),
            database: self.name.clone(),
            collection: name.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::FindQuery;
    use crate::doc;

    fn connect(driver: &InMemoryDriver) -> Client {
        match driver.connect("memory://test", Duration::from_secs(10)) {
            Ok(client) => client,
            Err(err) => panic!("connect failed: {:?}", err),
        }
    }

    #[test]
    fn test_connect_rejects_other_schemes() {
        let driver = InMemoryDriver::new();
        let err = driver
            .connect("mongodb://localhost:27017", Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::ExecutorError);
    }

    #[test]
    fn test_connect_times_out() {
        let driver = InMemoryDriver::new();
        driver.set_connect_latency(Duration::from_secs(5));
        assert!(driver.connect("memory://x", Duration::from_secs(1)).is_err());
        assert!(driver.connect("memory://x", Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_seeded_data_is_visible_through_client() {
        let driver = InMemoryDriver::new();
        driver.seed("test", "zips", vec![doc! { "_id": 1 }, doc! { "_id": 2 }]);
        driver.seed("other", "c", vec![doc! {}]);

        let client = connect(&driver);
        assert_eq!(client.list_database_names().unwrap(), vec!["other", "test"]);

        let database = client.select_database("test").unwrap();
        assert_eq!(database.name(), "test");
        assert_eq!(database.list_collection_names().unwrap(), vec!["zips"]);

        let executor = database.select_collection("zips").unwrap();
        let mut stream = executor.execute_find(&FindQuery::default()).unwrap();
        assert_eq!(stream.next_document().unwrap(), Some(doc! { "_id": 1 }));
    }

    #[test]
    fn test_seed_generates_ids() {
        let driver = InMemoryDriver::new();
        driver.seed("db", "c", vec![doc! { "a": 1 }]);
        assert!(driver.documents("db", "c")[0].contains_key("_id"));
    }

    #[test]
    fn test_invalid_names() {
        let client = connect(&InMemoryDriver::new());
        assert!(client.select_database("").is_err());
        assert!(client.select_database("a.b").is_err());
        let database = client.select_database("ok").unwrap();
        assert!(database.select_collection("$bad").is_err());
    }

    #[test]
    fn test_disconnect_twice_fails() {
        let client = connect(&InMemoryDriver::new());
        let database = client.select_database("db").unwrap();
        client.disconnect().unwrap();
        assert!(client.disconnect().is_err());
        assert!(database.list_collection_names().is_err());
    }

    #[test]
    fn test_injected_list_failure() {
        let driver = InMemoryDriver::new();
        let client = connect(&driver);
        driver.fail_next(FaultPoint::ListDatabases, "not authorized");
        let err = client.list_database_names().unwrap_err();
        assert_eq!(err.message(), "not authorized");
        assert!(client.list_database_names().is_ok());
    }
}
