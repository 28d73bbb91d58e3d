use crate::errors::ShellResult;
use crate::store::DatabaseBackend;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// Entry point of a document database driver.
///
/// A driver turns a connection string into a connected [Client]. The shell
/// never talks to the network itself; everything below this trait belongs
/// to the driver.
pub trait DriverProvider: Send + Sync {
    /// Connects to `uri`, giving up once `timeout` has elapsed.
    fn connect(&self, uri: &str, timeout: Duration) -> ShellResult<Client>;
}

/// Cloneable handle to a [DriverProvider].
#[derive(Clone)]
pub struct Driver {
    inner: Arc<dyn DriverProvider>,
}

impl Driver {
    pub fn new<T: DriverProvider + 'static>(inner: T) -> Self {
        Driver {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Driver {
    type Target = Arc<dyn DriverProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A live connection.
pub trait ClientProvider: Send + Sync {
    /// Releases the connection. Further calls on this client fail.
    fn disconnect(&self) -> ShellResult<()>;

    fn list_database_names(&self) -> ShellResult<Vec<String>>;

    fn select_database(&self, name: &str) -> ShellResult<DatabaseBackend>;
}

/// Cloneable handle to a [ClientProvider].
#[derive(Clone)]
pub struct Client {
    inner: Arc<dyn ClientProvider>,
}

impl Client {
    pub fn new<T: ClientProvider + 'static>(inner: T) -> Self {
        Client {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Client {
    type Target = Arc<dyn ClientProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, ShellError};

    struct RefusingDriver;

    impl DriverProvider for RefusingDriver {
        fn connect(&self, uri: &str, _timeout: Duration) -> ShellResult<Client> {
            Err(ShellError::new(
                &format!("connection refused: {}", uri),
                ErrorKind::ExecutorError,
            ))
        }
    }

    #[test]
    fn test_driver_wrapper_delegates() {
        let driver = Driver::new(RefusingDriver);
        let cloned = driver.clone();
        let err = cloned
            .connect("mongodb://nowhere", Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::ExecutorError);
        assert!(err.message().contains("mongodb://nowhere"));
    }
}
