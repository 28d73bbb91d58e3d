use crate::collection::Collection;
use crate::common::ErrorSlot;
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::shell_builder::ShellBuilder;
use crate::shell_config::ShellConfig;
use crate::store::{Client, DatabaseBackend, Driver, DriverProvider};

/// The entry point of the shell: a connection to a server and the
/// currently selected database.
///
/// Like the interactive shell it imitates, `Database` keeps a sticky last
/// error. The fluent methods record failures there and keep returning the
/// handle; [Database::last_error] reads it back. Errors raised by
/// collections and cursors obtained from this handle are mirrored here if
/// nothing is pending.
///
/// ```rust
/// use docshell::store::memory::InMemoryDriver;
/// use docshell::store::Driver;
/// use docshell::{Database, ShellConfig};
///
/// let driver = Driver::new(InMemoryDriver::new());
/// let mut db = Database::new(driver, ShellConfig::new());
///
/// db.connect("memory://local").use_database("test");
/// assert!(db.last_error().is_none());
/// assert_eq!(db.name().as_deref(), Some("test"));
/// ```
pub struct Database {
    driver: Driver,
    config: ShellConfig,
    client: Option<Client>,
    backend: Option<DatabaseBackend>,
    errors: ErrorSlot,
}

impl Database {
    /// Creates a disconnected handle.
    pub fn new(driver: Driver, config: ShellConfig) -> Database {
        Database {
            driver,
            config,
            client: None,
            backend: None,
            errors: ErrorSlot::new(),
        }
    }

    pub fn builder<T: DriverProvider + 'static>(driver: T) -> ShellBuilder {
        ShellBuilder::new(driver)
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Connects to `uri`, dropping any previous connection first. The
    /// pending error is replaced by the outcome of the connect.
    pub fn connect(&mut self, uri: &str) -> &mut Database {
        self.try_connect(uri).ok();
        self
    }

    pub fn try_connect(&mut self, uri: &str) -> ShellResult<()> {
        self.disconnect();
        self.errors.clear();

        let timeout = self.config.connect_timeout();
        match self.driver.connect(uri, timeout) {
            Ok(client) => {
                log::debug!("Connected to {}", uri);
                self.client = Some(client);
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to connect to {}: {}", uri, err);
                self.errors.record(err.clone());
                Err(err)
            }
        }
    }

    /// Selects the database later operations run against. Does nothing
    /// while an error is pending.
    pub fn use_database(&mut self, name: &str) -> &mut Database {
        self.try_use_database(name).ok();
        self
    }

    pub fn try_use_database(&mut self, name: &str) -> ShellResult<()> {
        if let Some(pending) = self.errors.get() {
            return Err(pending);
        }

        let selected = match &self.client {
            Some(client) => client.select_database(name),
            None => Err(not_connected()),
        };
        match selected {
            Ok(backend) => {
                log::debug!("Using database {}", name);
                self.backend = Some(backend);
                Ok(())
            }
            Err(err) => {
                self.errors.record(err.clone());
                Err(err)
            }
        }
    }

    /// Releases the client. A disconnect failure is recorded only if no
    /// other error is pending.
    pub fn disconnect(&mut self) {
        self.backend = None;
        if let Some(client) = self.client.take() {
            match client.disconnect() {
                Ok(_) => log::debug!("Disconnected"),
                Err(err) => {
                    log::warn!("Failed to disconnect: {}", err);
                    self.errors.record_if_clear(err);
                }
            }
        }
    }

    /// Names of the databases on the server; empty on failure.
    pub fn show_dbs(&self) -> Vec<String> {
        let listed = match &self.client {
            Some(client) => client.list_database_names(),
            None => Err(not_connected()),
        };
        self.listing(listed)
    }

    /// Names of the collections in the current database; empty on failure.
    pub fn show_collections(&self) -> Vec<String> {
        let listed = self
            .current_backend()
            .and_then(|backend| backend.list_collection_names());
        self.listing(listed)
    }

    /// Returns a handle on collection `name` of the current database.
    ///
    /// Without a selected database the handle is still returned, but every
    /// operation on it fails with [ErrorKind::NotConnected] or
    /// [ErrorKind::NotConnectedDatabase].
    pub fn collection(&self, name: &str) -> Collection {
        let errors = self.errors.child();
        let selected = self.current_backend().and_then(|backend| {
            let executor = backend.select_collection(name)?;
            Ok((backend.name(), executor))
        });

        match selected {
            Ok((database, executor)) => Collection::bound(name, &database, executor, errors),
            Err(err) => Collection::unbound(name, err, errors),
        }
    }

    pub fn last_error(&self) -> Option<ShellError> {
        self.errors.get()
    }

    pub fn clear_error(&self) {
        self.errors.clear();
    }

    /// Name of the selected database.
    pub fn name(&self) -> Option<String> {
        self.backend.as_ref().map(|backend| backend.name())
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn current_backend(&self) -> ShellResult<&DatabaseBackend> {
        match (&self.client, &self.backend) {
            (_, Some(backend)) => Ok(backend),
            (Some(_), None) => {
                log::error!("No database selected");
                Err(ShellError::new(
                    "not connected to a database, call use_database first",
                    ErrorKind::NotConnectedDatabase,
                ))
            }
            (None, None) => Err(not_connected()),
        }
    }

    fn listing(&self, listed: ShellResult<Vec<String>>) -> Vec<String> {
        listed.unwrap_or_else(|err| {
            log::error!("Listing failed: {}", err);
            self.errors.record(err);
            Vec::new()
        })
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(err) = client.disconnect() {
                log::warn!("Failed to disconnect on drop: {}", err);
            }
        }
    }
}

fn not_connected() -> ShellError {
    log::error!("No client is connected");
    ShellError::new("not connected, call connect first", ErrorKind::NotConnected)
}
