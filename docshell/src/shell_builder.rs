use crate::database::Database;
use crate::errors::{ErrorKind, ShellError, ShellResult};
use crate::shell_config::ShellConfig;
use crate::store::{Driver, DriverProvider};
use std::time::Duration;

/// Builder for a connected [Database].
///
/// Setters validate eagerly. The first invalid value is kept and returned
/// by [ShellBuilder::open]; later setters are then ignored.
///
/// ```rust
/// use docshell::store::memory::InMemoryDriver;
/// use docshell::ShellBuilder;
/// use std::time::Duration;
///
/// let db = ShellBuilder::new(InMemoryDriver::new())
///     .uri("memory://local")
///     .connect_timeout(Duration::from_secs(2))
///     .default_database("test")
///     .open()?;
///
/// assert!(db.is_connected());
/// assert_eq!(db.name().as_deref(), Some("test"));
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
pub struct ShellBuilder {
    error: Option<ShellError>,
    driver: Driver,
    config: ShellConfig,
}

impl ShellBuilder {
    pub fn new<T: DriverProvider + 'static>(driver: T) -> Self {
        ShellBuilder {
            error: None,
            driver: Driver::new(driver),
            config: ShellConfig::new(),
        }
    }

    /// Connection string passed to the driver. Required.
    pub fn uri(mut self, uri: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_uri(uri) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Defaults to 10 seconds; zero is rejected.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_connect_timeout(timeout) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Database to select once connected.
    pub fn default_database(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_default_database(name) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Connects and, if configured, selects the default database. Returns
    /// the first configuration error instead when there was one.
    pub fn open(self) -> ShellResult<Database> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri = match self.config.uri() {
            Some(uri) => uri,
            None => {
                log::error!("No connection string configured");
                return Err(ShellError::new(
                    "no connection string configured, call uri first",
                    ErrorKind::ConfigurationError,
                ));
            }
        };

        self.config.freeze();
        let mut database = Database::new(self.driver, self.config.clone());
        database.try_connect(&uri)?;
        if let Some(name) = self.config.default_database() {
            database.try_use_database(&name)?;
        }
        Ok(database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryDriver;

    #[test]
    fn test_open_connects() {
        let db = ShellBuilder::new(InMemoryDriver::new())
            .uri("memory://local")
            .open()
            .unwrap();
        assert!(db.is_connected());
        assert_eq!(db.name(), None);
        assert!(db.config().is_frozen());
    }

    #[test]
    fn test_open_selects_default_database() {
        let db = ShellBuilder::new(InMemoryDriver::new())
            .uri("memory://local")
            .default_database("zips")
            .open()
            .unwrap();
        assert_eq!(db.name().as_deref(), Some("zips"));
    }

    #[test]
    fn test_first_error_wins() {
        let err = ShellBuilder::new(InMemoryDriver::new())
            .connect_timeout(Duration::ZERO)
            .uri("")
            .open()
            .err()
            .unwrap();
        assert!(err.message().contains("timeout"));
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_missing_uri() {
        let err = ShellBuilder::new(InMemoryDriver::new()).open().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_connect_failure_surfaces() {
        let driver = InMemoryDriver::new();
        driver.set_connect_latency(Duration::from_secs(5));
        let err = ShellBuilder::new(driver)
            .uri("memory://slow")
            .connect_timeout(Duration::from_secs(1))
            .open()
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::ExecutorError);
    }

    #[test]
    fn test_invalid_default_database_surfaces() {
        let result = ShellBuilder::new(InMemoryDriver::new())
            .uri("memory://local")
            .default_database("no/slashes")
            .open();
        assert!(result.is_err());
    }
}
