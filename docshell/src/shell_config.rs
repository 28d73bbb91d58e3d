//! Connection settings shared by a [crate::Database] and its builder.

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, ShellError, ShellResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long `connect` waits for the server before giving up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shell configuration.
///
/// Clones share the same settings. Once a database has been opened
/// through [crate::ShellBuilder] the configuration is frozen and the
/// setters fail.
#[derive(Clone)]
pub struct ShellConfig {
    inner: Arc<ShellConfigInner>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellConfig {
    pub fn new() -> Self {
        ShellConfig {
            inner: Arc::new(ShellConfigInner::new()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.inner.connect_timeout.read_with(|timeout| *timeout)
    }

    /// Sets the connect timeout. A zero timeout is rejected.
    pub fn set_connect_timeout(&self, timeout: Duration) -> ShellResult<()> {
        self.inner.ensure_mutable()?;
        if timeout.is_zero() {
            log::error!("Connect timeout cannot be zero");
            return Err(ShellError::new(
                "connect timeout cannot be zero",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.connect_timeout.write_with(|it| *it = timeout);
        Ok(())
    }

    /// Database selected right after connecting, if any.
    pub fn default_database(&self) -> Option<String> {
        self.inner.default_database.read_with(|name| name.clone())
    }

    pub fn set_default_database(&self, name: &str) -> ShellResult<()> {
        self.inner.ensure_mutable()?;
        if name.is_empty() {
            log::error!("Default database name cannot be empty");
            return Err(ShellError::new(
                "default database name cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.default_database.write_with(|it| *it = Some(name.to_string()));
        Ok(())
    }

    /// Connection string handed to the driver.
    pub fn uri(&self) -> Option<String> {
        self.inner.uri.read_with(|uri| uri.clone())
    }

    pub fn set_uri(&self, uri: &str) -> ShellResult<()> {
        self.inner.ensure_mutable()?;
        if uri.trim().is_empty() {
            log::error!("Connection string cannot be empty");
            return Err(ShellError::new(
                "connection string cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.uri.write_with(|it| *it = Some(uri.to_string()));
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::Release);
    }
}

struct ShellConfigInner {
    frozen: AtomicBool,
    connect_timeout: Atomic<Duration>,
    default_database: Atomic<Option<String>>,
    uri: Atomic<Option<String>>,
}

impl ShellConfigInner {
    fn new() -> Self {
        ShellConfigInner {
            frozen: AtomicBool::new(false),
            connect_timeout: atomic(DEFAULT_CONNECT_TIMEOUT),
            default_database: atomic(None),
            uri: atomic(None),
        }
    }

    fn ensure_mutable(&self) -> ShellResult<()> {
        if self.frozen.load(Ordering::Acquire) {
            log::error!("Configuration cannot be changed after the database is opened");
            return Err(ShellError::new(
                "configuration cannot be changed after the database is opened",
                ErrorKind::ConfigurationError,
            ));
        }
        Ok(())
    }
}
