//! The driver seam.
//!
//! The shell does not speak any wire protocol. It talks to a driver
//! through four provider traits, each wrapped in a cloneable handle:
//!
//! - [DriverProvider] / [Driver]: connects to a URI
//! - [ClientProvider] / [Client]: a live connection, lists and selects databases
//! - [DatabaseBackendProvider] / [DatabaseBackend]: lists and selects collections
//! - [QueryExecutorProvider] / [QueryExecutor]: runs finds, aggregations and writes
//!   for one collection, returning [ResultStream]s
//!
//! [memory::InMemoryDriver] implements all of them over process memory.

mod backend;
mod driver;
mod executor;
pub mod memory;

pub use backend::*;
pub use driver::*;
pub use executor::*;
