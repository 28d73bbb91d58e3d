//! # docshell - a shell-style query layer for document databases
//!
//! `docshell` offers the fluent, forgiving surface of an interactive
//! database shell on top of a pluggable document-database driver:
//! connect, pick a database, then chain `find`, `sort`, `skip`, `limit`
//! and `aggregate` calls whose parameters may be extended JSON text or
//! documents built in code.
//!
//! ## Key Features
//!
//! - **Extended JSON**: a parser that keeps key order and duplicate keys,
//!   reports byte offsets on syntax errors and understands `$oid`,
//!   `$date`, `$numberLong` and the other type wrappers
//! - **Parameter verification**: every filter, projection, sort spec and
//!   pipeline is normalized against the shapes the operation accepts
//! - **Lazy cursors**: nothing runs until the first read, and a cursor
//!   enforces its `Unopened -> Open -> Closed` lifecycle
//! - **Sticky errors**: fluent calls never panic; failures are recorded on
//!   the cursor, collection and database handles
//! - **Pluggable drivers**: an in-memory driver is included
//!
//! ## Quick Start
//!
//! ```rust
//! use docshell::doc;
//! use docshell::store::memory::InMemoryDriver;
//! use docshell::ShellBuilder;
//!
//! let driver = InMemoryDriver::new();
//! driver.seed("test", "zips", vec![
//!     doc! { "city": "LA", "state": "CA", "pop": 300 },
//!     doc! { "city": "SF", "state": "CA", "pop": 100 },
//!     doc! { "city": "NYC", "state": "NY", "pop": 800 },
//! ]);
//!
//! let db = ShellBuilder::new(driver)
//!     .uri("memory://local")
//!     .default_database("test")
//!     .open()?;
//!
//! let mut cursor = db
//!     .collection("zips")
//!     .find(r#"{"state": "CA"}"#, ())
//!     .sort(r#"{"pop": -1}"#)
//!     .limit(1);
//!
//! while cursor.has_next() {
//!     print!("{}", docshell::json::to_pretty_string(&cursor.next()));
//! }
//! assert!(db.last_error().is_none());
//! # Ok::<(), docshell::errors::ShellError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, collections, cursors and query specs
//! - [`common`] - The value model, shape flags and error slots
//! - [`database`] - The connection and database handle
//! - [`errors`] - Error types and result definitions
//! - [`json`] - Extended JSON parsing and writing
//! - [`shell_builder`] - Builder for a connected database
//! - [`shell_config`] - Connection settings
//! - [`store`] - Driver abstractions and the in-memory driver
//! - [`verify`] - Parameter verification

pub mod collection;
pub mod common;
pub mod database;
pub mod errors;
pub mod json;
pub mod shell_builder;
pub mod shell_config;
pub mod store;
pub mod verify;

pub use database::Database;
pub use shell_builder::ShellBuilder;
pub use shell_config::ShellConfig;
