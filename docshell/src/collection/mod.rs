//! Documents, collections and cursors.
//!
//! A [Document] keeps its fields in insertion order, duplicates included.
//! A [Collection] is obtained from [crate::Database::collection] and hands
//! out lazy [Cursor]s:
//!
//! ```rust
//! use docshell::doc;
//! use docshell::store::memory::InMemoryDriver;
//! use docshell::ShellBuilder;
//!
//! let db = ShellBuilder::new(InMemoryDriver::new())
//!     .uri("memory://local")
//!     .default_database("test")
//!     .open()?;
//!
//! let zips = db.collection("zips");
//! zips.insert_many(vec![doc! { "city": "LA", "pop": 3 }, doc! { "city": "SF", "pop": 8 }]);
//!
//! let first = zips.find_one(r#"{"pop": {"$gt": 5}}"#, ());
//! assert_eq!(first.get("city").and_then(|v| v.as_str()), Some("SF"));
//! # Ok::<(), docshell::errors::ShellError>(())
//! ```

mod cursor;
mod document;
mod object_id;
mod query_spec;
mod shell_collection;
mod write_result;

pub use cursor::*;
pub use document::*;
pub use object_id::*;
pub use query_spec::*;
pub use shell_collection::*;
pub use write_result::*;
