//! Extended JSON reading and writing.
//!
//! [parse] turns caller text into the document model and
//! [to_extended_json] writes it back in a form [parse] reads identically.

mod extended;
mod parser;
mod writer;

pub use parser::parse;
pub use writer::{
    document_to_extended_json, to_extended_json, to_extended_json_pretty, to_pretty_string,
    to_relaxed_json,
};
