//! Shared building blocks: the value model, shape flags, sticky error
//! slots and lock helpers.

mod error_slot;
mod shape;
mod type_utils;
mod value;

pub use error_slot::*;
pub use shape::*;
pub use type_utils::*;
pub use value::*;
