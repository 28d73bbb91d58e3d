//! In-memory driver.
//!
//! Implements every provider of [crate::store] over process memory so that
//! the shell can run end to end without a server. Query support covers
//! equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex`,
//! `$and $or $nor`, dotted paths, projections, sort, skip and limit, plus
//! the pipeline stages `$match $sort $skip $limit $project`.

mod catalog;
mod driver;
mod executor;
mod faults;
mod matcher;
mod pipeline;
mod query;

pub use driver::*;
pub use faults::FaultPoint;
