//! Repository layer: entity-scoped database operations.
//!
//! All public functions are re-exported here so callers import from
//! `crate::db::repository` (or `crate::db`) directly.

mod baseline;
mod conflict;

pub use baseline::*;
pub use conflict::*;
