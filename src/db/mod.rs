//! Database module for netwatch.
//!
//! SQLite storage in WAL mode for status samples and remediation events.

mod models;
mod store;

pub use models::*;
pub use store::*;
