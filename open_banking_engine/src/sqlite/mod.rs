//! SQLite backend for the Open Banking gateway.
//!
//! [`SqliteDatabase`] implements every trait in [`crate::traits`]. The schema lives in `src/sqlite/migrations` and is
//! embedded into the binary.
mod errors;
mod sqlite_impl;

pub mod db;
pub use errors::SqliteDatabaseError;
pub use sqlite_impl::SqliteDatabase;
