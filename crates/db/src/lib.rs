//! SQLite-backed document store for turfbook.
//!
//! Collections hold JSON objects in insertion order. Every document carries an
//! `id`, assigned by the store unless the writer supplies one. Schema rules
//! (required fields, unique indexes) are contributed by module migrations and
//! persisted with the data, so they keep applying across restarts.

pub mod error;
pub mod filter;
pub mod module;
pub mod store;

pub use error::DbError;
pub use filter::Filter;
pub use module::{create_module, load_seed, DbModule};
pub use store::Database;
