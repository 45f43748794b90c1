//! SQLite backend for the NoSqlite document store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Documents are stored verbatim as JSON
//! in `data._source`; every promoted leaf becomes a virtual generated column
//! computed with `json_extract`.

mod data;
mod encode;
mod evolve;
mod registry;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::DATA_TABLE;
pub use store::SqliteStore;
