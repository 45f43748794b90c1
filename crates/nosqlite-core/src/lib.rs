//! Core types and trait definitions for the NoSqlite telemetry store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Field classification and mapping reconciliation live here as pure
//! functions; backends apply their results.

pub mod document;
pub mod error;
pub mod mapping;
pub mod path;
pub mod query;
pub mod store;
pub mod topic;

pub use error::{Error, ErrorKind, Result, StoreError};
