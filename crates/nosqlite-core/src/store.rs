//! The `DocumentStore` trait.
//!
//! Implemented by storage backends (e.g. `nosqlite-store-sqlite`). The HTTP
//! layer and the ingestion loop depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde_json::Value;

use crate::{
  StoreError,
  document::StoredDocument,
  mapping::{Mapping, Mappings},
  query::{DataQuery, DataResult, Filter, Params, Row},
};

/// A schema-inferring document store.
///
/// Documents are immutable once written. Every classifiable leaf of an
/// indexed document is promoted to a queryable column whose value is always
/// derived from the stored JSON.
pub trait DocumentStore: Send + Sync {
  type Error: StoreError;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Evolve the schema for `doc`, then store it. Unsupported leaves are
  /// skipped; a schema conflict rejects the whole document.
  fn index(&self, doc: Value) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Promote every leaf of a representative `shape` document and force its
  /// index flag to `indexed`. Nothing is stored.
  fn seed(
    &self,
    shape: Value,
    indexed: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Documents cannot be updated; implementations must fail.
  fn update(
    &self,
    id: i64,
    doc: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Mappings ──────────────────────────────────────────────────────────

  /// Snapshot of the mapping registry.
  fn mappings(&self) -> impl Future<Output = Mappings> + Send + '_;

  /// Create or drop the secondary index of an already-mapped field.
  fn set_indexed(
    &self,
    field: String,
    indexed: bool,
  ) -> impl Future<Output = Result<Mapping, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Materialise every matching document, parsed back from its stored JSON.
  fn select(
    &self,
    filter: Filter,
  ) -> impl Future<Output = Result<Vec<StoredDocument>, Self::Error>> + Send + '_;

  fn count(&self, filter: Filter) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Run an arbitrary parameterised statement and return its raw rows.
  /// Unrestricted: schema and data changes go through, so only trusted
  /// callers may reach it.
  fn all(
    &self,
    sql: String,
    params: Params,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + '_;

  /// Like [`all`](Self::all), but refuses any statement that could write to
  /// the database, including DDL. This is the only raw entry point exposed
  /// to clients.
  fn read(
    &self,
    sql: String,
    params: Params,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + '_;

  /// Answer a structured data query.
  fn query(
    &self,
    query: DataQuery,
  ) -> impl Future<Output = Result<DataResult, Self::Error>> + Send + '_;
}
