//! Error type for `nosqlite-store-sqlite`.

use nosqlite_core::{ErrorKind, StoreError, mapping::Mapping};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] nosqlite_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("documents must be JSON objects")]
  NotAnObject,

  /// The field is not mapped, or is mapped with an unusable type.
  #[error("unknown field: {0}")]
  UnknownField(String),

  /// A client statement that is not read-only.
  #[error("only read-only statements are allowed: {0}")]
  ReadOnly(String),

  /// An envelope field is mapped with a type the query façade cannot use.
  #[error(
    "envelope field {field:?} is mapped as {} ({}), not usable for queries",
    .mapping.js_type,
    .mapping.sql_type
  )]
  Envelope { field: &'static str, mapping: Mapping },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("not implemented: {0}")]
  NotImplemented(&'static str),

  /// A persisted mapping row could not be decoded.
  #[error("corrupt mapping: {0}")]
  Corrupt(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::NotAnObject | Error::UnknownField(_) | Error::ReadOnly(_) => ErrorKind::Invalid,
      Error::NotFound(_) => ErrorKind::NotFound,
      Error::NotImplemented(_) => ErrorKind::Unsupported,
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) if is_bad_statement(e) => {
        ErrorKind::Invalid
      }
      Error::Database(_) | Error::Json(_) | Error::Corrupt(_) | Error::Envelope { .. } => {
        ErrorKind::Internal
      }
    }
  }
}

/// Errors caused by the statement text or its parameters rather than the
/// database itself.
fn is_bad_statement(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::InvalidParameterName(_)
    | rusqlite::Error::InvalidParameterCount(..)
    | rusqlite::Error::MultipleStatement
    | rusqlite::Error::SqlInputError { .. } => true,
    rusqlite::Error::SqliteFailure(f, _) => f.code == ErrorCode::Unknown,
    _ => false,
  }
}
