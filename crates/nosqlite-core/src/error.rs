//! Error types for `nosqlite-core`.

use thiserror::Error;

use crate::mapping::{LeafType, Mapping};

#[derive(Debug, Error)]
pub enum Error {
  /// A leaf disagrees with its recorded mapping in a way widening can't fix.
  #[error(
    "schema conflict on field {field:?}: observed {requested} but mapped as {} ({})",
    .existing.js_type,
    .existing.sql_type
  )]
  SchemaConflict {
    field:     String,
    requested: LeafType,
    existing:  Mapping,
  },

  #[error("invalid field path: {0:?}")]
  InvalidField(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse failure category; transports use it to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Invalid,
  Unsupported,
  Internal,
}

/// Implemented by every backend error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::SchemaConflict { .. } | Error::InvalidField(_) | Error::InvalidQuery(_) => {
        ErrorKind::Invalid
      }
      Error::Json(_) => ErrorKind::Invalid,
    }
  }
}
