//! Dotted field paths and their SQL spellings.
//!
//! Field paths come from document keys, which are untrusted. A path is only
//! ever interpolated into DDL after it passes [`check_field`].

use crate::{Error, Result};

/// Separator between the segments of a field path.
pub const DELIMITER: char = '.';

/// Upper bound on the byte length of a whole field path.
pub const MAX_FIELD_LEN: usize = 128;

/// Column and alias names that a promoted field may never take.
const RESERVED: &[&str] = &["rowid", "oid", "_rowid_", "_source"];

/// True if `key` may appear as one segment of a field path.
pub fn is_valid_segment(key: &str) -> bool {
  !key.is_empty()
    && key
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Extend `prefix` with `key`.
pub fn child(prefix: &str, key: &str) -> String {
  if prefix.is_empty() {
    key.to_owned()
  } else {
    format!("{prefix}{DELIMITER}{key}")
  }
}

/// Validate a complete field path.
pub fn check_field(field: &str) -> Result<()> {
  let ok = field.len() <= MAX_FIELD_LEN
    && field.split(DELIMITER).all(is_valid_segment)
    && !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(field));
  if ok { Ok(()) } else { Err(Error::InvalidField(field.to_owned())) }
}

/// The field as a double-quoted SQL identifier.
pub fn quote_ident(field: &str) -> String { format!("\"{}\"", field.replace('"', "\"\"")) }

/// The `json_extract` path literal addressing the field, quotes included.
pub fn json_path(field: &str) -> String { format!("'$.{}'", field.replace('\'', "''")) }

/// Name of the secondary index on the field's generated column.
pub fn index_name(table: &str, field: &str) -> String {
  quote_ident(&format!("idx_{table}_{field}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn child_joins_with_dots() {
    assert_eq!(child("", "a"), "a");
    assert_eq!(child("a", "b"), "a.b");
    assert_eq!(child("a.b", "c"), "a.b.c");
  }

  #[test]
  fn accepts_ordinary_sensor_keys() {
    for f in ["temperature", "payload.ENERGY.Total", "linkquality", "a-b.c_d", "x1"] {
      assert!(check_field(f).is_ok(), "{f}");
    }
  }

  #[test]
  fn rejects_injection_and_odd_keys() {
    for f in [
      "",
      "a..b",
      "x\"); DROP TABLE data; --",
      "temp °C",
      "a b",
      "it's",
      "rowid",
      "ROWID",
      "_source",
    ] {
      assert!(check_field(f).is_err(), "{f:?}");
    }
    assert!(check_field(&"a".repeat(MAX_FIELD_LEN + 1)).is_err());
  }

  #[test]
  fn sql_spellings() {
    assert_eq!(quote_ident("payload.v"), "\"payload.v\"");
    assert_eq!(json_path("payload.v"), "'$.payload.v'");
    assert_eq!(index_name("data", "payload.v"), "\"idx_data_payload.v\"");
  }
}
