//! Field mappings and the pure leaf classifier.
//!
//! A [`Mapping`] records how one dotted leaf path of a JSON document is
//! promoted into a generated column. [`classify`] decides what a JSON value
//! is for schema purposes, and [`reconcile`] decides what (if anything) has
//! to change in the registry when a leaf is observed. Neither touches the
//! database; the SQLite backend applies the resulting [`Plan`]s.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The JSON-level type first observed for a field. Never changes once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsType {
  /// Not produced by JSON input; accepted when replaying persisted mappings.
  Bigint,
  Number,
  String,
  Boolean,
}

impl JsType {
  pub fn as_str(self) -> &'static str {
    match self {
      JsType::Bigint => "bigint",
      JsType::Number => "number",
      JsType::String => "string",
      JsType::Boolean => "boolean",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "bigint" => Some(JsType::Bigint),
      "number" => Some(JsType::Number),
      "string" => Some(JsType::String),
      "boolean" => Some(JsType::Boolean),
      _ => None,
    }
  }
}

impl fmt::Display for JsType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Physical column type of a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
  Integer,
  Real,
  Text,
}

impl SqlType {
  pub fn as_str(self) -> &'static str {
    match self {
      SqlType::Integer => "INTEGER",
      SqlType::Real => "REAL",
      SqlType::Text => "TEXT",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "INTEGER" => Some(SqlType::Integer),
      "REAL" => Some(SqlType::Real),
      "TEXT" => Some(SqlType::Text),
      _ => None,
    }
  }

  pub fn is_numeric(self) -> bool { matches!(self, SqlType::Integer | SqlType::Real) }
}

impl fmt::Display for SqlType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One promoted leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
  #[serde(rename = "jsType")]
  pub js_type:  JsType,
  #[serde(rename = "sqlType")]
  pub sql_type: SqlType,
  pub indexed:  bool,
}

/// Registry snapshot, keyed by dotted field path.
pub type Mappings = BTreeMap<String, Mapping>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Schema type of a scalar leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
  Integer,
  Real,
  Text,
  Boolean,
}

impl LeafType {
  pub fn js_type(self) -> JsType {
    match self {
      LeafType::Integer | LeafType::Real => JsType::Number,
      LeafType::Text => JsType::String,
      LeafType::Boolean => JsType::Boolean,
    }
  }

  pub fn sql_type(self) -> SqlType {
    match self {
      LeafType::Integer | LeafType::Boolean => SqlType::Integer,
      LeafType::Real => SqlType::Real,
      LeafType::Text => SqlType::Text,
    }
  }
}

impl fmt::Display for LeafType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.js_type(), self.sql_type())
  }
}

/// Why a value cannot be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
  Null,
  EmptyArray,
  NestedArray,
  ArrayOfObjects,
}

impl fmt::Display for Unsupported {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Unsupported::Null => "null value",
      Unsupported::EmptyArray => "empty array",
      Unsupported::NestedArray => "array of arrays",
      Unsupported::ArrayOfObjects => "array of objects",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classified<'a> {
  Leaf(LeafType),
  Object(&'a Map<String, Value>),
  Unsupported(Unsupported),
}

/// Classify a JSON value for schema purposes.
///
/// Arrays are typed by their first element only.
pub fn classify(value: &Value) -> Classified<'_> {
  match value {
    Value::Null => Classified::Unsupported(Unsupported::Null),
    Value::Bool(_) => Classified::Leaf(LeafType::Boolean),
    Value::Number(n) => {
      let integral = n.is_i64()
        || n.is_u64()
        || n.as_f64().is_some_and(|f| f.is_finite() && f.floor() == f);
      Classified::Leaf(if integral { LeafType::Integer } else { LeafType::Real })
    }
    Value::String(_) => Classified::Leaf(LeafType::Text),
    Value::Object(map) => Classified::Object(map),
    Value::Array(items) => match items.first() {
      None => Classified::Unsupported(Unsupported::EmptyArray),
      Some(Value::Array(_)) => Classified::Unsupported(Unsupported::NestedArray),
      Some(Value::Object(_)) => Classified::Unsupported(Unsupported::ArrayOfObjects),
      Some(first) => classify(first),
    },
  }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// A registry change for one field: `before` is `None` for a promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
  pub field:  String,
  pub before: Option<Mapping>,
  pub after:  Mapping,
}

impl Plan {
  pub fn is_promotion(&self) -> bool { self.before.is_none() }

  pub fn is_widening(&self) -> bool {
    self
      .before
      .is_some_and(|b| b.sql_type != self.after.sql_type)
  }

  /// `Some(new_flag)` when the secondary index has to be created or dropped.
  pub fn index_change(&self) -> Option<bool> {
    match self.before {
      None if self.after.indexed => Some(true),
      None => None,
      Some(b) if b.indexed != self.after.indexed => Some(self.after.indexed),
      Some(_) => None,
    }
  }
}

/// Decide what observing `leaf` at `field` means for the registry.
///
/// `indexed` is the explicitly requested index flag; `None` keeps the stored
/// flag (and leaves new fields unindexed). Returns `Ok(None)` when nothing
/// changes.
pub fn reconcile(
  field:    &str,
  existing: Option<&Mapping>,
  leaf:     LeafType,
  indexed:  Option<bool>,
) -> Result<Option<Plan>> {
  let Some(existing) = existing else {
    return Ok(Some(Plan {
      field:  field.to_owned(),
      before: None,
      after:  Mapping {
        js_type:  leaf.js_type(),
        sql_type: leaf.sql_type(),
        indexed:  indexed.unwrap_or(false),
      },
    }));
  };

  let conflict = || Error::SchemaConflict {
    field:     field.to_owned(),
    requested: leaf,
    existing:  *existing,
  };

  if existing.js_type != leaf.js_type() {
    return Err(conflict());
  }

  let sql_type = match (existing.sql_type, leaf.sql_type()) {
    (have, want) if have == want => have,
    (SqlType::Integer, SqlType::Real) => SqlType::Real,
    (SqlType::Real, SqlType::Integer) => SqlType::Real,
    _ => return Err(conflict()),
  };

  let after = Mapping {
    js_type: existing.js_type,
    sql_type,
    indexed: indexed.unwrap_or(existing.indexed),
  };

  if after == *existing {
    Ok(None)
  } else {
    Ok(Some(Plan { field: field.to_owned(), before: Some(*existing), after }))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn mapping(js_type: JsType, sql_type: SqlType) -> Mapping {
    Mapping { js_type, sql_type, indexed: false }
  }

  #[test]
  fn classifies_scalars() {
    assert_eq!(classify(&json!(1)), Classified::Leaf(LeafType::Integer));
    assert_eq!(classify(&json!(-7)), Classified::Leaf(LeafType::Integer));
    assert_eq!(classify(&json!(2.0)), Classified::Leaf(LeafType::Integer));
    assert_eq!(classify(&json!(1.5)), Classified::Leaf(LeafType::Real));
    assert_eq!(classify(&json!("on")), Classified::Leaf(LeafType::Text));
    assert_eq!(classify(&json!(true)), Classified::Leaf(LeafType::Boolean));
  }

  #[test]
  fn boolean_is_stored_as_integer() {
    assert_eq!(LeafType::Boolean.sql_type(), SqlType::Integer);
    assert_eq!(LeafType::Boolean.js_type(), JsType::Boolean);
  }

  #[test]
  fn arrays_use_first_element() {
    assert_eq!(classify(&json!([1, "a", 2.5])), Classified::Leaf(LeafType::Integer));
    assert_eq!(classify(&json!([1.5, 1])), Classified::Leaf(LeafType::Real));
    assert_eq!(classify(&json!([])), Classified::Unsupported(Unsupported::EmptyArray));
    assert_eq!(
      classify(&json!([{ "a": 1 }])),
      Classified::Unsupported(Unsupported::ArrayOfObjects)
    );
    assert_eq!(classify(&json!([[1]])), Classified::Unsupported(Unsupported::NestedArray));
    assert_eq!(classify(&json!([null])), Classified::Unsupported(Unsupported::Null));
  }

  #[test]
  fn null_is_unsupported() {
    assert_eq!(classify(&Value::Null), Classified::Unsupported(Unsupported::Null));
  }

  #[test]
  fn objects_are_recursed_into() {
    assert!(matches!(classify(&json!({ "b": 5 })), Classified::Object(m) if m.len() == 1));
  }

  #[test]
  fn reconcile_new_field_creates_mapping() {
    let plan = reconcile("x", None, LeafType::Integer, None).unwrap().unwrap();
    assert!(plan.is_promotion());
    assert_eq!(plan.after, mapping(JsType::Number, SqlType::Integer));
    assert_eq!(plan.index_change(), None);

    let plan = reconcile("x", None, LeafType::Text, Some(true)).unwrap().unwrap();
    assert_eq!(plan.index_change(), Some(true));
  }

  #[test]
  fn reconcile_same_type_is_noop() {
    let m = mapping(JsType::Number, SqlType::Integer);
    assert_eq!(reconcile("x", Some(&m), LeafType::Integer, None).unwrap(), None);
  }

  #[test]
  fn reconcile_widens_integer_to_real() {
    let m = mapping(JsType::Number, SqlType::Integer);
    let plan = reconcile("x", Some(&m), LeafType::Real, None).unwrap().unwrap();
    assert!(plan.is_widening());
    assert_eq!(plan.after.sql_type, SqlType::Real);
    assert_eq!(plan.after.js_type, JsType::Number);
  }

  #[test]
  fn reconcile_never_narrows_real() {
    let m = mapping(JsType::Number, SqlType::Real);
    assert_eq!(reconcile("x", Some(&m), LeafType::Integer, None).unwrap(), None);
  }

  #[test]
  fn reconcile_rejects_js_type_change() {
    let m = mapping(JsType::Number, SqlType::Integer);
    let err = reconcile("x", Some(&m), LeafType::Text, None).unwrap_err();
    assert!(matches!(err, Error::SchemaConflict { ref field, existing, .. }
      if field == "x" && existing == m));

    let err = reconcile("x", Some(&m), LeafType::Boolean, None).unwrap_err();
    assert!(matches!(err, Error::SchemaConflict { .. }));
  }

  #[test]
  fn reconcile_rejects_sql_mismatch_after_js_agreement() {
    let m = mapping(JsType::String, SqlType::Integer);
    let err = reconcile("x", Some(&m), LeafType::Text, None).unwrap_err();
    assert!(matches!(err, Error::SchemaConflict { .. }));
  }

  #[test]
  fn reconcile_toggles_index_flag() {
    let m = mapping(JsType::String, SqlType::Text);
    let plan = reconcile("t", Some(&m), LeafType::Text, Some(true)).unwrap().unwrap();
    assert_eq!(plan.index_change(), Some(true));
    assert!(!plan.is_widening());

    let indexed = Mapping { indexed: true, ..m };
    assert_eq!(reconcile("t", Some(&indexed), LeafType::Text, None).unwrap(), None);
    let plan = reconcile("t", Some(&indexed), LeafType::Text, Some(false))
      .unwrap()
      .unwrap();
    assert_eq!(plan.index_change(), Some(false));
  }

  #[test]
  fn mapping_serializes_with_wire_names() {
    let m = Mapping { js_type: JsType::Number, sql_type: SqlType::Real, indexed: true };
    assert_eq!(
      serde_json::to_value(m).unwrap(),
      json!({ "jsType": "number", "sqlType": "REAL", "indexed": true })
    );
  }
}
