//! Conversions between JSON values and SQLite values, and the raw row types
//! read from the `mappings` table.

use nosqlite_core::{
  mapping::{JsType, Mapping, SqlType},
  query::Params,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::{Error, Result};

// ─── JSON → SQLite ───────────────────────────────────────────────────────────

/// Bindable form of a JSON value. Arrays and objects bind as JSON text.
pub fn to_sql(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    other => SqlValue::Text(other.to_string()),
  }
}

/// Named parameters ready for binding. Names without a sigil get `:`.
pub fn named_params(params: &Params) -> Vec<(String, SqlValue)> {
  params
    .iter()
    .map(|(name, value)| {
      let name = if name.starts_with([':', '@', '$']) {
        name.clone()
      } else {
        format!(":{name}")
      };
      (name, to_sql(value))
    })
    .collect()
}

// ─── SQLite → JSON ───────────────────────────────────────────────────────────

pub fn from_sql(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::from(i),
    ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Value::from(b.to_vec()),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `mappings` row.
pub struct RawMapping {
  pub field:    String,
  pub js_type:  String,
  pub sql_type: String,
  pub indexed:  bool,
}

impl RawMapping {
  pub fn into_mapping(self) -> Result<(String, Mapping)> {
    let js_type = JsType::parse(&self.js_type).ok_or_else(|| {
      Error::Corrupt(format!("{}: unknown jsType {:?}", self.field, self.js_type))
    })?;
    let sql_type = SqlType::parse(&self.sql_type).ok_or_else(|| {
      Error::Corrupt(format!("{}: unknown sqlType {:?}", self.field, self.sql_type))
    })?;
    Ok((self.field, Mapping { js_type, sql_type, indexed: self.indexed }))
  }
}

/// Raw `(rowid, _source)` pair read from the document table.
pub struct RawDocument {
  pub id:     i64,
  pub source: String,
}
