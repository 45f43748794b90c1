//! Dynamic schema evolution.
//!
//! [`plan`] walks a document against a registry snapshot and returns every
//! mapping change the document needs, or the first schema conflict. It does
//! no I/O. [`apply`] then issues the DDL for a batch of plans inside the
//! caller's transaction.

use std::collections::HashSet;

use nosqlite_core::{
  mapping::{Classified, LeafType, Mappings, Plan, classify, reconcile},
  path,
};
use rusqlite::{OptionalExtension as _, Transaction};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::Result;

// ─── Walk ────────────────────────────────────────────────────────────────────

/// Collect `(path, leaf type)` for every promotable leaf of `doc`.
///
/// Unsupported values and unsafe keys are logged and skipped.
pub fn leaves(doc: &Map<String, Value>) -> Vec<(String, LeafType)> {
  let mut out = Vec::new();
  walk(doc, "", &mut out);
  out
}

fn walk(object: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, LeafType)>) {
  for (key, value) in object {
    if !path::is_valid_segment(key) {
      warn!(prefix, key = %key, "skipping field with unsafe name");
      continue;
    }
    let field = path::child(prefix, key);

    match classify(value) {
      Classified::Leaf(leaf) => out.push((field, leaf)),
      Classified::Object(inner) => walk(inner, &field, out),
      Classified::Unsupported(why) => debug!(field = %field, reason = %why, "skipping unsupported value"),
    }
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

/// Work out every registry change `doc` requires against `mappings`.
///
/// A conflict on any field fails the whole plan, so nothing is applied for a
/// rejected document.
pub fn plan(
  mappings: &Mappings,
  doc:      &Map<String, Value>,
  indexed:  Option<bool>,
) -> Result<Vec<Plan>> {
  let mut plans = Vec::new();
  let mut added: HashSet<String> = HashSet::new();

  for (field, leaf) in leaves(doc) {
    if let Err(e) = path::check_field(&field) {
      warn!(field = %field, error = %e, "skipping field");
      continue;
    }

    let existing = mappings.get(&field);
    if existing.is_none() {
      let folded = field.to_ascii_lowercase();
      let taken = mappings
        .keys()
        .any(|k| k.eq_ignore_ascii_case(&field))
        || added.contains(&folded);
      if taken {
        warn!(field = %field, "skipping field that differs from a mapped field only by case");
        continue;
      }
      added.insert(folded);
    }

    if let Some(p) = reconcile(&field, existing, leaf, indexed)? {
      plans.push(p);
    }
  }

  Ok(plans)
}

// ─── DDL ─────────────────────────────────────────────────────────────────────

pub fn add_column_sql(table: &str, field: &str, leaf_sql: &str) -> String {
  format!(
    "ALTER TABLE {table} ADD COLUMN {} {leaf_sql} AS (json_extract(_source, {}))",
    path::quote_ident(field),
    path::json_path(field),
  )
}

pub fn create_index_sql(table: &str, field: &str) -> String {
  format!(
    "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
    path::index_name(table, field),
    path::quote_ident(field),
  )
}

pub fn drop_index_sql(table: &str, field: &str) -> String {
  format!("DROP INDEX IF EXISTS {}", path::index_name(table, field))
}

/// Persist and apply `plans` within `tx`: upsert each mapping row, then add
/// the generated column and create or drop its index.
pub fn apply(tx: &Transaction<'_>, table: &str, plans: &[Plan]) -> rusqlite::Result<()> {
  for plan in plans {
    tx.execute(
      "INSERT INTO mappings (field, jsType, sqlType, indexed) VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT(field) DO UPDATE SET
         jsType  = excluded.jsType,
         sqlType = excluded.sqlType,
         indexed = excluded.indexed",
      rusqlite::params![
        plan.field,
        plan.after.js_type.as_str(),
        plan.after.sql_type.as_str(),
        plan.after.indexed,
      ],
    )?;

    if plan.is_promotion() && !column_exists(tx, table, &plan.field)? {
      tx.execute_batch(&add_column_sql(table, &plan.field, plan.after.sql_type.as_str()))?;
    }

    match plan.index_change() {
      Some(true) => tx.execute_batch(&create_index_sql(table, &plan.field))?,
      Some(false) => tx.execute_batch(&drop_index_sql(table, &plan.field))?,
      None => {}
    }
  }
  Ok(())
}

fn column_exists(tx: &Transaction<'_>, table: &str, field: &str) -> rusqlite::Result<bool> {
  Ok(
    tx.query_row(
      "SELECT 1 FROM pragma_table_xinfo(?1) WHERE name = ?2",
      rusqlite::params![table, field],
      |_| Ok(()),
    )
    .optional()?
    .is_some(),
  )
}
