//! [`SqliteStore`], the SQLite implementation of [`DocumentStore`].

use std::{path::Path, sync::Arc};

use nosqlite_core::{
  document::StoredDocument,
  mapping::{Mapping, Mappings},
  query::{DataQuery, DataResult, Filter, Params, Row},
  store::DocumentStore,
};
use rusqlite::{ToSql, types::Value as SqlValue};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawDocument, from_sql, named_params},
  registry::MappingRegistry,
  schema::{DATA_TABLE, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A schema-inferring document store backed by a single SQLite file.
///
/// Cloning is cheap; the connection and the mapping registry are shared.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:     tokio_rusqlite::Connection,
  pub(crate) registry: Arc<MappingRegistry>,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, bootstrap the schema and replay the
  /// persisted mappings.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let registry = MappingRegistry::load(conn.clone()).await?;
    Ok(Self { conn, registry: Arc::new(registry) })
  }

  /// Run `sql` (which must yield `rowid, _source` as its first two columns)
  /// and parse every row eagerly.
  pub(crate) async fn documents(&self, sql: String, params: Params) -> Result<Vec<StoredDocument>> {
    let named = named_params(&params);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(bind(&named).as_slice(), |row| {
            Ok(RawDocument { id: row.get(0)?, source: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| Ok(StoredDocument::new(raw.id, serde_json::from_str(&raw.source)?)))
      .collect()
  }

  /// Run `sql` and return every row as a column-name map. With `read_only`
  /// set, a statement SQLite reports as writing is refused before it runs.
  async fn rows(&self, sql: String, params: Params, read_only: bool) -> Result<Vec<Row>> {
    let named = named_params(&params);
    let text = sql.clone();

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        if read_only && !stmt.readonly() {
          return Ok(None);
        }
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
        let rows = stmt
          .query_map(bind(&named).as_slice(), |row| {
            let mut out = Map::new();
            for (i, name) in columns.iter().enumerate() {
              out.insert(name.clone(), from_sql(row.get_ref(i)?));
            }
            Ok(out)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    rows.ok_or_else(|| Error::ReadOnly(text))
  }
}

/// Borrow named parameters in the shape rusqlite binds.
pub(crate) fn bind(named: &[(String, SqlValue)]) -> Vec<(&str, &dyn ToSql)> {
  named
    .iter()
    .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
    .collect()
}

fn where_clause(filter: &Filter) -> String {
  filter
    .predicate
    .as_deref()
    .map(|p| format!(" WHERE {p}"))
    .unwrap_or_default()
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn index(&self, doc: Value) -> Result<()> {
    let Value::Object(object) = &doc else {
      return Err(Error::NotAnObject);
    };

    let changed = self.registry.evolve(object, None).await?;
    if changed > 0 {
      debug!(changed, "schema evolved before insert");
    }

    let source = serde_json::to_string(&doc)?;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO {DATA_TABLE} (_source) VALUES (?1)"),
          rusqlite::params![source],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn seed(&self, shape: Value, indexed: bool) -> Result<()> {
    let Value::Object(object) = &shape else {
      return Err(Error::NotAnObject);
    };
    self.registry.evolve(object, Some(indexed)).await?;
    Ok(())
  }

  async fn update(&self, _id: i64, _doc: Value) -> Result<()> {
    Err(Error::NotImplemented("documents are immutable; update by id is not supported"))
  }

  // ── Mappings ──────────────────────────────────────────────────────────────

  async fn mappings(&self) -> Mappings { self.registry.snapshot().await }

  async fn set_indexed(&self, field: String, indexed: bool) -> Result<Mapping> {
    self.registry.set_indexed(&field, indexed).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn select(&self, filter: Filter) -> Result<Vec<StoredDocument>> {
    let order = if filter.newest_first { "DESC" } else { "ASC" };
    let limit = filter
      .limit
      .map(|n| format!(" LIMIT {n}"))
      .unwrap_or_default();
    let sql = format!(
      "SELECT rowid, _source FROM {DATA_TABLE}{} ORDER BY rowid {order}{limit}",
      where_clause(&filter),
    );
    self.documents(sql, filter.params).await
  }

  async fn count(&self, filter: Filter) -> Result<u64> {
    let sql = format!("SELECT count(_source) FROM {DATA_TABLE}{}", where_clause(&filter));
    let named = named_params(&filter.params);

    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, bind(&named).as_slice(), |row| row.get(0))?))
      .await?;
    Ok(n.unsigned_abs())
  }

  async fn all(&self, sql: String, params: Params) -> Result<Vec<Row>> {
    self.rows(sql, params, false).await
  }

  async fn read(&self, sql: String, params: Params) -> Result<Vec<Row>> {
    self.rows(sql, params, true).await
  }

  async fn query(&self, query: DataQuery) -> Result<DataResult> {
    match query {
      DataQuery::Series(q) => self.series(q).await.map(DataResult::Series),
      DataQuery::Topics { pattern } => self.topics(pattern).await.map(DataResult::Topics),
      DataQuery::StoredTopics { since } => {
        self.stored_topics(since).await.map(DataResult::Documents)
      }
      DataQuery::Latest { topic } => self.latest(&topic).await.map(DataResult::Document),
    }
  }
}
