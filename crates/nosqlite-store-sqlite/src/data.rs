//! The query façade: structured telemetry queries over the document table.
//!
//! All four queries rely on the envelope columns `topic` and `msts`, which
//! are promoted on first use if no document has brought them in yet.

use chrono::Utc;
use nosqlite_core::{
  document::{MSTS_FIELD, StoredDocument, TOPIC_FIELD, envelope_shape},
  mapping::{LeafType, reconcile},
  path,
  query::{Params, SeriesPoint, SeriesQuery, TopicEntry},
  store::DocumentStore,
};
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value, json};

use crate::{
  Error, Result, SqliteStore,
  encode::from_sql,
  schema::DATA_TABLE,
  store::bind,
};

impl SqliteStore {
  /// Make sure `topic` and `msts` are mapped with usable types. Missing ones
  /// are promoted without touching index flags; those follow the configured
  /// startup indexes or an explicit `set_indexed`.
  async fn ensure_envelope(&self) -> Result<()> {
    let mut missing = false;
    for (field, leaf) in [(TOPIC_FIELD, LeafType::Text), (MSTS_FIELD, LeafType::Integer)] {
      match self.registry.get(field).await {
        Some(mapping) => {
          if reconcile(field, Some(&mapping), leaf, None).is_err() {
            return Err(Error::Envelope { field, mapping });
          }
        }
        None => missing = true,
      }
    }
    if !missing {
      return Ok(());
    }

    let shape = envelope_shape();
    let Value::Object(object) = &shape else {
      return Err(Error::NotAnObject);
    };
    self.registry.evolve(object, None).await?;
    Ok(())
  }

  /// Time-bucketed aggregate of `q.fields` for one topic, oldest bucket
  /// first. Buckets without rows are omitted.
  pub async fn series(&self, q: SeriesQuery) -> Result<Vec<SeriesPoint>> {
    q.validate()?;
    self.ensure_envelope().await?;

    for field in &q.fields {
      match self.registry.get(field).await {
        Some(m) if m.sql_type.is_numeric() => {}
        _ => return Err(Error::UnknownField(field.clone())),
      }
    }

    let function = q.metric.sql_function();
    let aggregates = q
      .fields
      .iter()
      .map(|f| format!("{function}({})", path::quote_ident(f)))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT ({MSTS_FIELD} / :interval) * :interval AS time, {aggregates}
       FROM {DATA_TABLE}
       WHERE {TOPIC_FIELD} = :topic AND {MSTS_FIELD} >= :start AND {MSTS_FIELD} <= :end
       GROUP BY 1
       ORDER BY 1"
    );

    let (start, end) = q.range(Utc::now().timestamp_millis());
    let named = vec![
      (":interval".to_owned(), SqlValue::Integer(q.interval_ms())),
      (":topic".to_owned(), SqlValue::Text(q.topic.clone())),
      (":start".to_owned(), SqlValue::Integer(start)),
      (":end".to_owned(), SqlValue::Integer(end)),
    ];
    let fields = q.fields;

    let points = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let points = stmt
          .query_map(bind(&named).as_slice(), |row| {
            let mut values = Map::new();
            for (i, field) in fields.iter().enumerate() {
              values.insert(field.clone(), from_sql(row.get_ref(i + 1)?));
            }
            Ok(SeriesPoint { time: row.get(0)?, values })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
      })
      .await?;
    Ok(points)
  }

  /// Distinct topics, optionally restricted by a SQL `LIKE` pattern.
  pub async fn topics(&self, pattern: Option<String>) -> Result<Vec<TopicEntry>> {
    self.ensure_envelope().await?;

    let mut sql = format!("SELECT DISTINCT {TOPIC_FIELD} FROM {DATA_TABLE} WHERE {TOPIC_FIELD} IS NOT NULL");
    let mut params = Params::new();
    if let Some(p) = pattern {
      sql.push_str(&format!(" AND {TOPIC_FIELD} LIKE :match"));
      params.insert(":match".into(), Value::String(p));
    }
    sql.push_str(&format!(" ORDER BY {TOPIC_FIELD}"));

    self
      .all(sql, params)
      .await?
      .into_iter()
      .map(|mut row| {
        let topic = match row.remove(TOPIC_FIELD) {
          Some(Value::String(s)) => s,
          Some(other) => other.to_string(),
          None => String::new(),
        };
        Ok(TopicEntry { topic })
      })
      .collect()
  }

  /// For each topic, its newest document recorded after `since`.
  pub async fn stored_topics(&self, since: i64) -> Result<Vec<StoredDocument>> {
    self.ensure_envelope().await?;

    // SQLite takes bare columns from the row that produced max().
    let sql = format!(
      "SELECT rowid, _source, max({MSTS_FIELD})
       FROM {DATA_TABLE}
       WHERE {MSTS_FIELD} > :since AND {TOPIC_FIELD} IS NOT NULL
       GROUP BY {TOPIC_FIELD}
       ORDER BY {TOPIC_FIELD}"
    );
    let mut params = Params::new();
    params.insert(":since".into(), json!(since));
    self.documents(sql, params).await
  }

  /// The newest document for `topic`.
  pub async fn latest(&self, topic: &str) -> Result<StoredDocument> {
    self.ensure_envelope().await?;

    let sql = format!(
      "SELECT rowid, _source FROM {DATA_TABLE}
       WHERE {TOPIC_FIELD} = :topic
       ORDER BY {MSTS_FIELD} DESC, rowid DESC
       LIMIT 1"
    );
    let mut params = Params::new();
    params.insert(":topic".into(), json!(topic));

    self
      .documents(sql, params)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| Error::NotFound(format!("no documents for topic {topic:?}")))
  }
}
