//! Read-side query types: row filters, raw SQL, and the structured data
//! queries served by the query façade.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, document::StoredDocument, path};

/// Named statement parameters, e.g. `{":topic": "tele/plug"}`.
pub type Params = Map<String, Value>;

/// A raw result row, column name to value.
pub type Row = Map<String, Value>;

// ─── Row filter ──────────────────────────────────────────────────────────────

/// Restricts [`select`](crate::store::DocumentStore::select) and
/// [`count`](crate::store::DocumentStore::count).
///
/// `predicate` is trusted SQL spliced into a `WHERE` clause; values belong in
/// `params`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  pub predicate:    Option<String>,
  pub params:       Params,
  /// Return the most recently inserted rows first.
  pub newest_first: bool,
  pub limit:        Option<u32>,
}

impl Filter {
  pub fn all() -> Self { Self::default() }

  pub fn matching(predicate: impl Into<String>) -> Self {
    Self { predicate: Some(predicate.into()), ..Self::default() }
  }

  pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  pub fn newest_first(mut self) -> Self {
    self.newest_first = true;
    self
  }

  pub fn limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    self
  }
}

// ─── Raw SQL ─────────────────────────────────────────────────────────────────

/// Body of the ad-hoc SQL passthrough.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuery {
  pub sql:    String,
  #[serde(default)]
  pub params: Params,
}

// ─── Structured queries ──────────────────────────────────────────────────────

/// Aggregate applied per bucket in a [`SeriesQuery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
  #[default]
  Avg,
  Min,
  Max,
  Sum,
  Count,
}

impl Metric {
  pub fn sql_function(self) -> &'static str {
    match self {
      Metric::Avg => "avg",
      Metric::Min => "min",
      Metric::Max => "max",
      Metric::Sum => "sum",
      Metric::Count => "count",
    }
  }
}

/// Time-bucketed aggregation over one topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesQuery {
  pub topic:    String,
  pub fields:   Vec<String>,
  /// Bucket width in minutes.
  pub interval: u32,
  pub start:    Option<i64>,
  pub end:      Option<i64>,
  #[serde(default)]
  pub metric:   Metric,
}

impl SeriesQuery {
  pub fn interval_ms(&self) -> i64 { i64::from(self.interval) * 60_000 }

  /// Inclusive `(start, end)` in milliseconds; `now` fills a missing end.
  pub fn range(&self, now: i64) -> (i64, i64) {
    (self.start.unwrap_or(0), self.end.unwrap_or(now))
  }

  pub fn validate(&self) -> Result<()> {
    if self.interval == 0 {
      return Err(Error::InvalidQuery("interval must be at least one minute".into()));
    }
    if self.fields.is_empty() {
      return Err(Error::InvalidQuery("series needs at least one field".into()));
    }
    self.fields.iter().try_for_each(|f| path::check_field(f))
  }
}

/// A structured query, discriminated by `q`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "q", rename_all = "snake_case")]
pub enum DataQuery {
  Series(SeriesQuery),
  Topics {
    /// SQL `LIKE` pattern.
    #[serde(rename = "match", default)]
    pattern: Option<String>,
  },
  StoredTopics {
    since: i64,
  },
  Latest {
    topic: String,
  },
}

/// One bucket of a series: `{"time": ..., "<field>": <aggregate>, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
  pub time:   i64,
  #[serde(flatten)]
  pub values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
  pub topic: String,
}

/// Result of a [`DataQuery`]; serialises as the bare payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataResult {
  Series(Vec<SeriesPoint>),
  Topics(Vec<TopicEntry>),
  Documents(Vec<StoredDocument>),
  Document(StoredDocument),
}
