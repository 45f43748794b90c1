//! Handlers for `/data`, the structured query façade.
//!
//! | Method | Body / params | Notes |
//! |--------|---------------|-------|
//! | `POST` | [`DataQuery`] JSON, discriminated by `q` | |
//! | `GET`  | the same fields as query params | `fields` is comma-separated |

use axum::{
  Json,
  extract::{Query, State},
};
use nosqlite_core::{
  query::{DataQuery, DataResult, Metric, SeriesQuery},
  store::DocumentStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// `POST /data`
pub async fn from_body<S>(
  State(state): State<AppState<S>>,
  Json(query): Json<DataQuery>,
) -> Result<Json<DataResult>, ApiError>
where
  S: DocumentStore,
{
  run(&state, query).await
}

/// Flat query-string form of a [`DataQuery`].
#[derive(Debug, Deserialize, Default)]
pub struct DataParams {
  pub q:        String,
  pub topic:    Option<String>,
  /// Comma-separated field paths, e.g. `payload.temperature,payload.humidity`.
  pub fields:   Option<String>,
  pub interval: Option<u32>,
  pub start:    Option<i64>,
  pub end:      Option<i64>,
  pub metric:   Option<Metric>,
  #[serde(rename = "match")]
  pub pattern:  Option<String>,
  pub since:    Option<i64>,
}

impl TryFrom<DataParams> for DataQuery {
  type Error = ApiError;

  fn try_from(p: DataParams) -> Result<Self, ApiError> {
    let missing = |name: &str| ApiError::BadRequest(format!("{} query needs `{name}`", p.q));

    match p.q.as_str() {
      "series" => Ok(DataQuery::Series(SeriesQuery {
        topic:    p.topic.clone().ok_or_else(|| missing("topic"))?,
        fields:   p
          .fields
          .as_deref()
          .ok_or_else(|| missing("fields"))?
          .split(',')
          .map(|f| f.trim().to_owned())
          .filter(|f| !f.is_empty())
          .collect(),
        interval: p.interval.ok_or_else(|| missing("interval"))?,
        start:    p.start,
        end:      p.end,
        metric:   p.metric.unwrap_or_default(),
      })),
      "topics" => Ok(DataQuery::Topics { pattern: p.pattern.clone() }),
      "stored_topics" => Ok(DataQuery::StoredTopics { since: p.since.ok_or_else(|| missing("since"))? }),
      "latest" => Ok(DataQuery::Latest { topic: p.topic.clone().ok_or_else(|| missing("topic"))? }),
      other => Err(ApiError::BadRequest(format!("unknown query {other:?}"))),
    }
  }
}

/// `GET /data?q=<series|topics|stored_topics|latest>&...`
pub async fn from_params<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<DataParams>,
) -> Result<Json<DataResult>, ApiError>
where
  S: DocumentStore,
{
  run(&state, DataQuery::try_from(params)?).await
}

async fn run<S: DocumentStore>(
  state: &AppState<S>,
  query: DataQuery,
) -> Result<Json<DataResult>, ApiError> {
  let result = state.store.query(query).await.map_err(ApiError::store)?;
  Ok(Json(result))
}
