//! Handlers for `/documents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/documents` | Newest first; optional `?topic`, `?limit` (default 100) |
//! | `GET`  | `/documents/count` | Optional `?topic` |
//! | `PUT`  | `/documents/{id}` | Always 501: documents are immutable |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use nosqlite_core::{
  document::{StoredDocument, TOPIC_FIELD},
  query::Filter,
  store::DocumentStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Exact topic to restrict to.
  pub topic: Option<String>,
  pub limit: Option<u32>,
}

fn topic_filter(topic: Option<String>) -> Filter {
  match topic {
    // Go through the JSON rather than the promoted column, which may not exist yet.
    Some(t) => Filter::matching(format!("json_extract(_source, '$.{TOPIC_FIELD}') = :topic"))
      .bind("topic", t),
    None => Filter::all(),
  }
}

/// `GET /documents[?topic=...][&limit=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<StoredDocument>>, ApiError>
where
  S: DocumentStore,
{
  let filter = topic_filter(params.topic)
    .newest_first()
    .limit(params.limit.unwrap_or(DEFAULT_LIMIT));
  let docs = state.store.select(filter).await.map_err(ApiError::store)?;
  Ok(Json(docs))
}

/// `GET /documents/count[?topic=...]`
pub async fn count<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError>
where
  S: DocumentStore,
{
  let n = state
    .store
    .count(topic_filter(params.topic))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "count": n })))
}

/// `PUT /documents/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError>
where
  S: DocumentStore,
{
  state.store.update(id, body).await.map_err(ApiError::store)?;
  Ok(Json(json!({ "updated": id })))
}
