//! Handler for `POST /publish/{*topic}`.
//!
//! Queues a message for the ingestion loop exactly as if it had arrived from
//! the broker. The body is the raw payload; non-JSON bodies are kept as a
//! JSON string.

use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
};
use nosqlite_core::{document::Message, store::DocumentStore};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

/// `POST /publish/{*topic}`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Path(topic): Path<String>,
  body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
  S: DocumentStore,
{
  if topic.is_empty() {
    return Err(ApiError::BadRequest("topic must not be empty".into()));
  }

  let message = Message::from_raw(topic.clone(), &body);
  state
    .ingest
    .send(message)
    .await
    .map_err(|_| ApiError::Unavailable("ingestion queue is closed".into()))?;

  Ok((StatusCode::ACCEPTED, Json(json!({ "queued": topic }))))
}
