//! Handlers for `/mappings` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/mappings` | Registry snapshot keyed by field path |
//! | `PUT`  | `/mappings/{field}/indexed` | Body: `{"indexed": true}` |

use axum::{
  Json,
  extract::{Path, State},
};
use nosqlite_core::{
  mapping::{Mapping, Mappings},
  path,
  store::DocumentStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// `GET /mappings`
pub async fn list<S>(State(state): State<AppState<S>>) -> Json<Mappings>
where
  S: DocumentStore,
{
  Json(state.store.mappings().await)
}

#[derive(Debug, Deserialize)]
pub struct IndexedBody {
  pub indexed: bool,
}

/// `PUT /mappings/{field}/indexed`
pub async fn set_indexed<S>(
  State(state): State<AppState<S>>,
  Path(field): Path<String>,
  Json(body): Json<IndexedBody>,
) -> Result<Json<Mapping>, ApiError>
where
  S: DocumentStore,
{
  path::check_field(&field)?;
  let mapping = state
    .store
    .set_indexed(field, body.indexed)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(mapping))
}
