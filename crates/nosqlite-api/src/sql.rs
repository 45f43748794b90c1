//! Handler for `POST /sql`: the ad-hoc SQL passthrough.
//!
//! Body: `{"sql": "SELECT ...", "params": {":name": value}}`. Values are
//! bound, never spliced. Statements that would write (DML, DDL, writing
//! pragmas) are refused with 400.

use axum::{Json, extract::State};
use nosqlite_core::{
  query::{RawQuery, Row},
  store::DocumentStore,
};

use crate::{AppState, error::ApiError};

/// `POST /sql`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RawQuery>,
) -> Result<Json<Vec<Row>>, ApiError>
where
  S: DocumentStore,
{
  let rows = state
    .store
    .read(body.sql, body.params)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}
