//! JSON HTTP API for the NoSqlite telemetry store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`nosqlite_core::store::DocumentStore`]: raw SQL and structured data
//! queries, mapping introspection, a publish endpoint feeding the ingestion
//! queue, and a WebSocket bridge replaying ingested messages live.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", nosqlite_api::api_router(state))
//! ```

pub mod data;
pub mod documents;
pub mod error;
pub mod live;
pub mod mappings;
pub mod publish;
pub mod sql;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use nosqlite_core::{
  document::{Envelope, Message},
  store::DocumentStore,
};
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S: DocumentStore> {
  pub store:  Arc<S>,
  /// Inbound queue consumed by the ingestion loop.
  pub ingest: mpsc::Sender<Message>,
  /// Every successfully indexed message, for the live bridge.
  pub live:   broadcast::Sender<Envelope>,
}

impl<S: DocumentStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      ingest: self.ingest.clone(),
      live:   self.live.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: DocumentStore + 'static,
{
  Router::new()
    // Queries
    .route("/sql", post(sql::handler::<S>))
    .route("/data", get(data::from_params::<S>).post(data::from_body::<S>))
    // Mappings
    .route("/mappings", get(mappings::list::<S>))
    .route("/mappings/{field}/indexed", put(mappings::set_indexed::<S>))
    // Documents
    .route("/documents", get(documents::list::<S>))
    .route("/documents/count", get(documents::count::<S>))
    .route("/documents/{id}", put(documents::update::<S>))
    // Ingestion and live bridge
    .route("/publish/{*topic}", post(publish::handler::<S>))
    .route("/ws", get(live::handler::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
