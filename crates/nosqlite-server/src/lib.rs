//! Runtime pieces of the `nosqlite` binary: configuration, startup index
//! seeding, the ingestion loop and the stdin bridge.
//!
//! The MQTT broker itself stays outside the process. Messages arrive either
//! as `topic payload` lines on stdin (the output of `mosquitto_sub -v`) or
//! through the HTTP publish endpoint, and both feed one bounded queue.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use nosqlite_core::{
  document::{Envelope, Message, envelope_shape},
  store::DocumentStore,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::{
  io::{AsyncBufRead, AsyncBufReadExt},
  sync::{broadcast, mpsc},
};
use tracing::{debug, info, warn};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `NOSQLITE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Fields given a secondary index at startup.
  pub indexed_fields:   Vec<String>,
  pub ingest_stdin:     bool,
  pub channel_capacity: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8088,
      store_path:       PathBuf::from("telemetry.sqlite"),
      indexed_fields:   vec!["topic".to_string(), "msts".to_string()],
      ingest_stdin:     false,
      channel_capacity: 1024,
    }
  }
}

// ─── Startup indexes ──────────────────────────────────────────────────────────

/// Index each of `fields`.
///
/// Envelope fields are seeded with their envelope types, so they exist even
/// on an empty store. Any other field must already be mapped; unmapped ones
/// are skipped with a warning since their type is not yet known.
pub async fn apply_indexes<S: DocumentStore>(store: &S, fields: &[String]) -> Result<(), S::Error> {
  let envelope = envelope_shape();
  let shape: Map<String, Value> = envelope
    .as_object()
    .into_iter()
    .flatten()
    .filter(|(k, _)| fields.contains(k))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();
  let seeded: Vec<String> = shape.keys().cloned().collect();
  if !shape.is_empty() {
    store.seed(Value::Object(shape), true).await?;
  }

  let mappings = store.mappings().await;
  for field in fields.iter().filter(|f| !seeded.contains(f)) {
    if mappings.contains_key(field) {
      store.set_indexed(field.clone(), true).await?;
    } else {
      warn!(%field, "not indexing unmapped field");
    }
  }
  Ok(())
}

// ─── Ingestion ────────────────────────────────────────────────────────────────

/// Consume `rx` until every sender is gone.
///
/// Each message is stamped with the current time and indexed. Failures are
/// logged and the loop moves on; successes are fanned out on `live`.
pub async fn ingest<S: DocumentStore>(
  store: Arc<S>,
  mut rx: mpsc::Receiver<Message>,
  live: broadcast::Sender<Envelope>,
) {
  while let Some(message) = rx.recv().await {
    let envelope = message.stamp(Utc::now().timestamp_millis());
    match store.index(envelope.to_document()).await {
      Ok(()) => {
        debug!(topic = %envelope.topic, msts = envelope.msts, "indexed message");
        // No subscribers is not an error.
        let _ = live.send(envelope);
      }
      Err(e) => warn!(topic = %envelope.topic, error = %e, "failed to index message"),
    }
  }
  info!("ingestion queue closed");
}

/// Parse one `mosquitto_sub -v` line: the topic, a single space, then the
/// raw payload.
pub fn parse_line(line: &str) -> Option<Message> {
  let (topic, payload) = line.split_once(' ')?;
  if topic.is_empty() {
    return None;
  }
  Some(Message::from_raw(topic, payload.as_bytes()))
}

/// Forward every line of `input` to the ingestion queue. Returns at EOF or
/// when the queue closes.
pub async fn read_lines<R>(input: R, tx: mpsc::Sender<Message>) -> std::io::Result<()>
where
  R: AsyncBufRead + Unpin,
{
  let mut lines = input.lines();
  while let Some(line) = lines.next_line().await? {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
      continue;
    }
    let Some(message) = parse_line(line) else {
      warn!(%line, "skipping line without `topic payload` shape");
      continue;
    };
    if tx.send(message).await.is_err() {
      break;
    }
  }
  info!("line source finished");
  Ok(())
}
