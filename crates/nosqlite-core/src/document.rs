//! Documents as they enter and leave the store.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

/// Envelope field holding the message topic.
pub const TOPIC_FIELD: &str = "topic";

/// Envelope field holding the ingestion timestamp in milliseconds.
pub const MSTS_FIELD: &str = "msts";

/// A representative envelope used to seed the indexed envelope columns.
pub fn envelope_shape() -> Value { json!({ TOPIC_FIELD: "", MSTS_FIELD: 0 }) }

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// A telemetry message as delivered by the MQTT bridge, not yet stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub topic:   String,
  pub payload: Value,
}

impl Message {
  pub fn new(topic: impl Into<String>, payload: Value) -> Self {
    Self { topic: topic.into(), payload }
  }

  /// Build a message from a raw payload. Payloads that are not JSON are kept
  /// as a JSON string of their (lossily decoded) text.
  pub fn from_raw(topic: impl Into<String>, raw: &[u8]) -> Self {
    let payload = serde_json::from_slice(raw)
      .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()));
    Self::new(topic, payload)
  }

  /// Attach the ingestion timestamp.
  pub fn stamp(self, msts: i64) -> Envelope {
    Envelope { topic: self.topic, msts, payload: self.payload }
  }
}

/// A stamped message; this is the shape of every ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  pub topic:   String,
  pub msts:    i64,
  pub payload: Value,
}

impl Envelope {
  pub fn to_document(&self) -> Value {
    json!({
      TOPIC_FIELD: self.topic,
      MSTS_FIELD:  self.msts,
      "payload":   self.payload,
    })
  }
}

// ─── Outbound ────────────────────────────────────────────────────────────────

/// A document read back from the store.
///
/// The row identifier is carried alongside the body rather than inside it:
/// serialising a `StoredDocument` yields exactly the stored JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
  id:   i64,
  body: Value,
}

impl StoredDocument {
  pub fn new(id: i64, body: Value) -> Self { Self { id, body } }

  /// The storage-assigned row identifier.
  pub fn id(&self) -> i64 { self.id }

  pub fn body(&self) -> &Value { &self.body }

  pub fn into_body(self) -> Value { self.body }
}

impl Serialize for StoredDocument {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.body.serialize(serializer)
  }
}
