//! `GET /ws?filter=<mqtt filter>`: live bridge of ingested messages.
//!
//! Each successfully indexed envelope whose topic matches `filter` (MQTT
//! wildcards, default `#`) is sent to the client as one JSON text frame.
//! Inbound frames other than `Close` are ignored.

use axum::{
  extract::{
    Query, State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures_util::{SinkExt, StreamExt};
use nosqlite_core::{document::Envelope, store::DocumentStore, topic};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct LiveParams {
  #[serde(default = "match_all")]
  pub filter: String,
}

fn match_all() -> String { "#".to_owned() }

/// `GET /ws`
pub async fn handler<S>(
  State(state): State<crate::AppState<S>>,
  Query(params): Query<LiveParams>,
  ws: WebSocketUpgrade,
) -> Response
where
  S: DocumentStore,
{
  let rx = state.live.subscribe();
  ws.on_upgrade(move |socket| forward(socket, rx, params.filter))
}

async fn forward(socket: WebSocket, mut rx: broadcast::Receiver<Envelope>, filter: String) {
  let (mut sender, mut receiver) = socket.split();
  debug!(%filter, "live client connected");

  let mut recv_task = tokio::spawn(async move {
    while let Some(result) = receiver.next().await {
      match result {
        Ok(Message::Close(_)) | Err(_) => break,
        Ok(_) => {}
      }
    }
  });

  let mut send_task = tokio::spawn(async move {
    loop {
      let envelope = match rx.recv().await {
        Ok(e) => e,
        Err(RecvError::Lagged(skipped)) => {
          warn!(skipped, "live client lagging; messages dropped");
          continue;
        }
        Err(RecvError::Closed) => break,
      };
      if !topic::matches(&filter, &envelope.topic) {
        continue;
      }
      let text = match serde_json::to_string(&envelope) {
        Ok(t) => t,
        Err(e) => {
          warn!(error = %e, "failed to serialise envelope");
          continue;
        }
      };
      if sender.send(Message::Text(text.into())).await.is_err() {
        break;
      }
    }
    let _ = sender.close().await;
  });

  // Whichever side finishes first ends the connection; the other holds the
  // socket half or the broadcast receiver and must not outlive it.
  tokio::select! {
    _ = &mut recv_task => send_task.abort(),
    _ = &mut send_task => recv_task.abort(),
  }
  debug!("live client disconnected");
}
