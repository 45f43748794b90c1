use std::{sync::Arc, time::Duration};

use axum::{
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
  response::Response,
};
use futures_util::StreamExt as _;
use nosqlite_core::{
  document::{Envelope, Message},
  store::DocumentStore,
};
use nosqlite_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tokio::{
  sync::{broadcast, mpsc},
  time::timeout,
};
use tokio_tungstenite::connect_async;
use tower::ServiceExt as _;

use crate::{AppState, api_router};

struct Harness {
  state:  AppState<SqliteStore>,
  ingest: mpsc::Receiver<Message>,
}

async fn harness() -> Harness {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let (ingest_tx, ingest) = mpsc::channel(8);
  let (live, _) = broadcast::channel(8);
  Harness {
    state: AppState { store: Arc::new(store), ingest: ingest_tx, live },
    ingest,
  }
}

async fn oneshot(
  state:  &AppState<SqliteStore>,
  method: &str,
  uri:    &str,
  body:   Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  api_router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn ingest(state: &AppState<SqliteStore>, topic: &str, msts: i64, payload: Value) {
  let doc = Message::new(topic, payload).stamp(msts).to_document();
  state.store.index(doc).await.unwrap();
}

// ── /sql ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sql_passthrough_binds_params() {
  let h = harness().await;
  let resp = oneshot(
    &h.state,
    "POST",
    "/sql",
    Some(json!({ "sql": "SELECT :n * 2 AS twice", "params": { "n": 21 } })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!([{ "twice": 42 }]));
}

#[tokio::test]
async fn sql_syntax_error_is_bad_request() {
  let h = harness().await;
  let resp = oneshot(&h.state, "POST", "/sql", Some(json!({ "sql": "SELEC nope" }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn sql_refuses_writing_statements() {
  let h = harness().await;
  ingest(&h.state, "t", 0, json!({ "v": 1 })).await;

  let writes = [
    r#"ALTER TABLE data DROP COLUMN "payload.v""#,
    "DELETE FROM mappings",
    "DELETE FROM data",
  ];
  for sql in writes {
    let resp = oneshot(&h.state, "POST", "/sql", Some(json!({ "sql": sql }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{sql}");
  }

  let resp = oneshot(&h.state, "GET", "/mappings", None).await;
  assert!(json_body(resp).await.get("payload.v").is_some());

  let resp = oneshot(
    &h.state,
    "GET",
    "/data?q=series&topic=t&fields=payload.v&interval=1",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, json!([{ "time": 0, "payload.v": 1.0 }]));
}

// ── /data ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn data_series_via_post_and_get() {
  let h = harness().await;
  ingest(&h.state, "tele/plug", 0, json!({ "power": 10 })).await;
  ingest(&h.state, "tele/plug", 30_000, json!({ "power": 20 })).await;
  ingest(&h.state, "tele/plug", 60_000, json!({ "power": 40 })).await;

  let expected = json!([
    { "time": 0, "payload.power": 15.0 },
    { "time": 60_000, "payload.power": 40.0 },
  ]);

  let resp = oneshot(
    &h.state,
    "POST",
    "/data",
    Some(json!({
      "q": "series",
      "topic": "tele/plug",
      "fields": ["payload.power"],
      "interval": 1,
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, expected);

  let resp = oneshot(
    &h.state,
    "GET",
    "/data?q=series&topic=tele%2Fplug&fields=payload.power&interval=1",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, expected);
}

#[tokio::test]
async fn data_series_on_unmapped_field_is_bad_request() {
  let h = harness().await;
  let resp = oneshot(
    &h.state,
    "GET",
    "/data?q=series&topic=t&fields=payload.nope&interval=1",
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn data_get_missing_parameter_is_bad_request() {
  let h = harness().await;
  let resp = oneshot(&h.state, "GET", "/data?q=latest", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = oneshot(&h.state, "GET", "/data?q=everything", None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn data_topics_and_latest() {
  let h = harness().await;
  ingest(&h.state, "tele/a", 1, json!({ "v": 1 })).await;
  ingest(&h.state, "tele/a", 5, json!({ "v": 2 })).await;
  ingest(&h.state, "stat/b", 3, json!("ON")).await;

  let resp = oneshot(&h.state, "GET", "/data?q=topics&match=tele%2F%25", None).await;
  assert_eq!(json_body(resp).await, json!([{ "topic": "tele/a" }]));

  let resp = oneshot(&h.state, "POST", "/data", Some(json!({ "q": "latest", "topic": "tele/a" }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["payload"], json!({ "v": 2 }));
}

#[tokio::test]
async fn data_latest_without_documents_is_not_found() {
  let h = harness().await;
  let resp = oneshot(&h.state, "GET", "/data?q=latest&topic=nowhere", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── /mappings ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn mappings_list_and_toggle_index() {
  let h = harness().await;
  ingest(&h.state, "t", 1, json!({ "temp": 21.5 })).await;

  let resp = oneshot(&h.state, "GET", "/mappings", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(
    body["payload.temp"],
    json!({ "jsType": "number", "sqlType": "REAL", "indexed": false })
  );

  let resp = oneshot(
    &h.state,
    "PUT",
    "/mappings/payload.temp/indexed",
    Some(json!({ "indexed": true })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["indexed"], json!(true));
  assert!(h.state.store.mappings().await["payload.temp"].indexed);
}

#[tokio::test]
async fn mappings_toggle_unknown_field_is_not_found() {
  let h = harness().await;
  let resp = oneshot(
    &h.state,
    "PUT",
    "/mappings/payload.ghost/indexed",
    Some(json!({ "indexed": true })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── /documents ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn documents_list_newest_first_with_limit() {
  let h = harness().await;
  for i in 0..3 {
    ingest(&h.state, "t", i, json!({ "n": i })).await;
  }
  ingest(&h.state, "other", 9, json!({ "n": 9 })).await;

  let resp = oneshot(&h.state, "GET", "/documents?topic=t&limit=2", None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  let ns: Vec<_> = body.as_array().unwrap().iter().map(|d| d["payload"]["n"].clone()).collect();
  assert_eq!(ns, vec![json!(2), json!(1)]);

  let resp = oneshot(&h.state, "GET", "/documents/count", None).await;
  assert_eq!(json_body(resp).await, json!({ "count": 4 }));
}

#[tokio::test]
async fn document_update_is_not_implemented() {
  let h = harness().await;
  let resp = oneshot(&h.state, "PUT", "/documents/1", Some(json!({ "a": 1 }))).await;
  assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
}

// ── /publish ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_enqueues_message() {
  let mut h = harness().await;
  let req = Request::builder()
    .method("POST")
    .uri("/publish/tele/plug/SENSOR")
    .body(Body::from(r#"{"ENERGY":{"Power":7}}"#))
    .unwrap();
  let resp = api_router(h.state.clone()).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::ACCEPTED);

  let message = h.ingest.recv().await.unwrap();
  assert_eq!(message.topic, "tele/plug/SENSOR");
  assert_eq!(message.payload, json!({ "ENERGY": { "Power": 7 } }));
}

#[tokio::test]
async fn publish_with_closed_queue_is_unavailable() {
  let h = harness().await;
  let Harness { state, ingest } = h;
  drop(ingest);
  let resp = oneshot(&state, "POST", "/publish/t", Some(json!(1))).await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ── /ws ─────────────────────────────────────────────────────────────────────

async fn serve(state: AppState<SqliteStore>) -> std::net::SocketAddr {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, api_router(state)).await.unwrap() });
  addr
}

async fn wait_for_receivers(live: &broadcast::Sender<Envelope>, n: usize) {
  for _ in 0..100 {
    if live.receiver_count() == n {
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("expected {n} live receivers, found {}", live.receiver_count());
}

#[tokio::test]
async fn live_bridge_forwards_matching_envelopes() {
  let h = harness().await;
  let live = h.state.live.clone();
  let addr = serve(h.state.clone()).await;

  let (mut ws, _) = connect_async(format!("ws://{addr}/ws?filter=tele/%2B/SENSOR"))
    .await
    .unwrap();
  wait_for_receivers(&live, 1).await;

  live.send(Message::new("stat/plug/POWER", json!("ON")).stamp(1)).unwrap();
  live.send(Message::new("tele/plug/SENSOR", json!({ "Power": 5 })).stamp(2)).unwrap();

  let frame = timeout(Duration::from_secs(5), ws.next()).await.unwrap().unwrap().unwrap();
  let body: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
  assert_eq!(
    body,
    json!({ "topic": "tele/plug/SENSOR", "msts": 2, "payload": { "Power": 5 } })
  );

  // Nothing else is pending: the unmatched envelope was never sent.
  assert!(timeout(Duration::from_millis(100), ws.next()).await.is_err());
}

#[tokio::test]
async fn live_bridge_releases_receiver_on_disconnect() {
  let h = harness().await;
  let live = h.state.live.clone();
  let addr = serve(h.state.clone()).await;

  let (mut ws, _) = connect_async(format!("ws://{addr}/ws?filter=nothing/%2B")).await.unwrap();
  wait_for_receivers(&live, 1).await;

  ws.close(None).await.unwrap();
  drop(ws);
  wait_for_receivers(&live, 0).await;
}
