//! nosqlite server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite telemetry store, starts the ingestion loop and serves the JSON
//! API over HTTP.
//!
//! # Bridging a broker
//!
//! ```sh
//! mosquitto_sub -v -t 'tele/#' | nosqlite --stdin
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use nosqlite_api::AppState;
use nosqlite_server::{ServerConfig, apply_indexes, ingest, read_lines};
use nosqlite_store_sqlite::SqliteStore;
use tokio::{
  io::BufReader,
  net::TcpListener,
  sync::{broadcast, mpsc},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Schema-inferring telemetry store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Ingest `topic payload` lines from stdin.
  #[arg(long)]
  stdin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("NOSQLITE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  apply_indexes(&store, &server_cfg.indexed_fields)
    .await
    .context("failed to apply startup indexes")?;

  let store = Arc::new(store);
  let (ingest_tx, ingest_rx) = mpsc::channel(server_cfg.channel_capacity);
  let (live_tx, _) = broadcast::channel(server_cfg.channel_capacity);

  tokio::spawn(ingest(store.clone(), ingest_rx, live_tx.clone()));

  if cli.stdin || server_cfg.ingest_stdin {
    let tx = ingest_tx.clone();
    tokio::spawn(async move {
      if let Err(e) = read_lines(BufReader::new(tokio::io::stdin()), tx).await {
        tracing::error!(error = %e, "stdin source failed");
      }
    });
  }

  let state = AppState { store, ingest: ingest_tx, live: live_tx };
  let app = nosqlite_api::api_router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
