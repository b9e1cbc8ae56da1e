//! Haven server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store wired to the realtime bus, starts the scheduled
//! SLA sweep, and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use haven_api::{AppState, ServerConfig};
use haven_bus::ChangeBus;
use haven_sla::SlaEngine;
use haven_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Haven safety-platform server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
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
    .add_source(config::Environment::with_prefix("HAVEN"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open the store, announcing committed writes to the bus.
  let bus = ChangeBus::new(server_cfg.bus_capacity);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_events(Arc::new(bus.clone()));

  let engine = Arc::new(SlaEngine::new(store.clone()));

  // Scheduled SLA sweep.
  let sweep_engine = Arc::clone(&engine);
  let sweep_every = Duration::from_secs(server_cfg.sweep_interval_secs.max(1));
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(sweep_every);
    loop {
      interval.tick().await;
      match sweep_engine.sweep(Utc::now()).await {
        Ok(summary) => tracing::debug!(
          checked = summary.checked,
          new_breaches = summary.new_breaches,
          "sla sweep complete"
        ),
        Err(e) => tracing::warn!(error = %e, "sla sweep failed"),
      }
    }
  });

  let state = AppState {
    store: Arc::new(store),
    bus,
    engine,
  };

  let app = haven_api::api_router(state).layer(TraceLayer::new_for_http());
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
