//! `citecap`, the citation capture worker.
//!
//! Reads `citecap.toml` (or the path given with `--config`) and either
//! reconciles a change feed or serves the read API.
//!
//! # Usage
//!
//! ```
//! citecap ingest --input changes.ndjson
//! producer | citecap ingest --concurrency 4
//! citecap serve
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use citecap_store_sqlite::SqliteStore;
use citecap_worker::{Pipeline, WorkerConfig, ingest};
use clap::{Parser, Subcommand};
use tokio::{
  fs::File,
  io::{self, BufReader},
  net::TcpListener,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Citation capture worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "citecap.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Reconcile a newline-delimited JSON feed of change records.
  Ingest {
    /// Feed file. Reads stdin when omitted.
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Records processed concurrently.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
  },

  /// Serve the read-only JSON API.
  Serve,
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
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let cfg = WorkerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command {
    Command::Ingest { input, concurrency } => {
      let webhook = cfg
        .webhook_client()
        .context("failed to build webhook client")?;
      if webhook.is_none() {
        tracing::warn!("webhook disabled; relationship events will not be sent");
      }
      let pipeline = Pipeline::new(store, webhook, cfg.policy());

      let summary = match input {
        Some(path) => {
          let file = File::open(&path)
            .await
            .with_context(|| format!("failed to open feed {path:?}"))?;
          ingest(BufReader::new(file), &pipeline, concurrency).await
        }
        None => ingest(BufReader::new(io::stdin()), &pipeline, concurrency).await,
      }
      .context("failed to read feed")?;

      println!("{}", serde_json::to_string(&summary)?);
    }

    Command::Serve => {
      let app = axum::Router::new().nest("/api", citecap_api::api_router(store));
      let address = format!("{}:{}", cfg.api.host, cfg.api.port);

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }
  }

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
