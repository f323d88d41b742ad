mod cache;
mod config;
mod error;
mod github;
mod http;
mod logging;
mod resource;
mod view;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use cache::{CacheStats, CacheStore, DatasetCache, MemoryStore, NoopStore, SqliteStore};
use config::{CacheBackend, CacheConfig, Config};
use github::{CachedGithub, GithubClient};
use http::{AppState, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "ghlist")]
#[command(about = "GitHub listing proxy that caches one full dataset per user and resource type")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ghlist/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Address to listen on, e.g. 127.0.0.1:5000
  #[arg(short, long)]
  listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override listen address if specified on command line
  if let Some(listen) = args.listen {
    config.server.listen = listen;
  }

  let _log_guard = logging::init(&config.logging)?;

  let store = open_store(&config.cache)?;
  tracing::info!(backend = store.kind(), "cache store ready");

  let stats = Arc::new(CacheStats::new());
  let datasets = DatasetCache::new(store, stats.clone())
    .with_stale_retention(Duration::from_secs(config.cache.stale_retention));

  let client = GithubClient::new(&config.github)?;
  let github = CachedGithub::new(
    Arc::new(client),
    datasets,
    config.cache.clone(),
    config.github.min_rate_limit_remaining,
  );

  let listen_addr: std::net::SocketAddr = config
    .server
    .listen
    .parse()
    .map_err(|e| eyre!("Invalid listen address {}: {}", config.server.listen, e))?;

  let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl));
  let purge_interval = Duration::from_secs(config.cache.purge_interval);
  let state = Arc::new(AppState {
    config,
    github,
    stats,
    sessions,
  });
  spawn_purge_task(state.clone(), purge_interval);

  let app = http::create_router(state);

  let listener = tokio::net::TcpListener::bind(listen_addr)
    .await
    .map_err(|e| eyre!("Failed to bind HTTP listener on {}: {}", listen_addr, e))?;

  tracing::info!(%listen_addr, "HTTP server listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| eyre!("HTTP server error: {}", e))?;

  tracing::info!("ghlist shut down cleanly");
  Ok(())
}

fn open_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
  let store: Arc<dyn CacheStore> = match config.backend {
    CacheBackend::Memory => Arc::new(MemoryStore::new()),
    CacheBackend::None => Arc::new(NoopStore),
    CacheBackend::Sqlite => {
      let path = config
        .path
        .clone()
        .or_else(SqliteStore::default_path)
        .ok_or_else(|| eyre!("No cache.path configured and no data directory available"))?;
      let store = SqliteStore::open(&path)
        .map_err(|e| eyre!("Failed to open cache database {}: {}", path.display(), e))?;
      tracing::info!(path = %path.display(), "opened SQLite cache");
      Arc::new(store)
    }
  };
  Ok(store)
}

/// Periodically drop cache entries past their stale retention and expired
/// sessions.
fn spawn_purge_task(state: Arc<AppState>, every: Duration) {
  if every.is_zero() {
    return;
  }

  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    // First tick completes immediately
    ticker.tick().await;
    loop {
      ticker.tick().await;

      let sessions = state.sessions.purge_expired();
      if sessions > 0 {
        tracing::debug!(removed = sessions, "purged expired sessions");
      }

      let cache = state.github.cache().clone();
      match tokio::task::spawn_blocking(move || cache.purge_expired()).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired cache entries"),
        Err(e) => tracing::warn!(error = %e, "cache purge task failed"),
      }
    }
  });
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => tracing::info!("received SIGINT"),
    () = terminate => tracing::info!("received SIGTERM"),
  }
}
