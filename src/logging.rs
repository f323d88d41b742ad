//! Tracing setup: human-readable events on stderr, optionally mirrored to a
//! daily-rotated file.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "ghlist.log";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level)?;

  let (file_layer, guard) = match &config.directory {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_ansi(false).with_writer(writer);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter> {
  let directives = env.filter(|s| !s.trim().is_empty()).unwrap_or(level);
  EnvFilter::try_new(directives).map_err(|e| eyre!("Invalid log filter {:?}: {}", directives, e))
}
