//! HTTP API: list endpoints served from the per-user dataset cache, cache
//! administration, and login sessions.

pub mod error;
pub mod handler;
pub mod params;
pub mod session;

use std::sync::Arc;

use crate::cache::CacheStats;
use crate::config::Config;
use crate::github::CachedGithub;

pub use handler::create_router;
pub use session::SessionStore;

/// Shared state of every handler.
pub struct AppState {
  pub config: Config,
  pub github: CachedGithub,
  pub stats: Arc<CacheStats>,
  pub sessions: SessionStore,
}
