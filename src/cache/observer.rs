//! Cache hit/miss reporting.
//!
//! The point of the single-cache strategy is fewer upstream calls, so every
//! lookup outcome is reported and exposed on the status endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
  /// Fresh entry found on first read
  Hit,
  /// Entry fetched from upstream and stored
  Miss,
  /// Another request populated the entry while this one waited
  Coalesced,
  /// Refresh failed, expired copy served instead
  Stale,
  /// Refresh failed and nothing could be served
  FetchFailed,
}

/// Hook receiving every lookup outcome.
pub trait CacheObserver: Send + Sync {
  fn record(&self, key: &str, event: CacheEvent);
}

/// Default observer: atomic counters plus a debug event per lookup.
#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
  coalesced: AtomicU64,
  stale_served: AtomicU64,
  fetch_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
  pub hits: u64,
  pub misses: u64,
  pub coalesced: u64,
  pub stale_served: u64,
  pub fetch_errors: u64,
}

impl CacheStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn snapshot(&self) -> CacheStatsSnapshot {
    CacheStatsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      coalesced: self.coalesced.load(Ordering::Relaxed),
      stale_served: self.stale_served.load(Ordering::Relaxed),
      fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
    }
  }
}

impl CacheObserver for CacheStats {
  fn record(&self, key: &str, event: CacheEvent) {
    let counter = match event {
      CacheEvent::Hit => &self.hits,
      CacheEvent::Miss => &self.misses,
      CacheEvent::Coalesced => &self.coalesced,
      CacheEvent::Stale => {
        // A stale serve is always preceded by a failed fetch
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        &self.stale_served
      }
      CacheEvent::FetchFailed => &self.fetch_errors,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    debug!(key, event = ?event, "cache lookup");
  }
}
