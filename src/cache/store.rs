//! Cache store trait and in-process implementations.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::StoreError;

use super::key::owner_of;

/// Trait for cache storage backends.
///
/// Values are opaque bytes. `ttl` is a retention horizon: once it passes the
/// backend may drop the entry. Freshness is decided by the cache manager,
/// which asks for a retention longer than the freshness window so expired
/// copies remain available when a refresh fails.
pub trait CacheStore: Send + Sync {
  /// Get a value that is still within its retention.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

  /// Store a value, replacing any previous one.
  fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

  /// Remove one key.
  fn delete(&self, key: &str) -> Result<(), StoreError>;

  /// Remove every key belonging to an owner. Returns how many were removed.
  fn delete_owner(&self, owner_id: &str) -> Result<usize, StoreError>;

  /// Remove everything.
  fn clear(&self) -> Result<(), StoreError>;

  /// Drop entries past their retention. Returns how many were removed.
  fn purge_expired(&self) -> Result<usize, StoreError> {
    Ok(0)
  }

  /// Backend name reported by the cache status endpoint.
  fn kind(&self) -> &'static str;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStore;

impl CacheStore for NoopStore {
  fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), StoreError> {
    Ok(()) // Discard
  }

  fn delete(&self, _key: &str) -> Result<(), StoreError> {
    Ok(())
  }

  fn delete_owner(&self, _owner_id: &str) -> Result<usize, StoreError> {
    Ok(0)
  }

  fn clear(&self) -> Result<(), StoreError> {
    Ok(())
  }

  fn kind(&self) -> &'static str {
    "null"
  }
}

struct MemoryEntry {
  value: Vec<u8>,
  expires_at: Instant,
}

impl MemoryEntry {
  fn is_expired(&self, now: Instant) -> bool {
    now >= self.expires_at
  }
}

/// In-process map. Entries past their retention are dropped lazily on read
/// and in bulk by `purge_expired`.
#[derive(Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.read().map(|e| e.len()).unwrap_or(0)
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    let now = Instant::now();
    {
      let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
      match entries.get(key) {
        Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
        Some(_) => {}
        None => return Ok(None),
      }
    }

    // Expired: drop it under the write lock, unless it was replaced meanwhile
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
      entries.remove(key);
    }
    Ok(None)
  }

  fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
    let expires_at = Instant::now()
      .checked_add(ttl)
      .unwrap_or_else(|| Instant::now() + Duration::from_secs(365 * 24 * 3600));
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    entries.insert(
      key.to_string(),
      MemoryEntry {
        value: value.to_vec(),
        expires_at,
      },
    );
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    entries.remove(key);
    Ok(())
  }

  fn delete_owner(&self, owner_id: &str) -> Result<usize, StoreError> {
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    let before = entries.len();
    entries.retain(|key, _| owner_of(key) != Some(owner_id));
    Ok(before - entries.len())
  }

  fn clear(&self) -> Result<(), StoreError> {
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    entries.clear();
    Ok(())
  }

  fn purge_expired(&self) -> Result<usize, StoreError> {
    let now = Instant::now();
    let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    Ok(before - entries.len())
  }

  fn kind(&self) -> &'static str {
    "simple"
  }
}
