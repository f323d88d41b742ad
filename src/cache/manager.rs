//! Dataset cache manager: one cached collection per owner and resource type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::UpstreamError;
use crate::resource::ResourceType;

use super::key::{owner_of, CacheKey};
use super::observer::{CacheEvent, CacheObserver};
use super::store::CacheStore;
use super::traits::{CacheResult, CachedCollection, Expiring};

type KeyLocks = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Fetches in flight, by key. The flag is set when the key is invalidated
/// before the fetch finishes.
type PendingWrites = Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>;

/// Cache manager that sits between the request handlers and the GitHub
/// fetchers.
///
/// - Fresh entry: returned without touching upstream.
/// - Missing or expired entry: fetched once per key, even under concurrent
///   requests, and stored wholesale.
/// - Failed fetch: nothing is written; an expired copy is served if one is
///   still retained, otherwise the error is returned.
/// - Invalidated while a fetch is in flight: the fetch result goes back to
///   its caller but is not stored.
#[derive(Clone)]
pub struct DatasetCache {
  store: Arc<dyn CacheStore>,
  observer: Arc<dyn CacheObserver>,
  /// How long an entry is retained past its freshness window for
  /// stale-on-error
  stale_retention: Duration,
  inflight: KeyLocks,
  pending: PendingWrites,
}

impl DatasetCache {
  pub fn new(store: Arc<dyn CacheStore>, observer: Arc<dyn CacheObserver>) -> Self {
    Self {
      store,
      observer,
      stale_retention: Duration::from_secs(24 * 3600),
      inflight: Arc::new(Mutex::new(HashMap::new())),
      pending: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Set how long expired entries stay available for stale-on-error.
  pub fn with_stale_retention(mut self, stale_retention: Duration) -> Self {
    self.stale_retention = stale_retention;
    self
  }

  /// Backend name of the underlying store.
  pub fn backend_kind(&self) -> &'static str {
    self.store.kind()
  }

  /// Return the owner's complete collection of `resource_type`, fetching it
  /// with `fetch` when missing or older than `ttl`.
  ///
  /// `fetch` must produce the whole collection. Its future runs on a
  /// separate task, so the cache is still populated if the caller goes away.
  pub async fn get_or_fetch<T, F, Fut>(
    &self,
    owner_id: &str,
    resource_type: ResourceType,
    ttl: Duration,
    fetch: F,
  ) -> Result<CacheResult<CachedCollection<T>>, UpstreamError>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, UpstreamError>> + Send + 'static,
  {
    let key = CacheKey::dataset(resource_type, owner_id);
    let owner = owner_id.to_string();
    let fut = fetch();

    self
      .get_or_fetch_value(&key, ttl, move || async move {
        let items = fut.await?;
        Ok(CachedCollection::new(owner, resource_type, items))
      })
      .await
  }

  /// Same policy as `get_or_fetch` for any single expiring value.
  pub async fn get_or_fetch_value<V, F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    fetch: F,
  ) -> Result<CacheResult<V>, UpstreamError>
  where
    V: Expiring + Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, UpstreamError>> + Send + 'static,
  {
    let key_str = key.to_string();

    // Check cache first
    let cached = match self.read::<V>(&key_str) {
      Some(value) if is_fresh(&value, ttl) => {
        self.observer.record(&key_str, CacheEvent::Hit);
        let at = value.fetched_at();
        return Ok(CacheResult::from_cache(value, at));
      }
      other => other,
    };

    // Serialize populators of the same key
    let key_lock = self.key_lock(&key_str);
    let guard = key_lock.lock_owned().await;

    // Someone else may have refreshed the entry while we waited
    let cached = match self.read::<V>(&key_str) {
      Some(value) if is_fresh(&value, ttl) => {
        drop(guard);
        release_key(&self.inflight, &key_str);
        self.observer.record(&key_str, CacheEvent::Coalesced);
        let at = value.fetched_at();
        return Ok(CacheResult::from_cache(value, at));
      }
      Some(value) => Some(value),
      None => cached,
    };

    debug!(key = %key_str, "cache miss, fetching from upstream");
    let fut = fetch();
    let store = Arc::clone(&self.store);
    let inflight = Arc::clone(&self.inflight);
    let pending = Arc::clone(&self.pending);
    let discarded = self.track_write(&key_str);
    let retention = ttl.saturating_add(self.stale_retention);
    let task_key = key_str.clone();

    let task = tokio::spawn(async move {
      let result = fut.await;
      {
        // Invalidations flag entries under this lock, so the check and the
        // write cannot interleave with one
        let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
          Ok(_) if discarded.load(Ordering::SeqCst) => {
            debug!(key = %task_key, "invalidated during fetch, result not cached");
          }
          Ok(value) => write(store.as_ref(), &task_key, value, retention),
          Err(_) => {}
        }
        pending.remove(&task_key);
      }
      drop(guard);
      release_key(&inflight, &task_key);
      result
    });

    let result = match task.await {
      Ok(result) => result,
      Err(e) => Err(UpstreamError::Transient(format!("fetch task failed: {e}"))),
    };

    match result {
      Ok(value) => {
        self.observer.record(&key_str, CacheEvent::Miss);
        Ok(CacheResult::from_network(value))
      }
      Err(err) => match cached {
        Some(value) => {
          self.observer.record(&key_str, CacheEvent::Stale);
          let at = value.fetched_at();
          warn!(key = %key_str, error = %err, cached_at = %at, "refresh failed, serving stale cache");
          Ok(CacheResult::stale(value, at))
        }
        None => {
          self.observer.record(&key_str, CacheEvent::FetchFailed);
          warn!(key = %key_str, error = %err, "fetch failed with nothing cached");
          Err(err)
        }
      },
    }
  }

  /// Drop one owner's collection of one resource type.
  pub fn invalidate(&self, owner_id: &str, resource_type: ResourceType) {
    let key = CacheKey::dataset(resource_type, owner_id).to_string();
    self.discard_pending(|k| k == key);
    match self.store.delete(&key) {
      Ok(()) => info!(key = %key, "cache invalidated"),
      Err(e) => warn!(key = %key, error = %e, "cache invalidation failed"),
    }
  }

  /// Drop every entry of an owner (logout).
  pub fn invalidate_all(&self, owner_id: &str) {
    self.discard_pending(|k| owner_of(k) == Some(owner_id));
    match self.store.delete_owner(owner_id) {
      Ok(removed) => info!(owner_id, removed, "all cache invalidated for owner"),
      Err(e) => {
        warn!(owner_id, error = %e, "bulk invalidation failed, deleting keys one by one");
        for key in CacheKey::all_for_owner(owner_id) {
          if let Err(e) = self.store.delete(&key.to_string()) {
            warn!(key = %key, error = %e, "cache invalidation failed");
          }
        }
      }
    }
  }

  /// Administrative: empty the whole store.
  pub fn invalidate_everything(&self) {
    self.discard_pending(|_| true);
    match self.store.clear() {
      Ok(()) => info!("entire cache cleared"),
      Err(e) => warn!(error = %e, "cache clear failed"),
    }
  }

  /// Drop entries past their retention.
  pub fn purge_expired(&self) -> usize {
    match self.store.purge_expired() {
      Ok(removed) => removed,
      Err(e) => {
        warn!(error = %e, "cache purge failed");
        0
      }
    }
  }

  /// Read and decode an entry. Backend and decode failures are logged and
  /// treated as a miss.
  fn read<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
    let bytes = match self.store.get(key) {
      Ok(Some(bytes)) => bytes,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "cache get failed, treating as miss");
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "cached entry could not be decoded, treating as miss");
        None
      }
    }
  }

  /// Register a fetch about to run for `key`.
  fn track_write(&self, key: &str) -> Arc<AtomicBool> {
    let discarded = Arc::new(AtomicBool::new(false));
    self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_string(), Arc::clone(&discarded));
    discarded
  }

  /// Keep fetches in flight for matching keys from storing their result.
  fn discard_pending(&self, matches: impl Fn(&str) -> bool) {
    let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    for (key, discarded) in pending.iter().filter(|(key, _)| matches(key)) {
      discarded.store(true, Ordering::SeqCst);
      debug!(key = %key, "discarding result of in-flight fetch");
    }
  }

  fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut map = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(
      map
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
    )
  }
}

fn is_fresh<V: Expiring>(value: &V, ttl: Duration) -> bool {
  let age = Utc::now()
    .signed_duration_since(value.fetched_at())
    .to_std()
    .unwrap_or(Duration::ZERO);
  age <= ttl
}

fn write<V: Serialize>(store: &dyn CacheStore, key: &str, value: &V, retention: Duration) {
  let bytes = match serde_json::to_vec(value) {
    Ok(bytes) => bytes,
    Err(e) => {
      warn!(key, error = %e, "failed to encode cache entry");
      return;
    }
  };

  match store.set(key, &bytes, retention) {
    Ok(()) => debug!(key, bytes = bytes.len(), "cache set"),
    Err(e) => warn!(key, error = %e, "cache set failed"),
  }
}

/// Forget a key's lock once nobody else holds or waits on it.
fn release_key(inflight: &KeyLocks, key: &str) {
  let mut map = inflight.lock().unwrap_or_else(PoisonError::into_inner);
  if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
    map.remove(key);
  }
}
