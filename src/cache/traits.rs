//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::ResourceType;

/// Values the cache manager can store: anything that remembers when it was
/// fetched from upstream, so freshness can be judged on read.
pub trait Expiring {
  fn fetched_at(&self) -> DateTime<Utc>;
}

/// The complete dataset of one resource type for one owner.
///
/// A new fetch replaces the whole collection; items are never merged or
/// edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCollection<T> {
  pub owner_id: String,
  pub resource_type: ResourceType,
  pub items: Vec<T>,
  pub fetched_at: DateTime<Utc>,
}

impl<T> CachedCollection<T> {
  pub fn new(owner_id: impl Into<String>, resource_type: ResourceType, items: Vec<T>) -> Self {
    Self {
      owner_id: owner_id.into(),
      resource_type,
      items,
      fetched_at: Utc::now(),
    }
  }
}

impl<T> Expiring for CachedCollection<T> {
  fn fetched_at(&self) -> DateTime<Utc> {
    self.fetched_at
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from upstream (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data within its TTL.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Create a cache result for an expired copy served because the refresh failed.
  pub fn stale(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Stale,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
  /// Fresh data from upstream
  Network,
  /// Data from cache, still within its TTL
  Cache,
  /// Expired data from cache, served because the upstream refresh failed
  Stale,
}
