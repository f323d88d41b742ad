//! Cached GitHub client: serves each resource type from one cached dataset
//! per user.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheResult, CachedCollection, DatasetCache};
use crate::config::CacheConfig;
use crate::error::UpstreamError;

use super::fetcher::{GithubApi, Resource};
use super::types::{Credentials, Profile, RateLimitSnapshot, Viewer};

/// GitHub client with transparent dataset caching.
///
/// Before any full fetch the remaining API quota is checked (itself cached
/// for the short TTL), so a nearly exhausted token fails fast instead of
/// burning the rest of its quota on a multi-page fetch.
#[derive(Clone)]
pub struct CachedGithub {
  api: Arc<dyn GithubApi>,
  cache: DatasetCache,
  config: CacheConfig,
  min_remaining: u64,
}

impl CachedGithub {
  pub fn new(
    api: Arc<dyn GithubApi>,
    cache: DatasetCache,
    config: CacheConfig,
    min_remaining: u64,
  ) -> Self {
    Self {
      api,
      cache,
      config,
      min_remaining,
    }
  }

  pub fn cache(&self) -> &DatasetCache {
    &self.cache
  }

  /// Resolve the user a token belongs to (not cached).
  pub async fn viewer(&self, creds: &Credentials) -> Result<Viewer, UpstreamError> {
    self.api.viewer(creds).await
  }

  /// Extended profile of the owner, cached for the medium TTL.
  pub async fn profile(
    &self,
    owner_id: &str,
    creds: &Credentials,
  ) -> Result<CacheResult<Profile>, UpstreamError> {
    let api = Arc::clone(&self.api);
    let creds = creds.clone();
    self
      .cache
      .get_or_fetch_value(
        &CacheKey::profile(owner_id),
        self.config.medium_ttl(),
        move || async move { api.profile(&creds).await },
      )
      .await
  }

  /// Core and search quotas for display, cached for the short TTL apart
  /// from the headroom probe.
  pub async fn rate_limit_report(
    &self,
    owner_id: &str,
    creds: &Credentials,
  ) -> Result<CacheResult<RateLimitSnapshot>, UpstreamError> {
    let api = Arc::clone(&self.api);
    let creds = creds.clone();
    self
      .cache
      .get_or_fetch_value(
        &CacheKey::rate_limit_report(owner_id),
        self.short_ttl(),
        move || async move { api.rate_limit(&creds).await },
      )
      .await
  }

  /// The owner's complete `T` collection, from cache when fresh.
  pub async fn load<T: Resource>(
    &self,
    owner_id: &str,
    creds: &Credentials,
  ) -> Result<CacheResult<CachedCollection<T>>, UpstreamError> {
    let ttl = self.config.ttl_for(T::TYPE);
    let this = self.clone();
    let owner = owner_id.to_string();
    let creds = creds.clone();

    self
      .cache
      .get_or_fetch(owner_id, T::TYPE, ttl, move || async move {
        this.ensure_headroom(&owner, &creds).await?;
        T::fetch_all(Arc::clone(&this.api), creds).await
      })
      .await
  }

  /// Fail with `RateLimited` when the token's remaining quota is below the
  /// configured minimum. A failing probe does not block the fetch.
  async fn ensure_headroom(&self, owner_id: &str, creds: &Credentials) -> Result<(), UpstreamError> {
    if self.min_remaining == 0 {
      return Ok(());
    }

    let api = Arc::clone(&self.api);
    let probe_creds = creds.clone();
    let probe = self
      .cache
      .get_or_fetch_value(
        &CacheKey::rate_limit(owner_id),
        self.short_ttl(),
        move || async move { api.rate_limit(&probe_creds).await },
      )
      .await;

    let core = match probe {
      Ok(result) => result.data.core,
      Err(e) => {
        warn!(owner_id, error = %e, "rate limit probe failed, proceeding with fetch");
        return Ok(());
      }
    };

    let window_open = core.reset_at.map_or(true, |reset| reset > Utc::now());
    if core.remaining < self.min_remaining && window_open {
      warn!(
        owner_id,
        remaining = core.remaining,
        minimum = self.min_remaining,
        "not enough GitHub API quota left for a full fetch"
      );
      return Err(UpstreamError::RateLimited {
        reset_at: core.reset_at,
      });
    }

    debug!(owner_id, remaining = core.remaining, "rate limit OK");
    Ok(())
  }

  fn short_ttl(&self) -> Duration {
    self.config.short_ttl()
  }
}
