//! Resource fetchers: one complete collection per resource type.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::error::UpstreamError;
use crate::resource::ResourceType;
use crate::view::Listable;

use super::types::{
  Credentials, Follower, Gist, Profile, PullRequest, RateLimitSnapshot, Repository, Viewer,
};

/// The GitHub operations the proxy needs. Every list method returns the
/// entire collection of the authenticated user, paginating internally.
#[async_trait]
pub trait GithubApi: Send + Sync {
  async fn viewer(&self, creds: &Credentials) -> Result<Viewer, UpstreamError>;

  async fn profile(&self, creds: &Credentials) -> Result<Profile, UpstreamError>;

  async fn rate_limit(&self, creds: &Credentials) -> Result<RateLimitSnapshot, UpstreamError>;

  async fn repositories(&self, creds: &Credentials) -> Result<Vec<Repository>, UpstreamError>;

  async fn gists(&self, creds: &Credentials) -> Result<Vec<Gist>, UpstreamError>;

  async fn followers(&self, creds: &Credentials) -> Result<Vec<Follower>, UpstreamError>;

  async fn pull_requests(&self, creds: &Credentials) -> Result<Vec<PullRequest>, UpstreamError>;
}

/// An item type that is listed, cached and served as one dataset.
pub trait Resource: Listable + Serialize + DeserializeOwned + Send + Sync + 'static {
  const TYPE: ResourceType;

  /// Fetch the whole collection. The returned future owns its inputs so it
  /// can outlive the request that started it.
  fn fetch_all(
    api: Arc<dyn GithubApi>,
    creds: Credentials,
  ) -> BoxFuture<'static, Result<Vec<Self>, UpstreamError>>;
}

impl Resource for Repository {
  const TYPE: ResourceType = ResourceType::Repositories;

  fn fetch_all(
    api: Arc<dyn GithubApi>,
    creds: Credentials,
  ) -> BoxFuture<'static, Result<Vec<Self>, UpstreamError>> {
    Box::pin(async move { api.repositories(&creds).await })
  }
}

impl Resource for Gist {
  const TYPE: ResourceType = ResourceType::Gists;

  fn fetch_all(
    api: Arc<dyn GithubApi>,
    creds: Credentials,
  ) -> BoxFuture<'static, Result<Vec<Self>, UpstreamError>> {
    Box::pin(async move { api.gists(&creds).await })
  }
}

impl Resource for Follower {
  const TYPE: ResourceType = ResourceType::Followers;

  fn fetch_all(
    api: Arc<dyn GithubApi>,
    creds: Credentials,
  ) -> BoxFuture<'static, Result<Vec<Self>, UpstreamError>> {
    Box::pin(async move { api.followers(&creds).await })
  }
}

impl Resource for PullRequest {
  const TYPE: ResourceType = ResourceType::PullRequests;

  fn fetch_all(
    api: Arc<dyn GithubApi>,
    creds: Credentials,
  ) -> BoxFuture<'static, Result<Vec<Self>, UpstreamError>> {
    Box::pin(async move { api.pull_requests(&creds).await })
  }
}
