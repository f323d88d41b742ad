use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{GithubConfig, MaxItems};
use crate::error::UpstreamError;
use crate::resource::ResourceType;

use super::api_types::{
  ApiGist, ApiIssue, ApiPullRequestDetail, ApiRateLimitResponse, ApiRepository, ApiUser,
  ApiViewer,
};
use super::fetcher::GithubApi;
use super::rate_limit::classify_status;
use super::types::{
  Credentials, Follower, Gist, Profile, PullRequest, PullRequestDetail, RateLimitSnapshot,
  Repository, Viewer,
};

/// Pull request detail requests in flight at once
const DETAIL_CONCURRENCY: usize = 4;

/// GitHub REST API client
#[derive(Clone)]
pub struct GithubClient {
  http: reqwest::Client,
  base: Url,
  per_page: u32,
  detail_limit: usize,
  max_items: MaxItems,
}

impl GithubClient {
  pub fn new(config: &GithubConfig) -> Result<Self> {
    let base = Url::parse(&config.api_url)
      .map_err(|e| eyre!("Invalid GitHub API URL {}: {}", config.api_url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(config.user_agent.clone())
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      per_page: config.per_page.clamp(1, 100),
      detail_limit: config.pull_request_detail_limit,
      max_items: config.max_items,
    })
  }

  /// Resolve an API path against the base URL, keeping any path prefix of
  /// the base (GitHub Enterprise serves the API under `/api/v3`).
  fn endpoint(&self, path: &str) -> Url {
    let mut url = self.base.clone();
    let joined = format!(
      "{}/{}",
      url.path().trim_end_matches('/'),
      path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
  }

  async fn get(
    &self,
    url: Url,
    creds: &Credentials,
    what: &str,
  ) -> Result<reqwest::Response, UpstreamError> {
    let response = self
      .http
      .get(url)
      .bearer_auth(creds.token())
      .header(ACCEPT, "application/vnd.github+json")
      .header("X-GitHub-Api-Version", "2022-11-28")
      .send()
      .await?;

    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      let err = classify_status(status, response.headers(), what);
      debug!(what, status = status.as_u16(), error = %err, "GitHub request rejected");
      Err(err)
    }
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    creds: &Credentials,
  ) -> Result<T, UpstreamError> {
    let response = self.get(self.endpoint(path), creds, path).await?;
    Ok(response.json::<T>().await?)
  }

  /// Fetch every page of a list endpoint, converting each upstream item with
  /// `convert` (items mapping to `None` are skipped), until a short page, a
  /// response without a next link, or `cap` converted items.
  async fn get_all<A, T>(
    &self,
    path: &str,
    query: &[(&str, &str)],
    creds: &Credentials,
    cap: usize,
    convert: fn(A) -> Option<T>,
  ) -> Result<Vec<T>, UpstreamError>
  where
    A: DeserializeOwned,
  {
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
      let mut url = self.endpoint(path);
      {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
          pairs.append_pair(key, value);
        }
        pairs.append_pair("per_page", &self.per_page.to_string());
        pairs.append_pair("page", &page.to_string());
      }

      let response = self.get(url, creds, path).await?;
      let more = has_next_page(response.headers());
      let batch: Vec<A> = response.json().await?;
      let batch_len = batch.len();
      items.extend(batch.into_iter().filter_map(convert));

      debug!(path, page, batch_len, total = items.len(), "fetched page");

      if items.len() >= cap {
        items.truncate(cap);
        info!(path, cap, "item cap reached, stopping pagination");
        break;
      }
      if batch_len < self.per_page as usize || more == Some(false) {
        break;
      }
      page += 1;
    }

    Ok(items)
  }

  async fn pull_request_detail(
    &self,
    pr: &PullRequest,
    creds: &Credentials,
  ) -> Result<Option<PullRequestDetail>, UpstreamError> {
    let Some(repo) = pr.repository.as_ref().filter(|r| !r.full_name.is_empty()) else {
      return Ok(None);
    };
    let path = format!("/repos/{}/pulls/{}", repo.full_name, pr.number);

    match self.get_json::<ApiPullRequestDetail>(&path, creds).await {
      Ok(detail) => Ok(Some(detail.into())),
      Err(e) if e.is_fatal() => Err(e),
      Err(e) => {
        warn!(pull_request = %path, error = %e, "failed to fetch pull request details, keeping summary");
        Ok(None)
      }
    }
  }

  /// Fill in line and commit counts for the first pull requests, a few at a
  /// time, keeping list order. Rate limit or auth failures abort.
  async fn enrich_pull_requests(
    &self,
    mut pulls: Vec<PullRequest>,
    creds: &Credentials,
  ) -> Result<Vec<PullRequest>, UpstreamError> {
    let limit = self.detail_limit.min(pulls.len());
    if limit == 0 {
      return Ok(pulls);
    }

    let details: Vec<Option<PullRequestDetail>> = stream::iter(pulls[..limit].iter().cloned())
      .map(|pr| async move { self.pull_request_detail(&pr, creds).await })
      .buffered(DETAIL_CONCURRENCY)
      .try_collect()
      .await?;

    let enriched = details.iter().filter(|d| d.is_some()).count();
    for (pr, detail) in pulls.iter_mut().zip(details) {
      if let Some(detail) = detail {
        pr.apply_detail(detail);
      }
    }
    debug!(enriched, requested = limit, "pull request details fetched");

    Ok(pulls)
  }
}

/// `Some(true)` when the Link header advertises a next page, `Some(false)`
/// when a Link header exists without one, `None` without a Link header.
fn has_next_page(headers: &HeaderMap) -> Option<bool> {
  let link = headers.get(LINK)?.to_str().ok()?;
  Some(
    link
      .split(',')
      .any(|part| part.split(';').skip(1).any(|p| p.trim() == "rel=\"next\"")),
  )
}

#[async_trait]
impl GithubApi for GithubClient {
  async fn viewer(&self, creds: &Credentials) -> Result<Viewer, UpstreamError> {
    let viewer: ApiViewer = self.get_json("/user", creds).await?;
    Ok(viewer.into())
  }

  async fn profile(&self, creds: &Credentials) -> Result<Profile, UpstreamError> {
    let viewer: ApiViewer = self.get_json("/user", creds).await?;
    Ok(viewer.into_profile())
  }

  async fn rate_limit(&self, creds: &Credentials) -> Result<RateLimitSnapshot, UpstreamError> {
    let response: ApiRateLimitResponse = self.get_json("/rate_limit", creds).await?;
    Ok(response.into_snapshot())
  }

  async fn repositories(&self, creds: &Credentials) -> Result<Vec<Repository>, UpstreamError> {
    self
      .get_all(
        "/user/repos",
        &[("visibility", "all"), ("sort", "updated")],
        creds,
        self.max_items.for_type(ResourceType::Repositories),
        |r: ApiRepository| Some(r.into_domain()),
      )
      .await
  }

  async fn gists(&self, creds: &Credentials) -> Result<Vec<Gist>, UpstreamError> {
    self
      .get_all(
        "/gists",
        &[],
        creds,
        self.max_items.for_type(ResourceType::Gists),
        |g: ApiGist| Some(g.into_domain()),
      )
      .await
  }

  async fn followers(&self, creds: &Credentials) -> Result<Vec<Follower>, UpstreamError> {
    self
      .get_all(
        "/user/followers",
        &[],
        creds,
        self.max_items.for_type(ResourceType::Followers),
        |u: ApiUser| Some(u.into_domain()),
      )
      .await
  }

  async fn pull_requests(&self, creds: &Credentials) -> Result<Vec<PullRequest>, UpstreamError> {
    let pulls = self
      .get_all(
        "/user/issues",
        &[
          ("filter", "all"),
          ("state", "all"),
          ("pulls", "true"),
          ("sort", "updated"),
          ("direction", "desc"),
        ],
        creds,
        self.max_items.for_type(ResourceType::PullRequests),
        ApiIssue::into_pull_request,
      )
      .await?;

    self.enrich_pull_requests(pulls, creds).await
  }
}
