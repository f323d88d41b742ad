//! In-memory GitHub used by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::UpstreamError;
use crate::resource::ResourceType;

use super::fetcher::GithubApi;
use super::listing::fixtures;
use super::types::{
  Credentials, Follower, Gist, Profile, PullRequest, RateLimitSnapshot, RateLimitWindow,
  Repository, Viewer,
};

pub struct FakeGithub {
  pub repositories: Mutex<Vec<Repository>>,
  pub gists: Mutex<Vec<Gist>>,
  pub followers: Mutex<Vec<Follower>>,
  pub pull_requests: Mutex<Vec<PullRequest>>,
  /// token -> user
  pub users: HashMap<String, Viewer>,
  pub remaining: AtomicU64,
  fail_with: Mutex<Option<UpstreamError>>,
  fetches: Mutex<HashMap<ResourceType, usize>>,
  pub rate_limit_probes: AtomicUsize,
  pub profile_requests: AtomicUsize,
}

impl FakeGithub {
  /// One user (`octocat`, id 42, token `good`) with 45 repositories and a
  /// few pull requests and followers.
  pub fn new() -> Self {
    let viewer = Viewer {
      id: 42,
      login: "octocat".to_string(),
      name: Some("The Octocat".to_string()),
      avatar_url: None,
      html_url: Some("https://github.com/octocat".to_string()),
    };
    let other = Viewer {
      id: 7,
      login: "hubot".to_string(),
      name: None,
      avatar_url: None,
      html_url: None,
    };

    Self {
      repositories: Mutex::new(
        (1..=45)
          .map(|id| fixtures::repository(id, &format!("repo-{:02}", id), Some("Rust")))
          .collect(),
      ),
      gists: Mutex::new(Vec::new()),
      followers: Mutex::new(vec![fixtures::follower(1, "alice"), fixtures::follower(2, "bob")]),
      pull_requests: Mutex::new(vec![
        fixtures::pull_request(5, "Fix login"),
        fixtures::pull_request(2, "Add docs"),
        fixtures::pull_request(8, "Refactor"),
      ]),
      users: [("good".to_string(), viewer), ("other".to_string(), other)]
        .into_iter()
        .collect(),
      remaining: AtomicU64::new(5000),
      fail_with: Mutex::new(None),
      fetches: Mutex::new(HashMap::new()),
      rate_limit_probes: AtomicUsize::new(0),
      profile_requests: AtomicUsize::new(0),
    }
  }

  /// Make every following list fetch fail with `err` (`None` to recover).
  pub fn fail_with(&self, err: Option<UpstreamError>) {
    *self.fail_with.lock().unwrap() = err;
  }

  pub fn fetch_count(&self, resource_type: ResourceType) -> usize {
    self
      .fetches
      .lock()
      .unwrap()
      .get(&resource_type)
      .copied()
      .unwrap_or(0)
  }

  fn list<T: Clone>(
    &self,
    creds: &Credentials,
    resource_type: ResourceType,
    items: &Mutex<Vec<T>>,
  ) -> Result<Vec<T>, UpstreamError> {
    *self.fetches.lock().unwrap().entry(resource_type).or_default() += 1;
    if !self.users.contains_key(creds.token()) {
      return Err(UpstreamError::Unauthorized);
    }
    if let Some(err) = self.fail_with.lock().unwrap().clone() {
      return Err(err);
    }
    Ok(items.lock().unwrap().clone())
  }
}

#[async_trait]
impl GithubApi for FakeGithub {
  async fn viewer(&self, creds: &Credentials) -> Result<Viewer, UpstreamError> {
    self
      .users
      .get(creds.token())
      .cloned()
      .ok_or(UpstreamError::Unauthorized)
  }

  async fn profile(&self, creds: &Credentials) -> Result<Profile, UpstreamError> {
    self.profile_requests.fetch_add(1, Ordering::SeqCst);
    let viewer = self.viewer(creds).await?;
    Ok(Profile {
      id: viewer.id,
      login: viewer.login,
      name: viewer.name,
      email: None,
      avatar_url: viewer.avatar_url,
      bio: Some("Mascot".to_string()),
      location: None,
      company: Some("GitHub".to_string()),
      blog: None,
      twitter_username: None,
      public_repos: 45,
      followers: 2,
      following: 0,
      created_at: None,
      updated_at: None,
      html_url: viewer.html_url,
      fetched_at: Utc::now(),
    })
  }

  async fn rate_limit(&self, _creds: &Credentials) -> Result<RateLimitSnapshot, UpstreamError> {
    self.rate_limit_probes.fetch_add(1, Ordering::SeqCst);
    let remaining = self.remaining.load(Ordering::SeqCst);
    Ok(RateLimitSnapshot {
      core: RateLimitWindow {
        limit: 5000,
        remaining,
        used: 5000u64.saturating_sub(remaining),
        reset_at: Some(Utc::now() + chrono::Duration::minutes(30)),
      },
      search: Some(RateLimitWindow {
        limit: 30,
        remaining: 30,
        used: 0,
        reset_at: Some(Utc::now() + chrono::Duration::minutes(1)),
      }),
      fetched_at: Utc::now(),
    })
  }

  async fn repositories(&self, creds: &Credentials) -> Result<Vec<Repository>, UpstreamError> {
    self.list(creds, ResourceType::Repositories, &self.repositories)
  }

  async fn gists(&self, creds: &Credentials) -> Result<Vec<Gist>, UpstreamError> {
    self.list(creds, ResourceType::Gists, &self.gists)
  }

  async fn followers(&self, creds: &Credentials) -> Result<Vec<Follower>, UpstreamError> {
    self.list(creds, ResourceType::Followers, &self.followers)
  }

  async fn pull_requests(&self, creds: &Credentials) -> Result<Vec<PullRequest>, UpstreamError> {
    self.list(creds, ResourceType::PullRequests, &self.pull_requests)
  }
}
