use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::cache::Expiring;

/// Repository owner summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryOwner {
  pub login: String,
  #[serde(rename = "type")]
  pub owner_type: String,
}

/// Repository as listed for the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
  pub id: u64,
  pub name: String,
  pub full_name: String,
  pub description: Option<String>,
  pub private: bool,
  pub html_url: String,
  pub clone_url: Option<String>,
  pub ssh_url: Option<String>,
  pub language: Option<String>,
  pub stargazers_count: u64,
  pub watchers_count: u64,
  pub forks_count: u64,
  pub size: u64,
  pub default_branch: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
  pub pushed_at: Option<DateTime<Utc>>,
  pub archived: bool,
  pub disabled: bool,
  pub fork: bool,
  pub topics: Vec<String>,
  pub visibility: String,
  pub owner: Option<RepositoryOwner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistFile {
  pub filename: String,
  #[serde(rename = "type")]
  pub file_type: String,
  pub language: Option<String>,
  pub raw_url: Option<String>,
  pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistOwner {
  pub login: Option<String>,
  pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gist {
  pub id: String,
  pub description: Option<String>,
  pub public: bool,
  pub html_url: Option<String>,
  pub git_pull_url: Option<String>,
  pub git_push_url: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
  pub comments: u64,
  pub files: Vec<GistFile>,
  pub owner: GistOwner,
  pub truncated: bool,
  pub file_count: usize,
}

/// A user following the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follower {
  pub id: u64,
  pub login: String,
  pub avatar_url: String,
  pub html_url: String,
  #[serde(rename = "type")]
  pub account_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestUser {
  pub login: String,
  pub avatar_url: String,
  pub html_url: String,
  pub id: Option<u64>,
}

/// Repository a pull request belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRepository {
  pub name: String,
  pub full_name: String,
  pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
  pub name: String,
  pub color: Option<String>,
}

/// Pull request involving the authenticated user.
///
/// Line counts and commit counts are only known for pull requests that were
/// enriched from the detail endpoint; the rest keep zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
  pub id: u64,
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub state: String,
  pub user: Option<PullRequestUser>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
  pub closed_at: Option<DateTime<Utc>>,
  pub merged_at: Option<DateTime<Utc>>,
  pub html_url: String,
  pub repository: Option<PullRequestRepository>,
  pub draft: bool,
  pub additions: u64,
  pub deletions: u64,
  pub changed_files: u64,
  pub comments: u64,
  pub review_comments: u64,
  pub commits: u64,
  pub labels: Vec<Label>,
}

/// Extra numbers only the single pull request endpoint returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullRequestDetail {
  pub additions: u64,
  pub deletions: u64,
  pub changed_files: u64,
  pub commits: u64,
  pub review_comments: u64,
  pub draft: bool,
}

impl PullRequest {
  pub fn apply_detail(&mut self, detail: PullRequestDetail) {
    self.additions = detail.additions;
    self.deletions = detail.deletions;
    self.changed_files = detail.changed_files;
    self.commits = detail.commits;
    self.review_comments = detail.review_comments;
    self.draft = detail.draft;
  }
}

/// The authenticated GitHub user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
  pub id: u64,
  pub login: String,
  pub name: Option<String>,
  pub avatar_url: Option<String>,
  pub html_url: Option<String>,
}

/// Extended profile of the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: u64,
  pub login: String,
  pub name: Option<String>,
  pub email: Option<String>,
  pub avatar_url: Option<String>,
  pub bio: Option<String>,
  pub location: Option<String>,
  pub company: Option<String>,
  pub blog: Option<String>,
  pub twitter_username: Option<String>,
  pub public_repos: u64,
  pub followers: u64,
  pub following: u64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
  pub html_url: Option<String>,
  pub fetched_at: DateTime<Utc>,
}

impl Expiring for Profile {
  fn fetched_at(&self) -> DateTime<Utc> {
    self.fetched_at
  }
}

/// One quota window of `/rate_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
  pub limit: u64,
  pub remaining: u64,
  pub used: u64,
  #[serde(rename = "reset")]
  pub reset_at: Option<DateTime<Utc>>,
}

/// API quotas as reported by `/rate_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
  pub core: RateLimitWindow,
  pub search: Option<RateLimitWindow>,
  pub fetched_at: DateTime<Utc>,
}

impl Expiring for RateLimitSnapshot {
  fn fetched_at(&self) -> DateTime<Utc> {
    self.fetched_at
  }
}

/// A GitHub access token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  token: String,
}

impl Credentials {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
    }
  }

  pub fn token(&self) -> &str {
    &self.token
  }

  /// Stable, non-reversible identifier for the token (hex SHA-256).
  pub fn fingerprint(&self) -> String {
    hex::encode(Sha256::digest(self.token.as_bytes()))
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("token", &"<redacted>")
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_credentials_debug_is_redacted() {
    let creds = Credentials::new("ghp_secret");
    let printed = format!("{:?}", creds);
    assert!(!printed.contains("ghp_secret"));
    assert!(printed.contains("redacted"));
  }

  #[test]
  fn test_fingerprint_is_stable_hex() {
    let a = Credentials::new("token-a").fingerprint();
    assert_eq!(a, Credentials::new("token-a").fingerprint());
    assert_ne!(a, Credentials::new("token-b").fingerprint());
    assert_eq!(a.len(), 64);
  }
}
