//! Serde-deserializable types matching GitHub REST API responses.
//!
//! These types are separate from domain types to allow lenient
//! deserialization (unknown fields ignored, missing ones defaulted) while
//! keeping domain types focused on what the listing endpoints return.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::{
  Follower, Gist, GistFile, GistOwner, Label, PullRequest, PullRequestDetail,
  Profile, PullRequestRepository, PullRequestUser, RateLimitSnapshot, RateLimitWindow, Repository,
  RepositoryOwner, Viewer,
};

/// Parse an upstream ISO-8601 timestamp. Unparsable values become `None`.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
  value
    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    .map(|dt| dt.with_timezone(&Utc))
}

fn default_true() -> bool {
  true
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRepositoryOwner {
  #[serde(default)]
  pub login: String,
  #[serde(rename = "type", default)]
  pub owner_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiRepository {
  pub id: u64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub full_name: String,
  pub description: Option<String>,
  #[serde(default)]
  pub private: bool,
  #[serde(default)]
  pub html_url: String,
  pub clone_url: Option<String>,
  pub ssh_url: Option<String>,
  pub language: Option<String>,
  #[serde(default)]
  pub stargazers_count: u64,
  #[serde(default)]
  pub watchers_count: u64,
  #[serde(default)]
  pub forks_count: u64,
  #[serde(default)]
  pub size: u64,
  pub default_branch: Option<String>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
  pub pushed_at: Option<String>,
  #[serde(default)]
  pub archived: bool,
  #[serde(default)]
  pub disabled: bool,
  #[serde(default)]
  pub fork: bool,
  #[serde(default)]
  pub topics: Vec<String>,
  pub visibility: Option<String>,
  pub owner: Option<ApiRepositoryOwner>,
}

impl ApiRepository {
  pub fn into_domain(self) -> Repository {
    let fallback = if self.private { "private" } else { "public" };
    let visibility = self.visibility.unwrap_or_else(|| fallback.to_string());

    Repository {
      id: self.id,
      name: self.name,
      full_name: self.full_name,
      description: self.description,
      private: self.private,
      html_url: self.html_url,
      clone_url: self.clone_url,
      ssh_url: self.ssh_url,
      language: self.language,
      stargazers_count: self.stargazers_count,
      watchers_count: self.watchers_count,
      forks_count: self.forks_count,
      size: self.size,
      default_branch: self.default_branch,
      created_at: parse_timestamp(self.created_at.as_deref()),
      updated_at: parse_timestamp(self.updated_at.as_deref()),
      pushed_at: parse_timestamp(self.pushed_at.as_deref()),
      archived: self.archived,
      disabled: self.disabled,
      fork: self.fork,
      topics: self.topics,
      visibility,
      owner: self.owner.map(|o| RepositoryOwner {
        login: o.login,
        owner_type: o.owner_type,
      }),
    }
  }
}

// ============================================================================
// Gists
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiGistFile {
  pub filename: Option<String>,
  #[serde(rename = "type", default)]
  pub file_type: String,
  pub language: Option<String>,
  pub raw_url: Option<String>,
  #[serde(default)]
  pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiGistOwner {
  pub login: Option<String>,
  pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGist {
  pub id: String,
  pub description: Option<String>,
  #[serde(default = "default_true")]
  pub public: bool,
  pub html_url: Option<String>,
  pub git_pull_url: Option<String>,
  pub git_push_url: Option<String>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
  #[serde(default)]
  pub comments: u64,
  /// Keyed by file name
  #[serde(default)]
  pub files: BTreeMap<String, ApiGistFile>,
  pub owner: Option<ApiGistOwner>,
  #[serde(default)]
  pub truncated: bool,
}

impl ApiGist {
  pub fn into_domain(self) -> Gist {
    let files: Vec<GistFile> = self
      .files
      .into_iter()
      .map(|(name, file)| GistFile {
        filename: file.filename.unwrap_or(name),
        file_type: file.file_type,
        language: file.language,
        raw_url: file.raw_url,
        size: file.size,
      })
      .collect();
    let owner = self.owner.map_or(
      GistOwner {
        login: None,
        avatar_url: None,
      },
      |o| GistOwner {
        login: o.login,
        avatar_url: o.avatar_url,
      },
    );

    Gist {
      id: self.id,
      description: self.description,
      public: self.public,
      html_url: self.html_url,
      git_pull_url: self.git_pull_url,
      git_push_url: self.git_push_url,
      created_at: parse_timestamp(self.created_at.as_deref()),
      updated_at: parse_timestamp(self.updated_at.as_deref()),
      comments: self.comments,
      file_count: files.len(),
      files,
      owner,
      truncated: self.truncated,
    }
  }
}

// ============================================================================
// Users (followers, authenticated user)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: u64,
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
  #[serde(default)]
  pub html_url: String,
  #[serde(rename = "type", default)]
  pub account_type: String,
}

impl ApiUser {
  pub fn into_domain(self) -> Follower {
    Follower {
      id: self.id,
      login: self.login,
      avatar_url: self.avatar_url,
      html_url: self.html_url,
      account_type: self.account_type,
    }
  }
}

/// `GET /user`. The login flow only needs the first fields; the rest feed
/// the profile endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiViewer {
  pub id: u64,
  pub login: String,
  pub name: Option<String>,
  pub avatar_url: Option<String>,
  pub html_url: Option<String>,
  pub email: Option<String>,
  pub bio: Option<String>,
  pub location: Option<String>,
  pub company: Option<String>,
  pub blog: Option<String>,
  pub twitter_username: Option<String>,
  #[serde(default)]
  pub public_repos: u64,
  #[serde(default)]
  pub followers: u64,
  #[serde(default)]
  pub following: u64,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

impl ApiViewer {
  pub fn into_profile(self) -> Profile {
    Profile {
      id: self.id,
      login: self.login,
      name: self.name,
      email: self.email,
      avatar_url: self.avatar_url,
      bio: self.bio,
      location: self.location,
      company: self.company,
      // GitHub reports an unset blog as ""
      blog: self.blog.filter(|b| !b.is_empty()),
      twitter_username: self.twitter_username,
      public_repos: self.public_repos,
      followers: self.followers,
      following: self.following,
      created_at: parse_timestamp(self.created_at.as_deref()),
      updated_at: parse_timestamp(self.updated_at.as_deref()),
      html_url: self.html_url,
      fetched_at: Utc::now(),
    }
  }
}

impl From<ApiViewer> for Viewer {
  fn from(v: ApiViewer) -> Self {
    Viewer {
      id: v.id,
      login: v.login,
      name: v.name,
      avatar_url: v.avatar_url,
      html_url: v.html_url,
    }
  }
}

// ============================================================================
// Pull requests (issue search listing + detail endpoint)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssueUser {
  #[serde(default)]
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
  #[serde(default)]
  pub html_url: String,
  pub id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssueRepository {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub full_name: String,
  #[serde(default)]
  pub html_url: String,
}

/// Marker present only on issues that are pull requests
#[derive(Debug, Deserialize)]
pub struct ApiIssuePullRequest {
  pub merged_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLabel {
  #[serde(default)]
  pub name: String,
  pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub id: u64,
  pub number: u64,
  #[serde(default)]
  pub title: String,
  pub body: Option<String>,
  #[serde(default)]
  pub state: String,
  pub user: Option<ApiIssueUser>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
  pub closed_at: Option<String>,
  #[serde(default)]
  pub html_url: String,
  pub repository_url: Option<String>,
  pub repository: Option<ApiIssueRepository>,
  pub pull_request: Option<ApiIssuePullRequest>,
  #[serde(default)]
  pub draft: bool,
  #[serde(default)]
  pub comments: u64,
  #[serde(default)]
  pub labels: Vec<ApiLabel>,
}

impl ApiIssue {
  /// Convert to a pull request. Plain issues yield `None`.
  pub fn into_pull_request(self) -> Option<PullRequest> {
    let marker = self.pull_request?;
    let repository = self.repository.map_or_else(
      || repository_from_urls(self.repository_url.as_deref(), &self.html_url),
      |r| {
        Some(PullRequestRepository {
          name: r.name,
          full_name: r.full_name,
          html_url: r.html_url,
        })
      },
    );

    Some(PullRequest {
      id: self.id,
      number: self.number,
      title: self.title,
      body: self.body,
      state: self.state,
      user: self.user.map(|u| PullRequestUser {
        login: u.login,
        avatar_url: u.avatar_url,
        html_url: u.html_url,
        id: u.id,
      }),
      created_at: parse_timestamp(self.created_at.as_deref()),
      updated_at: parse_timestamp(self.updated_at.as_deref()),
      closed_at: parse_timestamp(self.closed_at.as_deref()),
      merged_at: parse_timestamp(marker.merged_at.as_deref()),
      html_url: self.html_url,
      repository,
      draft: self.draft,
      additions: 0,
      deletions: 0,
      changed_files: 0,
      comments: self.comments,
      review_comments: 0,
      commits: 0,
      labels: self
        .labels
        .into_iter()
        .map(|l| Label {
          name: l.name,
          color: l.color,
        })
        .collect(),
    })
  }
}

/// Derive the repository from `.../repos/{owner}/{name}` and the pull
/// request's web URL (`https://github.com/{owner}/{name}/pull/{n}`).
fn repository_from_urls(repository_url: Option<&str>, html_url: &str) -> Option<PullRequestRepository> {
  let (_, path) = repository_url?.split_once("/repos/")?;
  let (owner, name) = path.trim_end_matches('/').split_once('/')?;
  let html_url = html_url
    .rsplit_once("/pull/")
    .map(|(repo, _)| repo.to_string())
    .unwrap_or_default();

  Some(PullRequestRepository {
    name: name.to_string(),
    full_name: format!("{}/{}", owner, name),
    html_url,
  })
}

#[derive(Debug, Deserialize)]
pub struct ApiPullRequestDetail {
  #[serde(default)]
  pub additions: u64,
  #[serde(default)]
  pub deletions: u64,
  #[serde(default)]
  pub changed_files: u64,
  #[serde(default)]
  pub commits: u64,
  #[serde(default)]
  pub review_comments: u64,
  #[serde(default)]
  pub draft: bool,
}

impl From<ApiPullRequestDetail> for PullRequestDetail {
  fn from(d: ApiPullRequestDetail) -> Self {
    PullRequestDetail {
      additions: d.additions,
      deletions: d.deletions,
      changed_files: d.changed_files,
      commits: d.commits,
      review_comments: d.review_comments,
      draft: d.draft,
    }
  }
}

// ============================================================================
// Rate limit endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRateLimitResource {
  #[serde(default)]
  pub limit: u64,
  #[serde(default)]
  pub remaining: u64,
  #[serde(default)]
  pub used: u64,
  /// Unix seconds
  pub reset: Option<i64>,
}

impl From<ApiRateLimitResource> for RateLimitWindow {
  fn from(r: ApiRateLimitResource) -> Self {
    RateLimitWindow {
      limit: r.limit,
      remaining: r.remaining,
      used: r.used,
      reset_at: r.reset.and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiRateLimitResources {
  pub core: ApiRateLimitResource,
  pub search: Option<ApiRateLimitResource>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRateLimitResponse {
  pub resources: ApiRateLimitResources,
}

impl ApiRateLimitResponse {
  pub fn into_snapshot(self) -> RateLimitSnapshot {
    RateLimitSnapshot {
      core: self.resources.core.into(),
      search: self.resources.search.map(Into::into),
      fetched_at: Utc::now(),
    }
  }
}
