use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four listable collections of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
  Repositories,
  Gists,
  Followers,
  PullRequests,
}

impl ResourceType {
  pub const ALL: [ResourceType; 4] = [
    ResourceType::Repositories,
    ResourceType::Gists,
    ResourceType::Followers,
    ResourceType::PullRequests,
  ];

  /// Cache namespace and JSON list key.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Repositories => "repositories",
      Self::Gists => "gists",
      Self::Followers => "followers",
      Self::PullRequests => "pull_requests",
    }
  }

  /// Human label used in API messages.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Repositories => "Repositories",
      Self::Gists => "Gists",
      Self::Followers => "Followers",
      Self::PullRequests => "Pull requests",
    }
  }
}

impl fmt::Display for ResourceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ResourceType {
  type Err = String;

  /// Accepts the canonical names plus the short forms the web client sends
  /// when clearing a single cache (`repos`, `pulls`, `pullrequests`).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "repositories" | "repos" => Ok(Self::Repositories),
      "gists" => Ok(Self::Gists),
      "followers" => Ok(Self::Followers),
      "pull_requests" | "pullrequests" | "pulls" => Ok(Self::PullRequests),
      other => Err(format!("unknown resource type: {other}")),
    }
  }
}
